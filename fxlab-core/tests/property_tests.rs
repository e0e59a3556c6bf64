//! Property tests for engine and risk invariants.
//!
//! 1. Dispatch order — events fire in (time, insertion) order for arbitrary
//!    post sequences, with chores ahead of same-instant future events.
//! 2. Time monotonicity — observed event times never decrease.
//! 3. Fair-price inversion — direct and inverse USD quotes agree.

use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

use fxlab_core::domain::{TimestampNs, TopOfBook};
use fxlab_core::engine::EventLoop;
use fxlab_core::pubsub::{shared_record, CacheSubscriber, DirectConsumer, Publisher, Subscriber};
use fxlab_core::risk::{Risk, SpotRiskModel};

// ── Dispatch ordering ────────────────────────────────────────────────

proptest! {
    /// Every posted event fires exactly once, ordered by expiry time with
    /// posting order breaking ties; zero-delay posts run first.
    #[test]
    fn dispatch_respects_time_then_insertion_order(
        deltas in prop::collection::vec(0i64..50, 1..40),
    ) {
        let event_loop = EventLoop::new(0);
        let fired: Rc<RefCell<Vec<(TimestampNs, usize)>>> = Rc::new(RefCell::new(Vec::new()));

        for (index, &delta) in deltas.iter().enumerate() {
            let fired = fired.clone();
            let inner = event_loop.clone();
            event_loop.post_event(
                delta,
                Box::new(move || fired.borrow_mut().push((inner.event_time(), index))),
            );
        }
        event_loop.dispatch();

        let fired = fired.borrow();
        prop_assert_eq!(fired.len(), deltas.len());

        // Chores all run before any future event, in posting order.
        let chore_count = deltas.iter().filter(|&&d| d == 0).count();
        let mut chore_indices: Vec<usize> =
            fired[..chore_count].iter().map(|&(_, i)| i).collect();
        prop_assert!(chore_indices.windows(2).all(|w| w[0] < w[1]));
        chore_indices.sort_unstable();
        let expected: Vec<usize> = deltas
            .iter()
            .enumerate()
            .filter(|(_, &d)| d == 0)
            .map(|(i, _)| i)
            .collect();
        prop_assert_eq!(chore_indices, expected);

        // Future events fire sorted by (expiry, posting index).
        let future = &fired[chore_count..];
        let mut previous: Option<(TimestampNs, usize)> = None;
        for &(at, index) in future {
            prop_assert_eq!(at, deltas[index]);
            if let Some((prev_at, prev_index)) = previous {
                prop_assert!((prev_at, prev_index) < (at, index));
            }
            previous = Some((at, index));
        }
    }

    /// Observed event times never decrease, even with nested posts.
    #[test]
    fn event_time_is_monotonic(
        deltas in prop::collection::vec(0i64..100, 1..30),
        nested in prop::collection::vec(0i64..100, 1..30),
    ) {
        let event_loop = EventLoop::new(0);
        let times: Rc<RefCell<Vec<TimestampNs>>> = Rc::new(RefCell::new(Vec::new()));

        for (index, &delta) in deltas.iter().enumerate() {
            let times = times.clone();
            let inner = event_loop.clone();
            let nested_delta = nested[index % nested.len()];
            event_loop.post_event(
                delta,
                Box::new(move || {
                    times.borrow_mut().push(inner.event_time());
                    let times = times.clone();
                    let deep = inner.clone();
                    inner.post_event(
                        nested_delta,
                        Box::new(move || times.borrow_mut().push(deep.event_time())),
                    );
                }),
            );
        }
        event_loop.dispatch();

        let times = times.borrow();
        prop_assert_eq!(times.len(), deltas.len() * 2);
        prop_assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }
}

// ── Fair-price inversion ─────────────────────────────────────────────

fn cache_with(symbol: &str, bid: f64, ask: f64) -> Rc<CacheSubscriber<TopOfBook>> {
    let cache = CacheSubscriber::<TopOfBook>::new();
    let publisher = DirectConsumer::new(cache.clone() as Rc<dyn Subscriber<TopOfBook>>);
    publisher.create_entry(
        symbol,
        &shared_record(TopOfBook {
            bid_size: 1e6,
            bid_price: bid,
            ask_size: 1e6,
            ask_price: ask,
        }),
    );
    cache
}

proptest! {
    /// A direct quote prices at the midpoint, and quoting the same market
    /// inversely prices at its reciprocal.
    #[test]
    fn direct_and_inverse_quotes_are_reciprocal(
        mid in 0.01f64..1000.0,
        half_spread_bp in 0.1f64..50.0,
    ) {
        let half_spread = mid * half_spread_bp * 1e-4;
        let bid = mid - half_spread;
        let ask = mid + half_spread;

        let direct = SpotRiskModel::new(cache_with("EUR/USD", bid, ask));
        let inverse = SpotRiskModel::new(cache_with("USD/EUR", bid, ask));

        let direct_price = direct.fair_price("EUR");
        let inverse_price = inverse.fair_price("EUR");

        prop_assert!((direct_price - mid).abs() <= mid * 1e-12);
        prop_assert!((inverse_price * mid - 1.0).abs() < 1e-9);
    }

    /// USD itself always prices at exactly one.
    #[test]
    fn usd_prices_at_unity(bid in 0.5f64..2.0, ask in 0.5f64..2.0) {
        let risk = SpotRiskModel::new(cache_with("EUR/USD", bid, ask));
        prop_assert_eq!(risk.fair_price("USD"), 1.0);
    }
}
