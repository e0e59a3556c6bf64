//! Venue-simulator scenarios: latency timing, matching, risk gating.
//!
//! Each test wires a minimal fabric (top-of-book cache, positions cache,
//! recording observer) around the simulator and drives the event loop, then
//! asserts on the observed order-lifecycle timeline and final positions.

use std::cell::RefCell;
use std::rc::Rc;

use fxlab_core::domain::time::{MILLISECOND, SECOND};
use fxlab_core::domain::{
    DoneStatus, Gateway, OrderId, OrderStateObserver, Position, Price, Quantity, Side, Tif,
    TimestampNs, TopOfBook,
};
use fxlab_core::engine::{EventDispatcher, EventLoop};
use fxlab_core::execution::{LpSim, Settings};
use fxlab_core::pubsub::{shared_record, CacheSubscriber, DirectConsumer, Publisher, Subscriber};

/// Run start. Large enough that the first order clears the min-order-gap
/// check against the zero initial send time.
const START: TimestampNs = 100 * SECOND;

const EUR_USD_BOOK: TopOfBook = TopOfBook {
    bid_size: 1e6,
    bid_price: 1.1000,
    ask_size: 1e6,
    ask_price: 1.1002,
};

fn default_settings() -> Settings {
    Settings {
        inbound_delay: MILLISECOND,
        outbound_delay: MILLISECOND,
        min_order_gap: 10 * SECOND,
        max_nop: 1e7,
    }
}

#[derive(Debug, PartialEq)]
enum Lifecycle {
    Ack {
        at: TimestampNs,
        order_id: OrderId,
        side: Side,
    },
    Fill {
        at: TimestampNs,
        order_id: OrderId,
        dealt: Quantity,
        contra: Quantity,
    },
    Terminated {
        at: TimestampNs,
        order_id: OrderId,
        status: DoneStatus,
    },
}

/// Observer that timestamps every callback against the simulated clock.
struct Recorder {
    dispatcher: Rc<dyn EventDispatcher>,
    events: RefCell<Vec<Lifecycle>>,
}

impl Recorder {
    fn new(dispatcher: Rc<dyn EventDispatcher>) -> Rc<Self> {
        Rc::new(Self {
            dispatcher,
            events: RefCell::new(Vec::new()),
        })
    }
}

impl OrderStateObserver for Recorder {
    fn on_ack(
        &self,
        _symbol: &str,
        order_id: OrderId,
        side: Side,
        _price: Price,
        _qty: Quantity,
        _tif: Tif,
    ) {
        self.events.borrow_mut().push(Lifecycle::Ack {
            at: self.dispatcher.event_time(),
            order_id,
            side,
        });
    }

    fn on_fill(&self, _symbol: &str, order_id: OrderId, dealt: Quantity, contra: Quantity) {
        self.events.borrow_mut().push(Lifecycle::Fill {
            at: self.dispatcher.event_time(),
            order_id,
            dealt,
            contra,
        });
    }

    fn on_terminated(&self, _symbol: &str, order_id: OrderId, status: DoneStatus) {
        self.events.borrow_mut().push(Lifecycle::Terminated {
            at: self.dispatcher.event_time(),
            order_id,
            status,
        });
    }
}

struct Venue {
    event_loop: EventLoop,
    sim: Rc<LpSim>,
    recorder: Rc<Recorder>,
    positions_cache: Rc<CacheSubscriber<Position>>,
    /// Producer-side slot for the EUR/USD book; tests overwrite it to move
    /// the market mid-run.
    book_slot: fxlab_core::pubsub::SharedRecord<TopOfBook>,
}

impl Venue {
    /// Builds a venue with the given book already cached for EUR/USD.
    fn with_book(settings: Settings, book: TopOfBook) -> Self {
        let event_loop = EventLoop::new(START);

        let tob_cache = CacheSubscriber::<TopOfBook>::new();
        let tob_pub = DirectConsumer::new(tob_cache.clone() as Rc<dyn Subscriber<TopOfBook>>);
        let book_slot = shared_record(book);
        tob_pub.create_entry("EUR/USD", &book_slot);

        let positions_cache = CacheSubscriber::<Position>::new();
        let positions_pub =
            DirectConsumer::new(positions_cache.clone() as Rc<dyn Subscriber<Position>>);

        let dispatcher: Rc<dyn EventDispatcher> = Rc::new(event_loop.clone());
        let sim = Rc::new(LpSim::new(
            dispatcher.clone(),
            tob_cache,
            positions_pub,
            settings,
        ));
        let recorder = Recorder::new(dispatcher);

        Self {
            event_loop,
            sim,
            recorder,
            positions_cache,
            book_slot,
        }
    }

    fn send(&self, side: Side, price: Price, qty: Quantity, tif: Tif) -> OrderId {
        let observer = self.recorder.clone() as Rc<dyn OrderStateObserver>;
        self.sim
            .order_sender(&"EUR/USD".to_string(), &observer)
            .send_order(side, price, qty, tif)
    }

    fn position(&self, asset: &str) -> Position {
        self.positions_cache
            .cached_record(asset)
            .map(|slot| *slot.borrow())
            .unwrap_or(0.0)
    }
}

// ── Matching ─────────────────────────────────────────────────────────

#[test]
fn ioc_buy_fills_at_the_ask_with_modelled_latency() {
    let venue = Venue::with_book(default_settings(), EUR_USD_BOOK);
    let order_id = venue.send(Side::Buy, f64::NAN, 500_000.0, Tif::Ioc);
    venue.event_loop.dispatch();

    let events = venue.recorder.events.borrow();
    assert_eq!(events.len(), 3);
    assert_eq!(
        events[0],
        Lifecycle::Ack {
            at: START + MILLISECOND,
            order_id,
            side: Side::Buy,
        }
    );
    match events[1] {
        Lifecycle::Fill {
            at,
            order_id: id,
            dealt,
            contra,
        } => {
            assert_eq!(at, START + 2 * MILLISECOND);
            assert_eq!(id, order_id);
            assert_eq!(dealt, 500_000.0);
            assert!((contra - (-550_100.0)).abs() < 1e-6);
        }
        ref other => panic!("expected fill, got {other:?}"),
    }
    assert_eq!(
        events[2],
        Lifecycle::Terminated {
            at: START + 2 * MILLISECOND,
            order_id,
            status: DoneStatus::Done,
        }
    );

    assert_eq!(venue.position("EUR"), 500_000.0);
    assert!((venue.position("USD") - (-550_100.0)).abs() < 1e-6);
}

#[test]
fn ioc_buy_below_the_ask_does_not_cross() {
    let venue = Venue::with_book(default_settings(), EUR_USD_BOOK);
    let order_id = venue.send(Side::Buy, 1.0990, 500_000.0, Tif::Ioc);
    venue.event_loop.dispatch();

    let events = venue.recorder.events.borrow();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], Lifecycle::Ack { .. }));
    assert_eq!(
        events[1],
        Lifecycle::Terminated {
            at: START + 2 * MILLISECOND,
            order_id,
            status: DoneStatus::Done,
        }
    );
    assert_eq!(venue.position("EUR"), 0.0);
}

#[test]
fn ioc_sell_fills_at_the_bid() {
    let venue = Venue::with_book(default_settings(), EUR_USD_BOOK);
    venue.send(Side::Sell, f64::NAN, 300_000.0, Tif::Ioc);
    venue.event_loop.dispatch();

    assert_eq!(venue.position("EUR"), -300_000.0);
    assert!((venue.position("USD") - 330_000.0).abs() < 1e-6);
}

#[test]
fn fill_quantity_is_capped_at_the_top_size() {
    let venue = Venue::with_book(default_settings(), EUR_USD_BOOK);
    venue.send(Side::Buy, f64::NAN, 5e6, Tif::Ioc);
    venue.event_loop.dispatch();

    // Only the displayed 1e6 is available.
    assert_eq!(venue.position("EUR"), 1e6);
}

#[test]
fn degenerate_book_side_yields_no_fill() {
    let book = TopOfBook {
        ask_price: f64::NAN,
        ..EUR_USD_BOOK
    };
    let venue = Venue::with_book(default_settings(), book);
    let order_id = venue.send(Side::Buy, f64::NAN, 500_000.0, Tif::Ioc);
    venue.event_loop.dispatch();

    let events = venue.recorder.events.borrow();
    assert_eq!(events.len(), 2);
    assert_eq!(
        events[1],
        Lifecycle::Terminated {
            at: START + 2 * MILLISECOND,
            order_id,
            status: DoneStatus::Done,
        }
    );
    assert_eq!(venue.position("EUR"), 0.0);
}

// ── Validation ───────────────────────────────────────────────────────

#[test]
fn gtc_orders_are_always_rejected() {
    let venue = Venue::with_book(default_settings(), EUR_USD_BOOK);
    let order_id = venue.send(Side::Buy, 1.1002, 500_000.0, Tif::Gtc);
    venue.event_loop.dispatch();

    let events = venue.recorder.events.borrow();
    assert_eq!(events.len(), 2);
    assert_eq!(
        events[1],
        Lifecycle::Terminated {
            at: START + 2 * MILLISECOND,
            order_id,
            status: DoneStatus::InternalReject,
        }
    );
}

#[test]
fn zero_quantity_is_rejected() {
    let venue = Venue::with_book(default_settings(), EUR_USD_BOOK);
    venue.send(Side::Buy, f64::NAN, 0.0, Tif::Ioc);
    venue.event_loop.dispatch();

    let events = venue.recorder.events.borrow();
    assert!(matches!(
        events.last(),
        Some(Lifecycle::Terminated {
            status: DoneStatus::InternalReject,
            ..
        })
    ));
}

#[test]
fn second_order_within_the_gap_is_rejected() {
    let venue = Venue::with_book(default_settings(), EUR_USD_BOOK);

    venue.send(Side::Buy, f64::NAN, 100_000.0, Tif::Ioc);
    {
        // Second order submitted 5s later, inside the 10s gap.
        let sim = venue.sim.clone();
        let observer = venue.recorder.clone() as Rc<dyn OrderStateObserver>;
        venue.event_loop.post_event(
            5 * SECOND,
            Box::new(move || {
                sim.order_sender(&"EUR/USD".to_string(), &observer).send_order(
                    Side::Buy,
                    f64::NAN,
                    100_000.0,
                    Tif::Ioc,
                );
            }),
        );
    }
    venue.event_loop.dispatch();

    let events = venue.recorder.events.borrow();
    let statuses: Vec<DoneStatus> = events
        .iter()
        .filter_map(|e| match e {
            Lifecycle::Terminated { status, .. } => Some(*status),
            _ => None,
        })
        .collect();
    assert_eq!(statuses, vec![DoneStatus::Done, DoneStatus::InternalReject]);

    // Only the first order moved the position.
    assert_eq!(venue.position("EUR"), 100_000.0);
}

#[test]
fn unknown_symbol_is_rejected() {
    let venue = Venue::with_book(default_settings(), EUR_USD_BOOK);
    let observer = venue.recorder.clone() as Rc<dyn OrderStateObserver>;
    venue
        .sim
        .order_sender(&"GBP/USD".to_string(), &observer)
        .send_order(Side::Buy, f64::NAN, 100_000.0, Tif::Ioc);
    venue.event_loop.dispatch();

    let events = venue.recorder.events.borrow();
    assert!(matches!(
        events.last(),
        Some(Lifecycle::Terminated {
            status: DoneStatus::InternalReject,
            ..
        })
    ));
}

// ── Risk gating ──────────────────────────────────────────────────────

#[test]
fn nop_breach_rejects_without_touching_positions() {
    let settings = Settings {
        max_nop: 1e5,
        ..default_settings()
    };
    let venue = Venue::with_book(settings, EUR_USD_BOOK);
    let order_id = venue.send(Side::Buy, f64::NAN, 500_000.0, Tif::Ioc);
    venue.event_loop.dispatch();

    let events = venue.recorder.events.borrow();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], Lifecycle::Ack { .. }));
    assert_eq!(
        events[1],
        Lifecycle::Terminated {
            at: START + 2 * MILLISECOND,
            order_id,
            status: DoneStatus::InternalReject,
        }
    );
    assert_eq!(venue.position("EUR"), 0.0);
    assert_eq!(venue.position("USD"), 0.0);
    assert_eq!(venue.sim.nop(), 0.0);
}

#[test]
fn risk_reducing_trade_is_allowed_above_the_cap() {
    let settings = Settings {
        max_nop: 1.2e6,
        ..default_settings()
    };
    let venue = Venue::with_book(settings, EUR_USD_BOOK);

    // Go long 1e6 EUR within the cap, then a market move inflates the long
    // exposure past the cap without any trading.
    venue.send(Side::Buy, f64::NAN, 1e6, Tif::Ioc);
    {
        let book_slot = venue.book_slot.clone();
        venue.event_loop.post_event(
            15 * SECOND,
            Box::new(move || {
                *book_slot.borrow_mut() = TopOfBook {
                    bid_size: 1e6,
                    bid_price: 1.3499,
                    ask_size: 1e6,
                    ask_price: 1.3501,
                };
            }),
        );
    }
    {
        // Unwind a slice: NOP lands at 1.215e6, still above the 1.2e6 cap,
        // but strictly below the current 1.35e6 exposure.
        let sim = venue.sim.clone();
        let observer = venue.recorder.clone() as Rc<dyn OrderStateObserver>;
        venue.event_loop.post_event(
            20 * SECOND,
            Box::new(move || {
                sim.order_sender(&"EUR/USD".to_string(), &observer).send_order(
                    Side::Sell,
                    f64::NAN,
                    100_000.0,
                    Tif::Ioc,
                );
            }),
        );
    }
    venue.event_loop.dispatch();

    assert_eq!(venue.position("EUR"), 900_000.0);
    let fills: usize = venue
        .recorder
        .events
        .borrow()
        .iter()
        .filter(|e| matches!(e, Lifecycle::Fill { .. }))
        .count();
    assert_eq!(fills, 2);
    assert!(venue.sim.nop() > settings.max_nop);
}

#[test]
fn nop_stays_bounded_at_quiescence() {
    let settings = Settings {
        max_nop: 600_000.0,
        min_order_gap: SECOND,
        ..default_settings()
    };
    let venue = Venue::with_book(settings, EUR_USD_BOOK);

    for i in 0..5 {
        let sim = venue.sim.clone();
        let observer = venue.recorder.clone() as Rc<dyn OrderStateObserver>;
        venue.event_loop.post_event(
            (i * 2) * SECOND + 1,
            Box::new(move || {
                sim.order_sender(&"EUR/USD".to_string(), &observer).send_order(
                    Side::Buy,
                    f64::NAN,
                    200_000.0,
                    Tif::Ioc,
                );
            }),
        );
    }
    venue.event_loop.dispatch();

    // The first two 200k buys fit under the cap; every later buy would push
    // the short USD leg past it and is rejected.
    assert_eq!(venue.position("EUR"), 400_000.0);
    assert!(venue.sim.nop() <= 600_000.0);
}

// ── Identity and ids ─────────────────────────────────────────────────

#[test]
fn order_ids_are_unique_and_monotonic() {
    let venue = Venue::with_book(default_settings(), EUR_USD_BOOK);
    let a = venue.send(Side::Buy, f64::NAN, 1.0, Tif::Ioc);
    let b = venue.send(Side::Sell, f64::NAN, 1.0, Tif::Ioc);
    let c = venue.send(Side::Buy, f64::NAN, 1.0, Tif::Ioc);
    assert!(a < b && b < c);
}

#[test]
fn same_symbol_and_observer_reuse_the_executor() {
    let venue = Venue::with_book(default_settings(), EUR_USD_BOOK);
    let observer = venue.recorder.clone() as Rc<dyn OrderStateObserver>;
    let first = venue.sim.order_sender(&"EUR/USD".to_string(), &observer);
    let second = venue.sim.order_sender(&"EUR/USD".to_string(), &observer);
    assert!(Rc::ptr_eq(&first, &second));
}

#[test]
fn distinct_observers_get_distinct_executors() {
    let venue = Venue::with_book(default_settings(), EUR_USD_BOOK);
    let first_observer = venue.recorder.clone() as Rc<dyn OrderStateObserver>;
    let second_observer =
        Recorder::new(Rc::new(venue.event_loop.clone())) as Rc<dyn OrderStateObserver>;
    let first = venue.sim.order_sender(&"EUR/USD".to_string(), &first_observer);
    let second = venue
        .sim
        .order_sender(&"EUR/USD".to_string(), &second_observer);
    assert!(!Rc::ptr_eq(&first, &second));
}
