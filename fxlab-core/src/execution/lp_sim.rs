//! Liquidity-provider simulator.
//!
//! Models a single FX venue: orders incur an inbound delay before processing
//! and an outbound delay before acknowledgment reaches the observer; IOC
//! orders match against the cached top of book with price improvement; fills
//! mutate per-asset position slots and publish them as one coherent batch;
//! and a net-open-position gate rejects risk-increasing trades beyond the
//! configured cap.
//!
//! One executor exists per (symbol, observer) pair and is retained for the
//! lifetime of the simulator.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

use crate::domain::{
    base_asset, quote_asset, Asset, DoneStatus, Gateway, OrderId, OrderSender,
    OrderStateObserver, Position, Price, Quantity, Side, Symbol, Tif, TimestampNs, TopOfBook,
};
use crate::engine::EventDispatcher;
use crate::pubsub::{shared_record, CacheSubscriber, Publisher, PublisherEntry, SharedRecord};
use crate::risk::{Risk, SpotRiskModel};

/// Orders within this tolerance of the top price still cross.
const PRICE_TOLERANCE: Price = 1e-8;

/// Venue parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Delay between order submission and venue-side processing, ns.
    pub inbound_delay: TimestampNs,
    /// Delay between venue-side events and observer notification, ns.
    pub outbound_delay: TimestampNs,
    /// Minimum gap between accepted orders per executor, ns.
    pub min_order_gap: TimestampNs,
    /// Net-open-position cap. Risk-reducing trades are exempt.
    pub max_nop: Quantity,
}

/// Shared position book: one address-stable slot per asset.
type PositionSlots = Rc<RefCell<BTreeMap<Asset, SharedRecord<Position>>>>;

/// The simulated venue. Implements [`Gateway`].
pub struct LpSim {
    dispatcher: Rc<dyn EventDispatcher>,
    tob_cache: Rc<CacheSubscriber<TopOfBook>>,
    risk: SpotRiskModel,
    positions_pub: Rc<dyn Publisher<Position>>,
    positions: PositionSlots,
    executors: RefCell<HashMap<(Symbol, usize), Rc<Executor>>>,
    settings: Settings,
    last_order_id: Rc<Cell<OrderId>>,
}

impl LpSim {
    pub fn new(
        dispatcher: Rc<dyn EventDispatcher>,
        tob_cache: Rc<CacheSubscriber<TopOfBook>>,
        positions_pub: Rc<dyn Publisher<Position>>,
        settings: Settings,
    ) -> Self {
        Self {
            dispatcher,
            risk: SpotRiskModel::new(tob_cache.clone()),
            tob_cache,
            positions_pub,
            positions: Rc::new(RefCell::new(BTreeMap::new())),
            executors: RefCell::new(HashMap::new()),
            settings,
            last_order_id: Rc::new(Cell::new(0)),
        }
    }

    /// Current net open position across all assets.
    pub fn nop(&self) -> Quantity {
        positions_nop(&self.risk, &self.positions)
    }

    /// The slot for `asset`, created at zero on first sight. Slots are
    /// address-stable for the lifetime of the simulator.
    fn position_slot(&self, asset: &Asset) -> SharedRecord<Position> {
        self.positions
            .borrow_mut()
            .entry(asset.clone())
            .or_insert_with(|| shared_record(0.0))
            .clone()
    }

    /// The publisher entry for `asset`'s position slot. Announces the asset
    /// downstream on every call; the fabric deduplicates repeat
    /// announcements.
    fn position_entry(&self, asset: &Asset) -> Rc<dyn PublisherEntry> {
        let slot = self.position_slot(asset);
        self.positions_pub.create_entry(asset, &slot)
    }
}

impl Gateway for LpSim {
    fn order_sender(
        &self,
        symbol: &Symbol,
        observer: &Rc<dyn OrderStateObserver>,
    ) -> Rc<dyn OrderSender> {
        let key = (symbol.clone(), observer_key(observer));
        if let Some(executor) = self.executors.borrow().get(&key) {
            return executor.clone();
        }

        let base = base_asset(symbol);
        let quote = quote_asset(symbol);
        let executor = Rc::new_cyclic(|weak_self: &Weak<Executor>| Executor {
            weak_self: weak_self.clone(),
            dispatcher: self.dispatcher.clone(),
            observer: observer.clone(),
            symbol: symbol.clone(),
            base_position: self.position_slot(&base),
            quote_position: self.position_slot(&quote),
            base_entry: self.position_entry(&base),
            quote_entry: self.position_entry(&quote),
            positions_pub: self.positions_pub.clone(),
            positions: self.positions.clone(),
            risk: self.risk.clone(),
            tob_cache: self.tob_cache.clone(),
            settings: self.settings,
            last_order_id: self.last_order_id.clone(),
            book: RefCell::new(None),
            last_order_send_time: Cell::new(0),
        });
        self.executors.borrow_mut().insert(key, executor.clone());
        executor
    }
}

/// Observers are compared by identity, not value.
fn observer_key(observer: &Rc<dyn OrderStateObserver>) -> usize {
    Rc::as_ptr(observer) as *const () as usize
}

fn positions_nop(risk: &SpotRiskModel, positions: &PositionSlots) -> Quantity {
    let positions = positions.borrow();
    risk.nop(
        &mut positions
            .iter()
            .map(|(asset, slot)| (asset.as_str(), *slot.borrow())),
    )
}

#[derive(Clone, Copy)]
struct Order {
    order_id: OrderId,
    side: Side,
    price: Price,
    qty: Quantity,
    tif: Tif,
}

/// Per-(symbol, observer) order executor.
struct Executor {
    weak_self: Weak<Executor>,
    dispatcher: Rc<dyn EventDispatcher>,
    observer: Rc<dyn OrderStateObserver>,
    symbol: Symbol,
    base_position: SharedRecord<Position>,
    quote_position: SharedRecord<Position>,
    base_entry: Rc<dyn PublisherEntry>,
    quote_entry: Rc<dyn PublisherEntry>,
    positions_pub: Rc<dyn Publisher<Position>>,
    positions: PositionSlots,
    risk: SpotRiskModel,
    tob_cache: Rc<CacheSubscriber<TopOfBook>>,
    settings: Settings,
    last_order_id: Rc<Cell<OrderId>>,
    /// Top-of-book slot, resolved lazily from the cache on first send.
    book: RefCell<Option<SharedRecord<TopOfBook>>>,
    last_order_send_time: Cell<TimestampNs>,
}

impl OrderSender for Executor {
    fn send_order(&self, side: Side, price: Price, qty: Quantity, tif: Tif) -> OrderId {
        if self.book.borrow().is_none() {
            *self.book.borrow_mut() = self.tob_cache.cached_record(&self.symbol);
        }

        let order_id = self.last_order_id.get() + 1;
        self.last_order_id.set(order_id);

        let this = self.strong();
        self.dispatcher.post_event(
            self.settings.inbound_delay,
            Box::new(move || {
                this.process(Order {
                    order_id,
                    side,
                    price,
                    qty,
                    tif,
                })
            }),
        );
        order_id
    }
}

impl Executor {
    fn strong(&self) -> Rc<Executor> {
        self.weak_self
            .upgrade()
            .expect("executor outlived its simulator")
    }

    /// Venue-side order processing, running inbound-delay after submission.
    fn process(&self, order: Order) {
        self.observer.on_ack(
            &self.symbol,
            order.order_id,
            order.side,
            order.price,
            order.qty,
            order.tif,
        );

        let status = if self.validate(&order) {
            self.last_order_send_time.set(self.dispatcher.event_time());
            let book = self
                .book
                .borrow()
                .clone()
                .expect("validated order without a book");
            let (qty_at_top, top_price) = {
                let book = book.borrow();
                match order.side {
                    Side::Buy => (book.ask_size, book.ask_price),
                    Side::Sell => (book.bid_size, book.bid_price),
                }
            };
            self.agress(&order, qty_at_top, top_price)
        } else {
            DoneStatus::InternalReject
        };

        let this = self.strong();
        let order_id = order.order_id;
        self.dispatcher.post_event(
            self.settings.outbound_delay,
            Box::new(move || this.observer.on_terminated(&this.symbol, order_id, status)),
        );
    }

    fn validate(&self, order: &Order) -> bool {
        self.book.borrow().is_some()
            && order.tif == Tif::Ioc
            && order.qty > 0.0
            && self.dispatcher.event_time() - self.last_order_send_time.get()
                >= self.settings.min_order_gap
    }

    /// Takes liquidity from the top of the book only.
    fn agress(&self, order: &Order, qty_at_top: Quantity, top_price: Price) -> DoneStatus {
        let side_sign = order.side.sign();

        if top_price.is_nan() || order.price * side_sign < top_price * side_sign - PRICE_TOLERANCE
        {
            return DoneStatus::Done;
        }

        // Price improvement is always on: fills happen at the top price,
        // unconditionally so when the order price is NaN (a market order).
        let matched_price = top_price;
        let matched_qty = if order.qty < qty_at_top {
            order.qty
        } else {
            qty_at_top
        };

        if matched_qty > 0.0 {
            let dealt = side_sign * matched_qty;
            let contra = -dealt * matched_price;
            if !self.validate_nop_change(dealt, contra) {
                return DoneStatus::InternalReject;
            }
            self.enqueue_fill(order.order_id, dealt, contra);
        }
        DoneStatus::Done
    }

    /// Applies the trade tentatively and accepts it if NOP decreases or
    /// stays within the cap.
    fn validate_nop_change(&self, dealt: Quantity, contra: Quantity) -> bool {
        if dealt.is_nan() || contra.is_nan() {
            return false;
        }

        let current_nop = positions_nop(&self.risk, &self.positions);
        *self.base_position.borrow_mut() += dealt;
        *self.quote_position.borrow_mut() += contra;
        let new_nop = positions_nop(&self.risk, &self.positions);
        *self.base_position.borrow_mut() -= dealt;
        *self.quote_position.borrow_mut() -= contra;

        new_nop < current_nop || new_nop <= self.settings.max_nop
    }

    /// Schedules the fill outbound-delay from now. Both position slots
    /// mutate and publish, the observer hears the fill, and only then does
    /// the batch close, so downstream subscribers observe the whole trade
    /// atomically.
    fn enqueue_fill(&self, order_id: OrderId, dealt: Quantity, contra: Quantity) {
        let this = self.strong();
        self.dispatcher.post_event(
            self.settings.outbound_delay,
            Box::new(move || {
                *this.base_position.borrow_mut() += dealt;
                *this.quote_position.borrow_mut() += contra;

                this.base_entry.publish();
                this.quote_entry.publish();

                this.observer.on_fill(&this.symbol, order_id, dealt, contra);

                this.positions_pub.end_batch();
            }),
        );
    }
}
