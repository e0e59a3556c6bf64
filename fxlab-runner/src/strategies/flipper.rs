//! A position-flipping reference strategy.
//!
//! Once per minute the flipper logs portfolio PnL and, when it knows the
//! EUR/USD book and has no orders in flight, flips its EUR position around a
//! fixed target with a single IOC order. It also logs the full positions map
//! at every positions batch boundary. The strategy has no alpha; it exists
//! to exercise the whole engine path end to end.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use fxlab_core::domain::time::MINUTE;
use fxlab_core::domain::{
    Asset, DoneStatus, OrderId, OrderStateObserver, Position, Price, Quantity, Side, Symbol, Tif,
    TopOfBook,
};
use fxlab_core::pubsub::{Consumer, SharedRecord, Subscriber};

use crate::strategies::StrategyContext;

/// Desired absolute EUR position after each flip.
const TARGET_POSITION: Position = 100_000.0;

pub struct Flipper {
    weak_self: Weak<Flipper>,
    ctx: StrategyContext,
    /// Latest-known book per symbol; the slots update in place upstream.
    books: RefCell<BTreeMap<Symbol, SharedRecord<TopOfBook>>>,
    positions: RefCell<BTreeMap<Asset, Position>>,
    open_orders: Cell<u32>,
}

impl Flipper {
    pub fn new(ctx: StrategyContext) -> Rc<Self> {
        let flipper = Rc::new_cyclic(|weak_self: &Weak<Flipper>| Self {
            weak_self: weak_self.clone(),
            ctx,
            books: RefCell::new(BTreeMap::new()),
            positions: RefCell::new(BTreeMap::new()),
            open_orders: Cell::new(0),
        });
        flipper.on_minute();
        flipper
    }

    fn strong(&self) -> Rc<Flipper> {
        self.weak_self.upgrade().expect("strategy dropped mid-run")
    }

    /// Minute timer: log PnL, then flip the EUR position if idle.
    fn on_minute(&self) {
        {
            let positions = self.positions.borrow();
            let pnl = self
                .ctx
                .risk
                .pnl(&mut positions.iter().map(|(asset, p)| (asset.as_str(), *p)));
            let mut sink = self.ctx.sink.borrow_mut();
            let _ = writeln!(sink, "{},pnl,{}", self.ctx.dispatcher.event_time(), pnl);
        }

        let book = self.books.borrow().get("EUR/USD").cloned();
        if let Some(book) = book {
            if self.open_orders.get() == 0 {
                let eur = self.positions.borrow().get("EUR").copied().unwrap_or(0.0);
                let (bid, ask) = {
                    let book = book.borrow();
                    (book.bid_price, book.ask_price)
                };
                if eur > 0.0 {
                    self.send("EUR/USD", Side::Sell, bid, TARGET_POSITION + eur);
                } else {
                    self.send("EUR/USD", Side::Buy, ask, TARGET_POSITION - eur);
                }
            }
        }

        let this = self.strong();
        self.ctx
            .dispatcher
            .post_event(MINUTE, Box::new(move || this.on_minute()));
    }

    fn send(&self, symbol: &str, side: Side, price: Price, qty: Quantity) {
        let observer = self.strong() as Rc<dyn OrderStateObserver>;
        self.ctx
            .gateway
            .order_sender(&symbol.to_string(), &observer)
            .send_order(side, price, qty, Tif::Ioc);
        self.open_orders.set(self.open_orders.get() + 1);
    }
}

impl Subscriber<TopOfBook> for Flipper {
    fn notify(&self, _consumer: &dyn Consumer<TopOfBook>, topic: &str, record: &SharedRecord<TopOfBook>) {
        self.books
            .borrow_mut()
            .insert(topic.to_string(), record.clone());
    }

    fn end_of_batch(&self, _consumer: &dyn Consumer<TopOfBook>) {}
}

impl Subscriber<Position> for Flipper {
    fn notify(&self, consumer: &dyn Consumer<Position>, topic: &str, record: &SharedRecord<Position>) {
        self.positions
            .borrow_mut()
            .insert(topic.to_string(), *record.borrow());

        let weak = self.weak_self.clone();
        consumer.subscribe(
            topic,
            Rc::new(move |asset, position: &Position| {
                if let Some(this) = weak.upgrade() {
                    this.positions
                        .borrow_mut()
                        .insert(asset.to_string(), *position);
                }
            }),
        );
    }

    /// A trade's position updates arrive as one batch; log the whole map
    /// once per batch.
    fn end_of_batch(&self, _consumer: &dyn Consumer<Position>) {
        let positions = self.positions.borrow();
        let mut sink = self.ctx.sink.borrow_mut();
        let _ = write!(sink, "{},positions", self.ctx.dispatcher.event_time());
        for (asset, position) in positions.iter() {
            let _ = write!(sink, ",{asset}:{position}");
        }
        let _ = writeln!(sink);
    }
}

impl OrderStateObserver for Flipper {
    fn on_ack(
        &self,
        _symbol: &str,
        _order_id: OrderId,
        _side: Side,
        _price: Price,
        _qty: Quantity,
        _tif: Tif,
    ) {
    }

    fn on_fill(&self, _symbol: &str, _order_id: OrderId, _dealt: Quantity, _contra: Quantity) {
        // Positions arrive through the fabric; nothing to track here.
    }

    fn on_terminated(&self, _symbol: &str, _order_id: OrderId, _status: DoneStatus) {
        self.open_orders.set(self.open_orders.get() - 1);
    }
}
