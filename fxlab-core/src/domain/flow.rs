//! Order-flow vocabulary: sides, time-in-force, terminal statuses, and the
//! gateway/observer traits that connect strategies to an execution venue.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::domain::symbol::Symbol;

/// Unique identifier for an order, monotonically increasing within a run.
pub type OrderId = u64;

/// Price of an order or quote.
pub type Price = f64;

/// Quantity of an order or fill.
pub type Quantity = f64;

/// Signed net quantity of an asset held.
pub type Position = f64;

/// Which side of the market an order is on. Encodes a numeric sign:
/// Buy = +1, Sell = -1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The sign applied to dealt quantities: +1 for Buy, -1 for Sell.
    pub fn sign(self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "Buy"),
            Side::Sell => write!(f, "Sell"),
        }
    }
}

/// Time in force.
///
/// The simulated venue only matches `Ioc`; a `Gtc` order is always terminated
/// with [`DoneStatus::InternalReject`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tif {
    /// Good till cancel. Never matched by the simulator.
    Gtc,
    /// Immediate or cancel.
    Ioc,
}

/// Terminal status of an order. No further notifications follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DoneStatus {
    /// Cancelled or fully filled without error.
    Done,
    /// Rejected by the exchange.
    Rejected,
    /// Rejected for risk or validation reasons.
    InternalReject,
}

impl fmt::Display for DoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DoneStatus::Done => write!(f, "Done"),
            DoneStatus::Rejected => write!(f, "Rejected"),
            DoneStatus::InternalReject => write!(f, "InternalReject"),
        }
    }
}

/// Receiver of order updates for orders sent through an [`OrderSender`].
///
/// Every acknowledged order produces zero or more fills followed by exactly
/// one termination.
pub trait OrderStateObserver {
    /// An order has been acknowledged by the venue.
    fn on_ack(
        &self,
        symbol: &str,
        order_id: OrderId,
        side: Side,
        price: Price,
        qty: Quantity,
        tif: Tif,
    );

    /// An execution occurred. `dealt` is the signed base-asset quantity
    /// (positive for buys, negative for sells); `contra` is the signed
    /// quote-asset quantity filled against it, always of opposite sign.
    fn on_fill(&self, symbol: &str, order_id: OrderId, dealt: Quantity, contra: Quantity);

    /// The order reached a terminal state.
    fn on_terminated(&self, symbol: &str, order_id: OrderId, status: DoneStatus);
}

/// Sends orders on a single symbol.
pub trait OrderSender {
    /// Submits an order and returns its id synchronously.
    ///
    /// Acknowledgments, fills and rejections are delivered later through the
    /// [`OrderStateObserver`] registered with the gateway.
    fn send_order(&self, side: Side, price: Price, qty: Quantity, tif: Tif) -> OrderId;
}

/// A single execution venue: hands out order senders per symbol.
pub trait Gateway {
    /// Returns the order sender for `symbol`, delivering updates to
    /// `observer`. Observers are compared by identity; the same
    /// (symbol, observer) pair always yields the same sender.
    fn order_sender(
        &self,
        symbol: &Symbol,
        observer: &Rc<dyn OrderStateObserver>,
    ) -> Rc<dyn OrderSender>;
}
