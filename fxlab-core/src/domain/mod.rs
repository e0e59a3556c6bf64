//! Domain types — the vocabulary of FxLab.
//!
//! Currency-pair symbols, top-of-book records, order-flow types, positions,
//! and nanosecond timestamps. Everything else in the crate builds on these.

pub mod book;
pub mod flow;
pub mod symbol;
pub mod time;

pub use book::TopOfBook;
pub use flow::{
    DoneStatus, Gateway, OrderId, OrderSender, OrderStateObserver, Position, Price, Quantity,
    Side, Tif,
};
pub use symbol::{base_asset, quote_asset, Asset, Symbol};
pub use time::{TimestampNs, NO_EVENT};
