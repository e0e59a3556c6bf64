//! Market-data input: the tick-stream replayer.

pub mod replay;

pub use replay::{MarketDataReplayer, ReplayError};
