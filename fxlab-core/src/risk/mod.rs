//! Risk valuation: fair prices, PnL and net open position.

pub mod model;

pub use model::{Risk, SpotRiskModel};
