//! Simulated execution venue.

pub mod lp_sim;

pub use lp_sim::{LpSim, Settings};
