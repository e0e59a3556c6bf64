//! Seeded synthetic tick streams.
//!
//! Generates a deterministic market-data CSV for tests, benches and smoke
//! runs: each symbol follows an independent random walk around its initial
//! mid with a fixed half-spread, and all symbols tick on a shared clock so
//! every timestamp carries one record per symbol.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use fxlab_core::domain::{Symbol, TimestampNs};

#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub seed: u64,
    pub symbols: Vec<Symbol>,
    pub ticks_per_symbol: usize,
    pub start_ns: TimestampNs,
    pub interval_ns: TimestampNs,
    pub initial_mid: f64,
    pub half_spread: f64,
    pub size: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            symbols: vec!["EUR/USD".to_string(), "USD/JPY".to_string()],
            ticks_per_symbol: 1_000,
            start_ns: 1_700_000_000_000_000_000,
            interval_ns: 1_000_000_000,
            initial_mid: 1.1000,
            half_spread: 0.0001,
            size: 1e6,
        }
    }
}

/// Renders the stream as replayer-ready CSV. Same config, same bytes.
pub fn generate_csv(config: &SyntheticConfig) -> String {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut mids = vec![config.initial_mid; config.symbols.len()];
    let mut out = String::new();

    for tick in 0..config.ticks_per_symbol {
        let timestamp = config.start_ns + tick as TimestampNs * config.interval_ns;
        for (index, symbol) in config.symbols.iter().enumerate() {
            // Random walk, +/- 5bp per tick.
            let step: f64 = rng.gen_range(-5e-4..5e-4);
            mids[index] *= 1.0 + step;
            let bid = mids[index] - config.half_spread;
            let ask = mids[index] + config.half_spread;
            out.push_str(&format!(
                "{timestamp},{symbol},{size:.0},{bid:.6},{size:.0},{ask:.6}\n",
                size = config.size,
            ));
        }
    }
    out
}
