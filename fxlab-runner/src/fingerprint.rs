//! Deterministic run identification.
//!
//! A run is identified by a BLAKE3 hash over the market-data bytes, the venue
//! settings and the strategy name. Two runs with the same fingerprint produce
//! byte-identical output, so the fingerprint doubles as a regression key.

use fxlab_core::execution::Settings;

/// Computes the fingerprint for a run.
///
/// Settings are canonicalised through sorted-key JSON so field order can
/// never perturb the hash.
pub fn run_fingerprint(data: &[u8], settings: &Settings, strategy: &str) -> String {
    let canonical = serde_json::json!({
        "inbound_delay": settings.inbound_delay,
        "max_nop": settings.max_nop,
        "min_order_gap": settings.min_order_gap,
        "outbound_delay": settings.outbound_delay,
        "strategy": strategy,
    });

    let mut hasher = blake3::Hasher::new();
    hasher.update(data);
    hasher.update(canonical.to_string().as_bytes());
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings {
            inbound_delay: 1_000_000,
            outbound_delay: 1_000_000,
            min_order_gap: 10_000_000_000,
            max_nop: 10e6,
        }
    }

    #[test]
    fn identical_inputs_hash_identically() {
        let a = run_fingerprint(b"tick data", &settings(), "flipper");
        let b = run_fingerprint(b"tick data", &settings(), "flipper");
        assert_eq!(a, b);
    }

    #[test]
    fn data_settings_and_strategy_all_contribute() {
        let base = run_fingerprint(b"tick data", &settings(), "flipper");
        assert_ne!(base, run_fingerprint(b"other data", &settings(), "flipper"));
        assert_ne!(base, run_fingerprint(b"tick data", &settings(), "noop"));

        let mut tweaked = settings();
        tweaked.max_nop = 1e6;
        assert_ne!(base, run_fingerprint(b"tick data", &tweaked, "flipper"));
    }
}
