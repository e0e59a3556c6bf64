//! Currency-pair symbology.
//!
//! A [`Symbol`] is a currency pair in the `"BBB/QQQ"` form, where `BBB` is
//! the base currency and `QQQ` the quote currency, each a three-character
//! ISO 4217 code. An [`Asset`] is a single currency code.

/// A currency pair, e.g. `"EUR/USD"`.
pub type Symbol = String;

/// A single currency code, e.g. `"EUR"`.
pub type Asset = String;

/// Extracts the base currency from a currency pair.
///
/// No validation is performed; a symbol shorter than six characters panics
/// here rather than producing garbage downstream.
pub fn base_asset(symbol: &str) -> Asset {
    symbol[0..3].to_string()
}

/// Extracts the quote currency from a currency pair.
pub fn quote_asset(symbol: &str) -> Asset {
    symbol[4..7].to_string()
}
