//! Fair-price resolution and portfolio aggregates.

use std::rc::Rc;

use crate::domain::{Position, Price, Quantity, TopOfBook};
use crate::pubsub::CacheSubscriber;

/// Valuation over a set of asset positions.
///
/// `pnl` and `nop` are derived entirely from [`fair_price`](Risk::fair_price);
/// implementations only decide where fair prices come from. A NaN fair price
/// propagates into both aggregates rather than aborting.
pub trait Risk {
    /// Fair price of one unit of `asset`, in USD. NaN when unknown.
    fn fair_price(&self, asset: &str) -> Price;

    /// Portfolio value: sum of position times fair price.
    fn pnl(&self, positions: &mut dyn Iterator<Item = (&str, Position)>) -> Quantity {
        let mut pnl = 0.0;
        for (asset, position) in positions {
            pnl += position * self.fair_price(asset);
        }
        pnl
    }

    /// Net open position: the larger of total long and total short exposure,
    /// each valued at fair prices.
    fn nop(&self, positions: &mut dyn Iterator<Item = (&str, Position)>) -> Quantity {
        let mut longs = 0.0;
        let mut shorts = 0.0;
        for (asset, position) in positions {
            if position >= 0.0 {
                longs += position * self.fair_price(asset);
            } else {
                shorts -= position * self.fair_price(asset);
            }
        }
        if longs.is_nan() || shorts.is_nan() {
            return f64::NAN;
        }
        longs.max(shorts)
    }
}

/// Fair prices resolved from cached top-of-book records.
///
/// USD is the numeraire: an asset quoted as `A/USD` prices at the midpoint,
/// one quoted as `USD/A` at the midpoint of the inverse. Assets with neither
/// pair cached are NaN.
#[derive(Clone)]
pub struct SpotRiskModel {
    tob_cache: Rc<CacheSubscriber<TopOfBook>>,
}

impl SpotRiskModel {
    pub fn new(tob_cache: Rc<CacheSubscriber<TopOfBook>>) -> Self {
        Self { tob_cache }
    }
}

impl Risk for SpotRiskModel {
    fn fair_price(&self, asset: &str) -> Price {
        if asset == "USD" {
            return 1.0;
        }
        if let Some(book) = self.tob_cache.cached_record(&format!("{asset}/USD")) {
            let book = book.borrow();
            return (book.bid_price + book.ask_price) / 2.0;
        }
        if let Some(book) = self.tob_cache.cached_record(&format!("USD/{asset}")) {
            let book = book.borrow();
            return 2.0 / (book.bid_price + book.ask_price);
        }
        f64::NAN
    }
}
