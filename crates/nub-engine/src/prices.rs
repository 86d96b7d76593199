use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use nub_types::models::{CryptoCurrency, PriceSnapshot};

/// Prices used until the first successful fetch.
pub const FALLBACK_PRICES: [(CryptoCurrency, f64); 4] = [
    (CryptoCurrency::Btc, 65_000.0),
    (CryptoCurrency::Eth, 3_500.0),
    (CryptoCurrency::Ltc, 85.0),
    (CryptoCurrency::Usdt, 1.0),
];

/// Latest USD spot price per currency.
///
/// Fetches can resolve out of order, so [`PriceBook::apply`] only accepts snapshots that are newer
/// than the one it already holds.
#[derive(Debug, Clone)]
pub struct PriceBook {
    prices: BTreeMap<CryptoCurrency, f64>,
    fetched_at: DateTime<Utc>,
}

impl Default for PriceBook {
    fn default() -> Self {
        Self {
            prices: FALLBACK_PRICES.into_iter().collect(),
            fetched_at: DateTime::<Utc>::default(),
        }
    }
}

impl PriceBook {
    pub fn price(&self, currency: CryptoCurrency) -> Option<f64> {
        self.prices.get(&currency).copied().filter(|p| *p > 0.0)
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Merge a fetched snapshot. Returns `false` and leaves the book untouched when the snapshot is
    /// not newer than the current one. Non-positive prices in the snapshot are ignored.
    pub fn apply(&mut self, snapshot: PriceSnapshot) -> bool {
        if snapshot.fetched_at <= self.fetched_at {
            debug!(
                "Discarding stale price snapshot from {} (holding {})",
                snapshot.fetched_at, self.fetched_at
            );
            return false;
        }
        for (currency, price) in snapshot.prices {
            if price.is_finite() && price > 0.0 {
                self.prices.insert(currency, price);
            }
        }
        self.fetched_at = snapshot.fetched_at;
        true
    }

    pub fn snapshot(&self) -> PriceSnapshot {
        PriceSnapshot {
            prices: self.prices.clone(),
            fetched_at: self.fetched_at,
        }
    }
}
