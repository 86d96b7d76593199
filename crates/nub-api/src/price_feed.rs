use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use nub_engine::PriceBook;
use nub_types::models::{CryptoCurrency, PriceSnapshot};

pub const DEFAULT_PRICE_FEED_URL: &str =
    "https://api.coingecko.com/api/v3/simple/price?ids=bitcoin,ethereum,litecoin,tether&vs_currencies=usd";
pub const DEFAULT_POLL_SECS: u64 = 60;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Body of the simple-price endpoint: asset id -> quote currency -> price.
pub type SimplePriceResponse = HashMap<String, HashMap<String, f64>>;

/// Pick the USD price of every accepted currency out of a simple-price response. Missing assets are
/// left out, so the book keeps its previous value for them.
pub fn snapshot_from_response(body: &SimplePriceResponse, fetched_at: DateTime<Utc>) -> PriceSnapshot {
    let prices: BTreeMap<CryptoCurrency, f64> = CryptoCurrency::ALL
        .into_iter()
        .filter_map(|c| {
            body.get(c.price_feed_id())
                .and_then(|quotes| quotes.get("usd"))
                .map(|usd| (c, *usd))
        })
        .collect();
    PriceSnapshot { prices, fetched_at }
}

pub async fn fetch_prices(client: &reqwest::Client, url: &str) -> anyhow::Result<PriceSnapshot> {
    let body: SimplePriceResponse = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(snapshot_from_response(&body, Utc::now()))
}

/// Background task that keeps the shared price book fresh.
///
/// A failed fetch is logged and skipped; the last known prices stay in place until the next tick.
pub async fn run_price_feed_loop(prices: Arc<RwLock<PriceBook>>, url: String, interval_secs: u64) {
    let client = match reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => {
            warn!("Price feed disabled, could not build HTTP client: {}", e);
            return;
        }
    };
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    info!("Price feed polling {} every {}s", url, interval_secs);

    loop {
        interval.tick().await;

        match fetch_prices(&client, &url).await {
            Ok(snapshot) => match prices.write() {
                Ok(mut book) => {
                    if book.apply(snapshot) {
                        debug!("Prices updated at {}", book.fetched_at());
                    }
                }
                Err(e) => warn!("Price book lock poisoned: {}", e),
            },
            Err(e) => warn!("Price fetch failed: {:#}", e),
        }
    }
}
