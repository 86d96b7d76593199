use nub_types::api::{QuoteField, QuoteResponse};
use nub_types::models::{CryptoCurrency, RateInfo, TradeMode};

/// Parse a user-typed amount. Anything that is not a finite number counts as zero.
pub fn parse_amount(raw: &str) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// USD total for `quantity` DLs at `rate` USD per DL. Never rounded.
pub fn fiat_total(quantity: f64, rate: f64) -> f64 {
    quantity * rate
}

/// Crypto amount worth `fiat` USD. Skipped (zero) while no positive price is known.
pub fn crypto_amount(fiat: f64, price: f64) -> f64 {
    if price > 0.0 { fiat / price } else { 0.0 }
}

/// Display form of a crypto amount: 2 decimals for the stable coin, 6 otherwise.
pub fn format_crypto(amount: f64, currency: CryptoCurrency) -> String {
    format!("{:.*}", currency.display_decimals(), amount)
}

/// Converts between DL quantity, USD and crypto using the desk's configured rates.
#[derive(Debug, Clone, Copy)]
pub struct RateEngine {
    rates: RateInfo,
}

impl RateEngine {
    pub fn new(rates: RateInfo) -> Self {
        Self { rates }
    }

    pub fn rates(&self) -> RateInfo {
        self.rates
    }

    pub fn rate_for(&self, mode: TradeMode) -> f64 {
        self.rates.rate_for(mode)
    }

    pub fn fiat_total(&self, mode: TradeMode, quantity: f64) -> f64 {
        fiat_total(quantity, self.rate_for(mode))
    }

    /// Recompute all three quote fields from whichever one the user edited last.
    ///
    /// `price` is the USD price of the selected currency. Without a currency (`None`) the crypto side
    /// stays at zero and a crypto-field edit cannot be converted.
    pub fn quote(
        &self,
        mode: TradeMode,
        currency: Option<CryptoCurrency>,
        price: Option<f64>,
        field: QuoteField,
        raw: &str,
    ) -> QuoteResponse {
        let rate = self.rate_for(mode);
        let price_value = price.unwrap_or(0.0);
        let value = parse_amount(raw);

        let quantity = match field {
            QuoteField::Quantity => value.max(0.0),
            QuoteField::Crypto if price_value > 0.0 && rate > 0.0 => value * price_value / rate,
            QuoteField::Crypto => 0.0,
            QuoteField::Fiat if rate > 0.0 => value / rate,
            QuoteField::Fiat => 0.0,
        };
        let quantity = quantity.max(0.0);

        let total_usd = fiat_total(quantity, rate);
        let crypto = match currency {
            Some(_) => crypto_amount(total_usd, price_value),
            None => 0.0,
        };

        QuoteResponse {
            quantity,
            total_usd,
            crypto_amount: crypto,
            crypto_display: currency.map(|c| format_crypto(crypto, c)),
            rate,
            price,
        }
    }
}
