//! LockBot, the automatic support responder.
use thiserror::Error;

use nub_types::models::{CryptoCurrency, RateInfo};

#[derive(Debug, Error)]
#[error("Support responder failed: {0}")]
pub struct ResponderError(pub String);

/// Produces the bot's reply to a customer message.
///
/// `history` holds the thread's previous messages as `role: text` lines, oldest first.
pub trait SupportResponder: Send + Sync {
    fn respond(&self, message: &str, history: &[String], rates: &RateInfo) -> Result<String, ResponderError>;
}

/// Keyword-driven replies built from the live rates.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateResponder;

impl TemplateResponder {
    fn accepted_currencies() -> String {
        CryptoCurrency::ALL
            .iter()
            .map(|c| format!("{} ({})", c.display_name(), c.ticker()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn rates_line(rates: &RateInfo) -> String {
        format!(
            "We sell Diamond Locks at ${:.2} USD per DL and buy them at ${:.2} USD per DL.",
            rates.buy_rate, rates.sell_rate
        )
    }
}

impl SupportResponder for TemplateResponder {
    fn respond(&self, message: &str, history: &[String], rates: &RateInfo) -> Result<String, ResponderError> {
        let text = message.to_lowercase();
        let words = words(&text);
        let has = |phrases: &[&str]| phrases.iter().any(|p| contains_phrase(&words, p));

        let reply = if has(&["safe mode", "split", "splits", "splitting", "multiple worlds"]) {
            "Safe Mode splits your order across 2 to 10 worlds so no single drop carries the whole amount. \
             Turn it on in the trade form and enter a GrowID and world for each destination."
                .to_string()
        } else if has(&["sell", "selling"]) {
            format!(
                "To sell, open the Sell tab, enter your DL amount and a payout address, then drop the DLs in our \
                 drop world. {}",
                Self::rates_line(rates)
            )
        } else if has(&["buy", "buying", "purchase"]) {
            format!(
                "To buy, open the Buy tab, pick a currency and enter your GrowID and world. {}",
                Self::rates_line(rates)
            )
        } else if has(&["rate", "rates", "price", "prices", "how much", "cost", "costs"]) {
            Self::rates_line(rates)
        } else if has(&["pay", "payment", "paying", "crypto", "btc", "eth", "ltc", "usdt", "wallet"]) {
            format!("We accept {}.", Self::accepted_currencies())
        } else if has(&["hello", "hi", "hey"]) && history.is_empty() {
            "Hi! I'm LockBot, the Nub.market assistant. Ask me about rates, buying, selling or Safe Mode.".to_string()
        } else {
            "I can help with rates, buying, selling, payments and Safe Mode. For anything else, ask for live \
             support and a team member will reply here."
                .to_string()
        };
        Ok(reply)
    }
}

fn words(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).collect()
}

/// Whether the words of `phrase` appear consecutively in `words`.
fn contains_phrase(words: &[&str], phrase: &str) -> bool {
    let needle: Vec<&str> = phrase.split(' ').collect();
    words.windows(needle.len()).any(|w| w == needle.as_slice())
}
