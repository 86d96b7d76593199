//! Format checks for pasted transaction hashes and payout addresses.
//!
//! These are shape checks only. Nothing here confirms that a transaction exists on-chain.
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use regex::Regex;

use nub_types::api::TxidStatus;
use nub_types::models::CryptoCurrency;

/// Quiet period after the last keystroke before a hash is classified.
pub const DEBOUNCE: Duration = Duration::from_millis(600);

static ETH_TXID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[A-Fa-f0-9]{64}$").expect("static regex"));
static HEX_TXID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Fa-f0-9]{64}$").expect("static regex"));

static BTC_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(bc1[02-9ac-hj-np-z]{11,71}|[13][1-9A-HJ-NP-Za-km-z]{25,34})$").expect("static regex")
});
static ETH_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("static regex"));
static LTC_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(ltc1[02-9ac-hj-np-z]{11,71}|[LM3][1-9A-HJ-NP-Za-km-z]{26,33})$").expect("static regex")
});
static TRON_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^T[1-9A-HJ-NP-Za-km-z]{33}$").expect("static regex"));

/// Whether `hash` has the shape of a transaction id for `currency`.
pub fn is_valid_txid(currency: CryptoCurrency, hash: &str) -> bool {
    let hash = hash.trim();
    match currency {
        CryptoCurrency::Eth => ETH_TXID.is_match(hash),
        CryptoCurrency::Btc | CryptoCurrency::Ltc | CryptoCurrency::Usdt => HEX_TXID.is_match(hash),
    }
}

/// Classify raw input immediately. Empty input is `Idle`.
pub fn classify(currency: CryptoCurrency, raw: &str) -> TxidStatus {
    if raw.is_empty() {
        TxidStatus::Idle
    } else if is_valid_txid(currency, raw) {
        TxidStatus::Valid
    } else {
        TxidStatus::Invalid
    }
}

/// Whether `address` looks like a receiving address on the network used for `currency`.
pub fn validate_payout_address(currency: CryptoCurrency, address: &str) -> bool {
    let address = address.trim();
    match currency {
        CryptoCurrency::Btc => BTC_ADDRESS.is_match(address),
        CryptoCurrency::Eth => ETH_ADDRESS.is_match(address),
        CryptoCurrency::Ltc => LTC_ADDRESS.is_match(address),
        CryptoCurrency::Usdt => TRON_ADDRESS.is_match(address),
    }
}

/// Block explorer page for a transaction.
pub fn explorer_url(currency: CryptoCurrency, hash: &str) -> Option<String> {
    let hash = hash.trim();
    if hash.is_empty() {
        return None;
    }
    let url = match currency {
        CryptoCurrency::Btc => format!("https://mempool.space/tx/{hash}"),
        CryptoCurrency::Eth => format!("https://etherscan.io/tx/{hash}"),
        CryptoCurrency::Ltc => format!("https://blockchair.com/litecoin/transaction/{hash}"),
        CryptoCurrency::Usdt => format!("https://tronscan.org/#/transaction/{hash}"),
    };
    Some(url)
}

/// Debounced validation state for a hash input box.
///
/// Every edit puts the input back into `Validating` and pushes the deadline out by [`DEBOUNCE`]. Once
/// the deadline has passed, [`TxidDebouncer::poll`] settles on `Valid` or `Invalid`.
#[derive(Debug, Clone)]
pub struct TxidDebouncer {
    currency: CryptoCurrency,
    input: String,
    deadline: Option<Instant>,
    status: TxidStatus,
}

impl TxidDebouncer {
    pub fn new(currency: CryptoCurrency) -> Self {
        Self {
            currency,
            input: String::new(),
            deadline: None,
            status: TxidStatus::Idle,
        }
    }

    pub fn input(&mut self, text: &str, now: Instant) {
        self.input = text.to_string();
        if text.is_empty() {
            self.deadline = None;
            self.status = TxidStatus::Idle;
        } else {
            self.deadline = Some(now + DEBOUNCE);
            self.status = TxidStatus::Validating;
        }
    }

    /// Switching currency re-runs validation for the current input.
    pub fn set_currency(&mut self, currency: CryptoCurrency, now: Instant) {
        self.currency = currency;
        let input = std::mem::take(&mut self.input);
        self.input(&input, now);
    }

    pub fn poll(&mut self, now: Instant) -> TxidStatus {
        if let Some(deadline) = self.deadline {
            if now >= deadline {
                self.deadline = None;
                self.status = classify(self.currency, &self.input);
            }
        }
        self.status
    }

    pub fn status(&self) -> TxidStatus {
        self.status
    }
}
