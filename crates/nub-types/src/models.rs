use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Chat thread id for system alerts (e.g. new guest orders).
pub const SYSTEM_THREAD: &str = "system";
/// Chat thread id for admin broadcasts visible to everyone.
pub const GLOBAL_THREAD: &str = "global";

// -- Trading --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeMode {
    /// Customer buys DLs from the desk and pays in crypto.
    Buy,
    /// Customer sells DLs to the desk and receives crypto.
    Sell,
}

impl TradeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl fmt::Display for TradeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeMode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BUY" => Ok(Self::Buy),
            "SELL" => Ok(Self::Sell),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CryptoCurrency {
    Btc,
    Eth,
    Ltc,
    Usdt,
}

impl CryptoCurrency {
    pub const ALL: [CryptoCurrency; 4] = [Self::Btc, Self::Eth, Self::Ltc, Self::Usdt];

    pub fn ticker(&self) -> &'static str {
        match self {
            Self::Btc => "BTC",
            Self::Eth => "ETH",
            Self::Ltc => "LTC",
            Self::Usdt => "USDT",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Btc => "Bitcoin",
            Self::Eth => "Ethereum",
            Self::Ltc => "Litecoin",
            Self::Usdt => "Tether (TRC20)",
        }
    }

    /// Asset id used by the market price endpoint.
    pub fn price_feed_id(&self) -> &'static str {
        match self {
            Self::Btc => "bitcoin",
            Self::Eth => "ethereum",
            Self::Ltc => "litecoin",
            Self::Usdt => "tether",
        }
    }

    /// Decimal places shown for amounts of this currency. The stable coin only needs cents.
    pub fn display_decimals(&self) -> usize {
        match self {
            Self::Usdt => 2,
            _ => 6,
        }
    }
}

impl fmt::Display for CryptoCurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ticker())
    }
}

impl FromStr for CryptoCurrency {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BTC" | "BITCOIN" => Ok(Self::Btc),
            "ETH" | "ETHEREUM" => Ok(Self::Eth),
            "LTC" | "LITECOIN" => Ok(Self::Ltc),
            "USDT" | "TETHER" | "TETHER (TRC20)" => Ok(Self::Usdt),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    /// Customer reports the payment (or DL drop) as sent.
    Paid,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "PAID" => Ok(Self::Paid),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown value '{}'", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

/// A delivery target inside the game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDestination {
    pub grow_id: String,
    pub world_name: String,
}

impl OrderDestination {
    pub fn is_complete(&self) -> bool {
        !self.grow_id.trim().is_empty() && !self.world_name.trim().is_empty()
    }
}

/// A safe-mode destination together with its share of the order quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocatedDestination {
    pub grow_id: String,
    pub world_name: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub trade_mode: TradeMode,
    /// Quantity of Diamond Locks.
    pub amount: f64,
    pub crypto_amount: f64,
    pub currency: CryptoCurrency,
    pub total_usd: f64,
    /// Primary GrowID, or a placeholder when the order is split.
    pub grow_id: String,
    pub world_name: String,
    pub is_safe_mode: bool,
    pub is_guest: bool,
    pub destinations: Vec<AllocatedDestination>,
    /// Customer email, or the guest session id.
    pub owner_id: String,
    pub status: OrderStatus,
    pub tx_hash: Option<String>,
    pub payout_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

// -- Market configuration --

/// USD price of one Diamond Lock in each trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateInfo {
    pub buy_rate: f64,
    pub sell_rate: f64,
}

impl RateInfo {
    pub fn rate_for(&self, mode: TradeMode) -> f64 {
        match mode {
            TradeMode::Buy => self.buy_rate,
            TradeMode::Sell => self.sell_rate,
        }
    }
}

impl Default for RateInfo {
    fn default() -> Self {
        Self {
            buy_rate: 0.35,
            sell_rate: 0.28,
        }
    }
}

/// Desk receiving addresses, one per accepted currency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletConfig {
    #[serde(rename = "BTC", default)]
    pub btc: String,
    #[serde(rename = "ETH", default)]
    pub eth: String,
    #[serde(rename = "LTC", default)]
    pub ltc: String,
    #[serde(rename = "USDT", default)]
    pub usdt: String,
}

impl WalletConfig {
    pub fn address(&self, currency: CryptoCurrency) -> &str {
        match currency {
            CryptoCurrency::Btc => &self.btc,
            CryptoCurrency::Eth => &self.eth,
            CryptoCurrency::Ltc => &self.ltc,
            CryptoCurrency::Usdt => &self.usdt,
        }
    }

    pub fn set_address(&mut self, currency: CryptoCurrency, address: String) {
        match currency {
            CryptoCurrency::Btc => self.btc = address,
            CryptoCurrency::Eth => self.eth = address,
            CryptoCurrency::Ltc => self.ltc = address,
            CryptoCurrency::Usdt => self.usdt = address,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSettings {
    /// World where sellers drop their DLs.
    pub drop_world_name: String,
    /// When set, an admin answers chat and the bot stays quiet.
    pub live_support: bool,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            drop_world_name: "MARKET123".to_string(),
            live_support: false,
        }
    }
}

/// USD spot prices for every accepted currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub prices: BTreeMap<CryptoCurrency, f64>,
    pub fetched_at: DateTime<Utc>,
}

// -- Accounts --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

// -- Support chat --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    /// The support bot.
    Model,
    Admin,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
            Self::Admin => "admin",
        }
    }
}

impl FromStr for ChatRole {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "model" => Ok(Self::Model),
            "admin" => Ok(Self::Admin),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: ChatRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Thread the message belongs to: customer email, guest session id, `system` or `global`.
    pub user_id: String,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}
