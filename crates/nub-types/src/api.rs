use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    ChatMessage, CryptoCurrency, OrderDestination, OrderStatus, TradeMode, GLOBAL_THREAD,
};

// -- Sessions --

/// Who is on the other end of a request. Resolved once at login and carried in the JWT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Session {
    Guest {
        session_id: String,
    },
    Customer {
        user_id: Uuid,
        email: String,
        username: String,
    },
    Admin {
        email: String,
    },
}

impl Session {
    /// Id used as order owner and chat thread.
    pub fn owner_id(&self) -> &str {
        match self {
            Self::Guest { session_id } => session_id,
            Self::Customer { email, .. } => email,
            Self::Admin { .. } => GLOBAL_THREAD,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin { .. })
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, Self::Guest { .. })
    }
}

/// JWT claims shared by the REST middleware and the gateway upgrade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub session: Session,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub session: Session,
}

// -- Market --

/// The quote field the user edited last. It is authoritative; the other two are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteField {
    Quantity,
    Crypto,
    Fiat,
}

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub mode: TradeMode,
    pub currency: Option<CryptoCurrency>,
    pub field: QuoteField,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteResponse {
    pub quantity: f64,
    pub total_usd: f64,
    pub crypto_amount: f64,
    /// Crypto amount formatted for display, absent until a currency is chosen.
    pub crypto_display: Option<String>,
    pub rate: f64,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxidStatus {
    Idle,
    Validating,
    Valid,
    Invalid,
}

#[derive(Debug, Deserialize)]
pub struct TxidCheckRequest {
    pub currency: CryptoCurrency,
    pub tx_hash: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TxidCheckResponse {
    pub status: TxidStatus,
    pub explorer_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SplitQuery {
    pub total: f64,
    pub worlds: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SplitResponse {
    pub allocations: Vec<f64>,
}

#[derive(Debug, Deserialize)]
pub struct LockQuery {
    #[serde(default)]
    pub world_locks: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LockConversion {
    pub world_locks: f64,
    pub diamond_locks: f64,
    pub blue_gem_locks: f64,
}

// -- Orders --

fn default_world_count() -> usize {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitOrderRequest {
    pub mode: TradeMode,
    pub amount: f64,
    pub currency: Option<CryptoCurrency>,
    #[serde(default)]
    pub grow_id: String,
    #[serde(default)]
    pub world_name: String,
    #[serde(default)]
    pub is_safe_mode: bool,
    #[serde(default = "default_world_count")]
    pub world_count: usize,
    #[serde(default)]
    pub destinations: Vec<OrderDestination>,
    pub tx_hash: Option<String>,
    pub payout_address: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderFilter {
    #[default]
    All,
    /// Pending or paid, i.e. still in flight.
    Pending,
    Completed,
}

impl OrderFilter {
    pub fn matches(&self, status: OrderStatus) -> bool {
        match self {
            Self::All => true,
            Self::Pending => matches!(status, OrderStatus::Pending | OrderStatus::Paid),
            Self::Completed => status == OrderStatus::Completed,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    #[serde(default)]
    pub filter: OrderFilter,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// Payment proof pasted by the buyer after sending funds.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttachTxRequest {
    pub tx_hash: String,
}

/// How the customer completes a payment for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentInstructions {
    /// Parameters for a browser wallet `eth_sendTransaction` call.
    EthTransaction { to: String, value_wei: String },
    /// Hand-off to an external wallet app via a payment URI.
    Uri { uri: String },
    /// Copy the address and send manually.
    Manual { address: String },
}

// -- Admin --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateSettingsRequest {
    pub drop_world_name: Option<String>,
    pub live_support: Option<bool>,
}

// -- Chat --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendChatRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdminChatRequest {
    pub text: String,
    pub target_user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatPostResponse {
    pub message: ChatMessage,
    /// Bot reply, absent while live support is on.
    pub reply: Option<ChatMessage>,
}
