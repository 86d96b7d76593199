//! Turning a submitted trade form into an [`Order`], and moving orders through their lifecycle.
use chrono::{DateTime, Utc};
use rand::Rng;
use thiserror::Error;

use nub_types::api::{Session, SubmitOrderRequest};
use nub_types::models::{
    AllocatedDestination, CryptoCurrency, Order, OrderDestination, OrderStatus, RateInfo, TradeMode,
};

use crate::prices::PriceBook;
use crate::split::{self, SplitError};
use crate::{rates, txid};

pub const ORDER_ID_LEN: usize = 9;
pub const SAFE_MODE_GROW_ID: &str = "Multiple (Safe Mode)";
pub const SAFE_MODE_WORLD: &str = "See Destinations";

const BASE36: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderError {
    #[error("Quantity must be greater than zero")]
    InvalidQuantity,
    #[error("Select a currency")]
    MissingCurrency,
    #[error("A valid {0} payout address is required")]
    PayoutAddress(CryptoCurrency),
    #[error("Transaction hash is not a valid {0} hash")]
    TxHash(CryptoCurrency),
    #[error("GrowID and world name are required")]
    MissingDelivery,
    #[error(transparent)]
    Split(#[from] SplitError),
    #[error("Expected {expected} destinations, got {got}")]
    DestinationCount { expected: usize, got: usize },
    #[error("Destination {0} is missing a GrowID or world name")]
    IncompleteDestination(usize),
    #[error("Order is already {0}")]
    UnchangedStatus(OrderStatus),
    #[error("Cannot move an order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("Only buy orders carry a payment transaction")]
    NotBuyOrder,
    #[error("Order is {0} and no longer accepts a transaction hash")]
    TxHashLocked(OrderStatus),
}

/// Fields of the trade form as submitted.
#[derive(Debug, Clone)]
pub struct OrderForm {
    pub mode: TradeMode,
    pub quantity: f64,
    pub currency: Option<CryptoCurrency>,
    pub grow_id: String,
    pub world_name: String,
    pub is_safe_mode: bool,
    pub world_count: usize,
    pub destinations: Vec<OrderDestination>,
    pub tx_hash: Option<String>,
    pub payout_address: Option<String>,
}

impl From<SubmitOrderRequest> for OrderForm {
    fn from(req: SubmitOrderRequest) -> Self {
        Self {
            mode: req.mode,
            quantity: req.amount,
            currency: req.currency,
            grow_id: req.grow_id,
            world_name: req.world_name,
            is_safe_mode: req.is_safe_mode,
            world_count: req.world_count,
            destinations: req.destinations,
            tx_hash: req.tx_hash,
            payout_address: req.payout_address,
        }
    }
}

impl OrderForm {
    /// Check the form and return the selected currency.
    pub fn validate(&self) -> Result<CryptoCurrency, OrderError> {
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(OrderError::InvalidQuantity);
        }
        let currency = self.currency.ok_or(OrderError::MissingCurrency)?;

        match self.mode {
            TradeMode::Sell => {
                let address = self.payout_address.as_deref().unwrap_or_default();
                if !txid::validate_payout_address(currency, address) {
                    return Err(OrderError::PayoutAddress(currency));
                }
            }
            TradeMode::Buy => {
                if let Some(hash) = non_empty(self.tx_hash.as_deref()) {
                    if !txid::is_valid_txid(currency, hash) {
                        return Err(OrderError::TxHash(currency));
                    }
                }
            }
        }

        if self.is_safe_mode {
            split::check_world_count(self.world_count)?;
            if self.destinations.len() != self.world_count {
                return Err(OrderError::DestinationCount {
                    expected: self.world_count,
                    got: self.destinations.len(),
                });
            }
            if let Some(i) = self.destinations.iter().position(|d| !d.is_complete()) {
                return Err(OrderError::IncompleteDestination(i + 1));
            }
        } else if self.grow_id.trim().is_empty() || self.world_name.trim().is_empty() {
            return Err(OrderError::MissingDelivery);
        }

        Ok(currency)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Random 9-character uppercase base-36 id, e.g. `K3Z9Q0A7M`.
pub fn generate_order_id() -> String {
    random_base36(ORDER_ID_LEN)
}

pub(crate) fn random_base36(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect()
}

/// Validate `form` and snapshot it into a new pending order owned by `session`.
///
/// `total_usd` and `crypto_amount` are frozen here. Later rate or price changes do not touch
/// existing orders.
pub fn build_order(
    form: OrderForm,
    rates: &RateInfo,
    prices: &PriceBook,
    session: &Session,
    now: DateTime<Utc>,
) -> Result<Order, OrderError> {
    let currency = form.validate()?;

    let total_usd = rates::fiat_total(form.quantity, rates.rate_for(form.mode));
    let crypto_amount = rates::crypto_amount(total_usd, prices.price(currency).unwrap_or(0.0));

    let (grow_id, world_name, destinations) = if form.is_safe_mode {
        let shares = split::allocate(form.quantity, form.world_count)?;
        let destinations = form
            .destinations
            .into_iter()
            .zip(shares)
            .map(|(d, amount)| AllocatedDestination {
                grow_id: d.grow_id.trim().to_string(),
                world_name: d.world_name.trim().to_string(),
                amount,
            })
            .collect();
        (SAFE_MODE_GROW_ID.to_string(), SAFE_MODE_WORLD.to_string(), destinations)
    } else {
        (
            form.grow_id.trim().to_string(),
            form.world_name.trim().to_string(),
            Vec::new(),
        )
    };

    let tx_hash = match form.mode {
        TradeMode::Buy => non_empty(form.tx_hash.as_deref()).map(str::to_string),
        TradeMode::Sell => None,
    };
    let payout_address = match form.mode {
        TradeMode::Sell => non_empty(form.payout_address.as_deref()).map(str::to_string),
        TradeMode::Buy => None,
    };

    Ok(Order {
        id: generate_order_id(),
        trade_mode: form.mode,
        amount: form.quantity,
        crypto_amount,
        currency,
        total_usd,
        grow_id,
        world_name,
        is_safe_mode: form.is_safe_mode,
        is_guest: session.is_guest(),
        destinations,
        owner_id: session.owner_id().to_string(),
        status: OrderStatus::Pending,
        tx_hash,
        payout_address,
        created_at: now,
        updated_at: now,
        completed_at: None,
    })
}

/// Whether an order may move from `from` to `to`. Statuses only move forward.
pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    matches!(
        (from, to),
        (Pending, Paid) | (Pending, Completed) | (Pending, Cancelled) | (Paid, Completed) | (Paid, Cancelled)
    )
}

pub fn apply_status(order: &mut Order, status: OrderStatus, now: DateTime<Utc>) -> Result<(), OrderError> {
    if order.status == status {
        return Err(OrderError::UnchangedStatus(status));
    }
    if !can_transition(order.status, status) {
        return Err(OrderError::InvalidTransition {
            from: order.status,
            to: status,
        });
    }
    order.status = status;
    order.updated_at = now;
    if status == OrderStatus::Completed {
        order.completed_at = Some(now);
    }
    Ok(())
}

/// Record the buyer's payment transaction on a pending buy order. A later call replaces the hash.
pub fn attach_tx_hash(order: &mut Order, raw: &str, now: DateTime<Utc>) -> Result<(), OrderError> {
    if order.trade_mode != TradeMode::Buy {
        return Err(OrderError::NotBuyOrder);
    }
    if order.status != OrderStatus::Pending {
        return Err(OrderError::TxHashLocked(order.status));
    }
    let hash = raw.trim();
    if !txid::is_valid_txid(order.currency, hash) {
        return Err(OrderError::TxHash(order.currency));
    }
    order.tx_hash = Some(hash.to_string());
    order.updated_at = now;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const ETH_HASH: &str = "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060";
    const LTC_ADDRESS: &str = "ltc1qg82e7yrw9nq7hq3k2a0dk8wdj4r6c9d0wzv6ft";

    fn guest() -> Session {
        Session::Guest {
            session_id: "sess_abc123xyz".into(),
        }
    }

    fn customer() -> Session {
        Session::Customer {
            user_id: uuid::Uuid::new_v4(),
            email: "buyer@example.com".into(),
            username: "buyer".into(),
        }
    }

    fn buy_form() -> OrderForm {
        OrderForm {
            mode: TradeMode::Buy,
            quantity: 100.0,
            currency: Some(CryptoCurrency::Eth),
            grow_id: "NUBKING".into(),
            world_name: "DROPZONE".into(),
            is_safe_mode: false,
            world_count: split::DEFAULT_WORLDS,
            destinations: Vec::new(),
            tx_hash: None,
            payout_address: None,
        }
    }

    fn destinations(n: usize) -> Vec<OrderDestination> {
        (0..n)
            .map(|i| OrderDestination {
                grow_id: format!("ALT{i}"),
                world_name: format!("WORLD{i}"),
            })
            .collect()
    }

    fn build(form: OrderForm, session: &Session) -> Result<Order, OrderError> {
        build_order(form, &RateInfo::default(), &PriceBook::default(), session, Utc::now())
    }

    #[test]
    fn new_order_is_pending_with_snapshot_totals() {
        let order = build(buy_form(), &customer()).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_usd, 100.0 * 0.35);
        assert_eq!(order.crypto_amount, 100.0 * 0.35 / 3_500.0);
        assert_eq!(order.owner_id, "buyer@example.com");
        assert!(!order.is_guest);
        assert!(order.completed_at.is_none());
        assert_eq!(order.created_at, order.updated_at);
    }

    #[test]
    fn order_ids_are_uppercase_base36() {
        let id = generate_order_id();
        assert_eq!(id.len(), ORDER_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn guest_orders_are_flagged() {
        let order = build(buy_form(), &guest()).unwrap();
        assert!(order.is_guest);
        assert_eq!(order.owner_id, "sess_abc123xyz");
    }

    #[test]
    fn rejects_non_positive_quantity_and_missing_currency() {
        let mut form = buy_form();
        form.quantity = 0.0;
        assert_eq!(form.validate(), Err(OrderError::InvalidQuantity));

        let mut form = buy_form();
        form.currency = None;
        assert_eq!(form.validate(), Err(OrderError::MissingCurrency));
    }

    #[test]
    fn empty_delivery_field_is_rejected() {
        let mut form = buy_form();
        form.world_name = "   ".into();
        assert_eq!(build(form, &guest()), Err(OrderError::MissingDelivery));
    }

    #[test]
    fn safe_mode_needs_exactly_n_destinations() {
        let mut form = buy_form();
        form.is_safe_mode = true;
        form.world_count = 5;
        form.destinations = destinations(4);
        assert_eq!(
            build(form, &guest()),
            Err(OrderError::DestinationCount { expected: 5, got: 4 })
        );
    }

    #[test]
    fn safe_mode_rejects_blank_destination() {
        let mut form = buy_form();
        form.is_safe_mode = true;
        form.world_count = 3;
        form.destinations = destinations(3);
        form.destinations[1].grow_id.clear();
        assert_eq!(form.validate(), Err(OrderError::IncompleteDestination(2)));
    }

    #[test]
    fn safe_mode_rejects_world_count_out_of_range() {
        let mut form = buy_form();
        form.is_safe_mode = true;
        form.world_count = 11;
        form.destinations = destinations(11);
        assert_eq!(form.validate(), Err(OrderError::Split(SplitError::WorldCount(11))));
    }

    #[test]
    fn safe_mode_attaches_split_amounts() {
        let mut form = buy_form();
        form.quantity = 17.0;
        form.is_safe_mode = true;
        form.world_count = 5;
        form.destinations = destinations(5);
        form.grow_id.clear();
        let order = build(form, &guest()).unwrap();

        assert_eq!(order.grow_id, SAFE_MODE_GROW_ID);
        assert_eq!(order.world_name, SAFE_MODE_WORLD);
        let amounts: Vec<f64> = order.destinations.iter().map(|d| d.amount).collect();
        assert_eq!(amounts, vec![4.0, 4.0, 3.0, 3.0, 3.0]);
        assert_eq!(order.destinations[2].world_name, "WORLD2");
    }

    #[test]
    fn sell_requires_valid_payout_address() {
        let mut form = buy_form();
        form.mode = TradeMode::Sell;
        form.currency = Some(CryptoCurrency::Ltc);
        assert_eq!(form.validate(), Err(OrderError::PayoutAddress(CryptoCurrency::Ltc)));

        form.payout_address = Some(LTC_ADDRESS.into());
        let order = build(form, &customer()).unwrap();
        assert_eq!(order.total_usd, 100.0 * 0.28);
        assert_eq!(order.payout_address.as_deref(), Some(LTC_ADDRESS));
        assert_eq!(order.tx_hash, None);
    }

    #[test]
    fn buy_tx_hash_is_optional_but_checked() {
        let mut form = buy_form();
        form.tx_hash = Some(String::new());
        assert!(form.validate().is_ok());

        form.tx_hash = Some("0x1234".into());
        assert_eq!(form.validate(), Err(OrderError::TxHash(CryptoCurrency::Eth)));

        form.tx_hash = Some(ETH_HASH.into());
        let order = build(form, &customer()).unwrap();
        assert_eq!(order.tx_hash.as_deref(), Some(ETH_HASH));
    }

    #[test]
    fn completion_stamps_completed_at() {
        let mut order = build(buy_form(), &customer()).unwrap();
        let later = order.created_at + Duration::minutes(5);
        apply_status(&mut order, OrderStatus::Paid, later).unwrap();
        assert!(order.completed_at.is_none());

        let done = later + Duration::minutes(5);
        apply_status(&mut order, OrderStatus::Completed, done).unwrap();
        assert_eq!(order.completed_at, Some(done));
        assert_eq!(order.updated_at, done);
    }

    #[test]
    fn pending_can_skip_straight_to_completed() {
        let mut order = build(buy_form(), &customer()).unwrap();
        apply_status(&mut order, OrderStatus::Completed, Utc::now()).unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
    }

    #[test]
    fn statuses_never_regress() {
        let mut order = build(buy_form(), &customer()).unwrap();
        apply_status(&mut order, OrderStatus::Completed, Utc::now()).unwrap();
        for status in [OrderStatus::Pending, OrderStatus::Paid, OrderStatus::Cancelled] {
            assert_eq!(
                apply_status(&mut order, status, Utc::now()),
                Err(OrderError::InvalidTransition {
                    from: OrderStatus::Completed,
                    to: status
                })
            );
        }
        assert_eq!(
            apply_status(&mut order, OrderStatus::Completed, Utc::now()),
            Err(OrderError::UnchangedStatus(OrderStatus::Completed))
        );
    }

    #[test]
    fn tx_hash_can_be_attached_to_pending_buy() {
        let mut order = build(buy_form(), &guest()).unwrap();
        let later = order.created_at + Duration::minutes(2);

        assert_eq!(
            attach_tx_hash(&mut order, "0xnothex", later),
            Err(OrderError::TxHash(CryptoCurrency::Eth))
        );
        assert_eq!(attach_tx_hash(&mut order, "   ", later), Err(OrderError::TxHash(CryptoCurrency::Eth)));
        assert_eq!(order.tx_hash, None);

        attach_tx_hash(&mut order, &format!("  {ETH_HASH} "), later).unwrap();
        assert_eq!(order.tx_hash.as_deref(), Some(ETH_HASH));
        assert_eq!(order.updated_at, later);
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn tx_hash_is_refused_for_sell_or_settled_orders() {
        let mut form = buy_form();
        form.mode = TradeMode::Sell;
        form.currency = Some(CryptoCurrency::Ltc);
        form.payout_address = Some(LTC_ADDRESS.into());
        let mut sell = build(form, &customer()).unwrap();
        assert_eq!(attach_tx_hash(&mut sell, ETH_HASH, Utc::now()), Err(OrderError::NotBuyOrder));

        let mut paid = build(buy_form(), &customer()).unwrap();
        apply_status(&mut paid, OrderStatus::Paid, Utc::now()).unwrap();
        assert_eq!(
            attach_tx_hash(&mut paid, ETH_HASH, Utc::now()),
            Err(OrderError::TxHashLocked(OrderStatus::Paid))
        );
    }

    #[test]
    fn cancelled_is_terminal() {
        assert!(can_transition(OrderStatus::Paid, OrderStatus::Cancelled));
        assert!(!can_transition(OrderStatus::Cancelled, OrderStatus::Pending));
        assert!(!can_transition(OrderStatus::Paid, OrderStatus::Pending));
    }
}
