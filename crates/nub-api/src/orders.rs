use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;

use nub_engine::order::{OrderForm, attach_tx_hash, build_order};
use nub_engine::{chat, payment};
use nub_types::api::{AttachTxRequest, OrderListQuery, Session, SubmitOrderRequest};
use nub_types::events::GatewayEvent;
use nub_types::models::{Order, TradeMode};

use crate::error::ApiError;
use crate::state::{AppState, AppStateInner, run_db};

/// Load an order the session is allowed to see. Other people's orders read as missing.
pub(crate) fn load_visible_order(state: &AppStateInner, session: &Session, id: &str) -> Result<Order, ApiError> {
    match state.db.get_order(id)? {
        Some(order) if session.is_admin() || order.owner_id == session.owner_id() => Ok(order),
        _ => Err(ApiError::NotFound(format!("Order {id}"))),
    }
}

pub async fn submit_order(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<SubmitOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if session.is_admin() {
        return Err(ApiError::Forbidden);
    }

    let book = state.price_book()?;
    let form = OrderForm::from(req);

    let (order, alert) = run_db(&state, move |state| {
        let rates = state.db.get_rates()?;
        let now = Utc::now();
        let order = build_order(form, &rates, &book, &session, now)?;
        state.db.insert_order(&order)?;

        let alert = if order.is_guest {
            let alert = chat::guest_order_alert(&order, now);
            state.db.insert_message(&alert)?;
            Some(alert)
        } else {
            None
        };
        Ok((order, alert))
    })
    .await?;

    info!(
        "Order {} placed by {}: {} {} DL for ${:.2}",
        order.id, order.owner_id, order.trade_mode, order.amount, order.total_usd
    );
    if let Some(alert) = alert {
        state.dispatcher.broadcast(GatewayEvent::MessageCreate(alert));
    }

    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<OrderListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let orders = run_db(&state, move |state| {
        let owner = (!session.is_admin()).then(|| session.owner_id().to_string());
        Ok(state.db.list_orders(owner.as_deref())?)
    })
    .await?;

    let orders: Vec<Order> = orders
        .into_iter()
        .filter(|o| query.filter.matches(o.status))
        .collect();
    Ok(Json(orders))
}

pub async fn get_order(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(order_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let order = run_db(&state, move |state| load_visible_order(state, &session, &order_id)).await?;
    Ok(Json(order))
}

/// Record the payment transaction of a pending buy order. Only the owner may do this.
pub async fn attach_tx(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(order_id): Path<String>,
    Json(req): Json<AttachTxRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if session.is_admin() {
        return Err(ApiError::Forbidden);
    }

    let order = run_db(&state, move |state| {
        let mut order = load_visible_order(state, &session, &order_id)?;
        attach_tx_hash(&mut order, &req.tx_hash, Utc::now())?;
        if !state.db.set_order_tx_hash(&order)? {
            return Err(ApiError::Conflict(format!("Order {} is no longer pending", order.id)));
        }
        Ok(order)
    })
    .await?;

    info!("Order {} payment tx recorded", order.id);
    Ok(Json(order))
}

/// Wallet hand-off for paying a buy order to the desk.
pub async fn payment_instructions(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(order_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (order, wallets) = run_db(&state, move |state| {
        let order = load_visible_order(state, &session, &order_id)?;
        let wallets = state.db.get_wallets()?;
        Ok((order, wallets))
    })
    .await?;

    if order.trade_mode != TradeMode::Buy {
        return Err(ApiError::Validation("Payment instructions only apply to buy orders".into()));
    }
    if order.status.is_terminal() {
        return Err(ApiError::Conflict(format!("Order {} is already {}", order.id, order.status)));
    }

    let instructions = payment::payment_request(order.currency, wallets.address(order.currency), order.crypto_amount)?;
    Ok(Json(instructions))
}
