//! Desk administration. Every handler here sits behind `require_admin`.
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{info, warn};

use nub_engine::order::apply_status;
use nub_engine::{chat, txid};
use nub_types::api::{AdminChatRequest, UpdateSettingsRequest, UpdateStatusRequest};
use nub_types::events::GatewayEvent;
use nub_types::models::{CryptoCurrency, OrderStatus, RateInfo, User, WalletConfig};

use crate::error::ApiError;
use crate::state::{AppState, run_db};

pub async fn get_rates(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rates = run_db(&state, |state| Ok(state.db.get_rates()?)).await?;
    Ok(Json(rates))
}

pub async fn put_rates(
    State(state): State<AppState>,
    Json(rates): Json<RateInfo>,
) -> Result<impl IntoResponse, ApiError> {
    for (name, rate) in [("Buy", rates.buy_rate), ("Sell", rates.sell_rate)] {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ApiError::Validation(format!("{name} rate must be a positive number")));
        }
    }
    run_db(&state, move |state| Ok(state.db.set_rates(&rates)?)).await?;
    info!("Rates updated: buy {:.2}, sell {:.2}", rates.buy_rate, rates.sell_rate);
    Ok(Json(rates))
}

pub async fn get_wallets(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let wallets = run_db(&state, |state| Ok(state.db.get_wallets()?)).await?;
    Ok(Json(wallets))
}

/// Replace the desk's receiving addresses. An empty address disables payment hand-off for that
/// currency.
pub async fn put_wallets(
    State(state): State<AppState>,
    Json(mut wallets): Json<WalletConfig>,
) -> Result<impl IntoResponse, ApiError> {
    for currency in CryptoCurrency::ALL {
        let address = wallets.address(currency).trim().to_string();
        if !address.is_empty() && !txid::validate_payout_address(currency, &address) {
            return Err(ApiError::Validation(format!("Invalid {currency} address")));
        }
        wallets.set_address(currency, address);
    }
    let saved = wallets.clone();
    run_db(&state, move |state| Ok(state.db.set_wallets(&saved)?)).await?;
    info!("Wallet addresses updated");
    Ok(Json(wallets))
}

pub async fn get_settings(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let settings = run_db(&state, |state| Ok(state.db.get_settings()?)).await?;
    Ok(Json(settings))
}

pub async fn put_settings(
    State(state): State<AppState>,
    Json(req): Json<UpdateSettingsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = run_db(&state, move |state| {
        let mut settings = state.db.get_settings()?;
        if let Some(world) = req.drop_world_name {
            let world = world.trim().to_uppercase();
            if world.is_empty() {
                return Err(ApiError::Validation("Drop world name cannot be empty".into()));
            }
            settings.drop_world_name = world;
        }
        if let Some(live) = req.live_support {
            settings.live_support = live;
        }
        state.db.set_settings(&settings)?;
        Ok(settings)
    })
    .await?;
    info!(
        "Settings updated: drop world {}, live support {}",
        settings.drop_world_name, settings.live_support
    );
    Ok(Json(settings))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (order, notice) = run_db(&state, move |state| {
        let mut order = state
            .db
            .get_order(&order_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Order {order_id}")))?;

        let previous = order.status;
        let now = Utc::now();
        apply_status(&mut order, req.status, now)?;
        if !state.db.update_order_status(&order, previous)? {
            return Err(ApiError::Conflict(format!("Order {} was updated concurrently", order.id)));
        }

        let notice = if order.status == OrderStatus::Completed {
            let notice = chat::completion_notice(&order, now);
            state.db.insert_message(&notice)?;
            Some(notice)
        } else {
            None
        };
        Ok((order, notice))
    })
    .await?;

    info!("Order {} is now {}", order.id, order.status);
    state.dispatcher.broadcast(GatewayEvent::OrderStatusChanged {
        order_id: order.id.clone(),
        owner_id: order.owner_id.clone(),
        status: order.status,
    });
    if let Some(notice) = notice {
        state.dispatcher.broadcast(GatewayEvent::MessageCreate(notice));
    }

    Ok(Json(order))
}

/// Post as Admin to one customer's thread, or to everyone when no target is given.
pub async fn send_admin_message(
    State(state): State<AppState>,
    Json(req): Json<AdminChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let text = req.text.trim().to_string();
    if text.is_empty() {
        return Err(ApiError::Validation("Message cannot be empty".into()));
    }
    let message = chat::admin_message(&text, req.target_user_id.as_deref(), Utc::now());

    let stored = message.clone();
    run_db(&state, move |state| Ok(state.db.insert_message(&stored)?)).await?;
    state.dispatcher.broadcast(GatewayEvent::MessageCreate(message.clone()));

    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state, |state| Ok(state.db.list_users()?)).await?;

    let users: Vec<User> = rows
        .into_iter()
        .filter_map(|row| match row.id.parse() {
            Ok(id) => Some(User {
                id,
                username: row.username,
                email: row.email,
                created_at: row.created_at,
            }),
            Err(e) => {
                warn!("Skipping user with corrupt id '{}': {}", row.id, e);
                None
            }
        })
        .collect();
    Ok(Json(users))
}
