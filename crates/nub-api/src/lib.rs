//! REST surface of the Nub.market desk.
pub mod admin;
pub mod auth;
pub mod chat;
pub mod cleanup;
pub mod error;
pub mod mailer;
pub mod market;
pub mod middleware;
pub mod orders;
pub mod price_feed;
pub mod state;

use axum::{
    Json, Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post, put},
};

use crate::state::AppState;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// All REST routes. Callers add the gateway route and the outer layers.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/verify", post(auth::verify))
        .route("/auth/login", post(auth::login))
        .route("/auth/guest", post(auth::guest))
        .route("/market/rates", get(market::get_rates))
        .route("/market/prices", get(market::get_prices))
        .route("/market/quote", post(market::quote))
        .route("/market/txid", post(market::check_txid))
        .route("/market/split", get(market::split))
        .route("/tools/locks", get(market::convert_locks))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/orders", post(orders::submit_order).get(orders::list_orders))
        .route("/orders/{order_id}", get(orders::get_order))
        .route("/orders/{order_id}/payment", get(orders::payment_instructions))
        .route("/orders/{order_id}/tx", put(orders::attach_tx))
        .route("/chat/messages", get(chat::get_messages).post(chat::send_message))
        .layer(from_fn_with_state(state.clone(), middleware::require_auth))
        .with_state(state.clone());

    let admin_routes = Router::new()
        .route("/admin/rates", get(admin::get_rates).put(admin::put_rates))
        .route("/admin/wallets", get(admin::get_wallets).put(admin::put_wallets))
        .route("/admin/settings", get(admin::get_settings).put(admin::put_settings))
        .route("/admin/orders/{order_id}/status", patch(admin::update_order_status))
        .route("/admin/chat", post(admin::send_admin_message))
        .route("/admin/users", get(admin::list_users))
        .layer(from_fn(middleware::require_admin))
        .layer(from_fn_with_state(state.clone(), middleware::require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
}
