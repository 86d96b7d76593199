mod config;

use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use nub_api::auth::decode_token;
use nub_api::error::ApiError;
use nub_api::state::{AppState, AppStateInner};
use nub_api::{cleanup, price_feed};
use nub_gateway::connection;
use nub_gateway::dispatcher::Dispatcher;

use crate::config::{DEFAULT_LOG_FILTER, ServerConfig};

/// How often expired sign-ups are pruned.
const CLEANUP_INTERVAL_SECS: u64 = 600;

#[derive(Debug, Deserialize)]
struct GatewayQuery {
    #[serde(default)]
    token: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    if config.admin.is_none() {
        warn!("NUB_ADMIN_EMAIL or NUB_ADMIN_PASSWORD_HASH unset, admin login is disabled");
    }

    let db = nub_db::Database::open(&config.db_path)?;
    let dispatcher = Dispatcher::new();
    let state: AppState = Arc::new(
        AppStateInner::new(db, config.jwt_secret.clone(), dispatcher).with_admin(config.admin.clone()),
    );

    tokio::spawn(price_feed::run_price_feed_loop(
        state.prices.clone(),
        config.price_feed_url.clone(),
        config.price_poll_secs,
    ));
    tokio::spawn(cleanup::run_cleanup_loop(state.clone(), CLEANUP_INTERVAL_SECS));

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state.clone());

    let app = nub_api::router(state)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = config.addr()?;
    info!("Nub.market server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Browsers cannot set headers on a WebSocket upgrade, so the token rides in the query string.
async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let session = decode_token(&state.jwt_secret, &query.token)?;
    let dispatcher = state.dispatcher.clone();
    Ok(ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher, session)))
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Could not install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
