//! Public market data and the calculator tools.
use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};

use nub_engine::{RateEngine, allocate, locks, txid};
use nub_types::api::{
    LockQuery, QuoteRequest, SplitQuery, SplitResponse, TxidCheckRequest, TxidCheckResponse, TxidStatus,
};

use crate::error::ApiError;
use crate::state::{AppState, run_db};

pub async fn get_rates(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rates = run_db(&state, |state| Ok(state.db.get_rates()?)).await?;
    Ok(Json(rates))
}

pub async fn get_prices(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.price_snapshot()?))
}

pub async fn quote(
    State(state): State<AppState>,
    Json(req): Json<QuoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let rates = run_db(&state, |state| Ok(state.db.get_rates()?)).await?;
    let book = state.price_book()?;
    let price = req.currency.and_then(|c| book.price(c));

    let quote = RateEngine::new(rates).quote(req.mode, req.currency, price, req.field, &req.value);
    Ok(Json(quote))
}

/// Shape check for a pasted transaction hash. The response links to a block explorer once the hash
/// looks valid.
pub async fn check_txid(Json(req): Json<TxidCheckRequest>) -> Result<impl IntoResponse, ApiError> {
    let status = txid::classify(req.currency, &req.tx_hash);
    let explorer_url = match status {
        TxidStatus::Valid => txid::explorer_url(req.currency, &req.tx_hash),
        _ => None,
    };
    Ok(Json(TxidCheckResponse { status, explorer_url }))
}

pub async fn split(Query(query): Query<SplitQuery>) -> Result<impl IntoResponse, ApiError> {
    let allocations = allocate(query.total, query.worlds)?;
    Ok(Json(SplitResponse { allocations }))
}

pub async fn convert_locks(Query(query): Query<LockQuery>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(locks::convert_world_locks(&query.world_locks)))
}
