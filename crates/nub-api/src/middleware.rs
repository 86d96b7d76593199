use axum::{
    Extension,
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use nub_types::api::Session;

use crate::auth::decode_token;
use crate::error::ApiError;
use crate::state::AppState;

/// Extract and validate the JWT from the Authorization header, then attach its [`Session`].
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(ApiError::unauthorized)?;

    let session = decode_token(&state.jwt_secret, token)?;

    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

/// Must run after [`require_auth`].
pub async fn require_admin(
    Extension(session): Extension<Session>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !session.is_admin() {
        return Err(ApiError::Forbidden);
    }
    Ok(next.run(req).await)
}
