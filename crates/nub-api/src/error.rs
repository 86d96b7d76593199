use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use nub_engine::payment::PaymentError;
use nub_engine::{OrderError, SplitError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("Admin access required")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Configuration(String),
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn unauthorized() -> Self {
        Self::Unauthorized("Authentication required".into())
    }
}

impl From<OrderError> for ApiError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::UnchangedStatus(_)
            | OrderError::InvalidTransition { .. }
            | OrderError::TxHashLocked(_) => Self::Conflict(e.to_string()),
            _ => Self::Validation(e.to_string()),
        }
    }
}

impl From<SplitError> for ApiError {
    fn from(e: SplitError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<PaymentError> for ApiError {
    fn from(e: PaymentError) -> Self {
        Self::Configuration(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(e) = &self {
            error!("Internal error: {:#}", e);
        }
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.status_code(), body).into_response()
    }
}
