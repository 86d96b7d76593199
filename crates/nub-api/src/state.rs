use std::sync::{Arc, RwLock};

use tracing::error;

use nub_db::Database;
use nub_engine::PriceBook;
use nub_engine::support::{SupportResponder, TemplateResponder};
use nub_gateway::dispatcher::Dispatcher;
use nub_types::models::PriceSnapshot;

use crate::error::ApiError;
use crate::mailer::{LogMailer, Mailer};

pub type AppState = Arc<AppStateInner>;

/// Externally configured admin login. `password_hash` is an argon2 PHC string.
#[derive(Debug, Clone)]
pub struct AdminCredential {
    pub email: String,
    pub password_hash: String,
}

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub dispatcher: Dispatcher,
    pub prices: Arc<RwLock<PriceBook>>,
    pub responder: Box<dyn SupportResponder>,
    pub mailer: Box<dyn Mailer>,
    /// `None` disables admin login.
    pub admin: Option<AdminCredential>,
}

impl AppStateInner {
    pub fn new(db: Database, jwt_secret: String, dispatcher: Dispatcher) -> Self {
        Self {
            db,
            jwt_secret,
            dispatcher,
            prices: Arc::new(RwLock::new(PriceBook::default())),
            responder: Box::new(TemplateResponder),
            mailer: Box::new(LogMailer),
            admin: None,
        }
    }

    pub fn with_admin(mut self, admin: Option<AdminCredential>) -> Self {
        self.admin = admin;
        self
    }

    pub fn with_mailer(mut self, mailer: impl Mailer + 'static) -> Self {
        self.mailer = Box::new(mailer);
        self
    }

    pub fn with_responder(mut self, responder: impl SupportResponder + 'static) -> Self {
        self.responder = Box::new(responder);
        self
    }

    pub fn price_snapshot(&self) -> Result<PriceSnapshot, ApiError> {
        let book = self
            .prices
            .read()
            .map_err(|e| anyhow::anyhow!("Price book lock poisoned: {}", e))?;
        Ok(book.snapshot())
    }

    pub fn price_book(&self) -> Result<PriceBook, ApiError> {
        let book = self
            .prices
            .read()
            .map_err(|e| anyhow::anyhow!("Price book lock poisoned: {}", e))?;
        Ok(book.clone())
    }
}

/// Run a blocking database call off the async runtime.
pub async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppStateInner) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("blocking task failed"))
        })?
}
