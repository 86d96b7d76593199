use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};

use nub_api::price_feed::{DEFAULT_POLL_SECS, DEFAULT_PRICE_FEED_URL};
use nub_api::state::AdminCredential;

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str =
    "nubmarket=debug,nub_api=debug,nub_db=debug,nub_engine=debug,nub_gateway=debug,tower_http=debug";

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

/// Startup configuration, read once from `NUB_*` environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    /// `None` unless both the admin email and password hash are set.
    pub admin: Option<AdminCredential>,
    pub price_feed_url: String,
    pub price_poll_secs: u64,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = var("NUB_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("NUB_JWT_SECRET is unset or still a placeholder");
        }

        let port = match var("NUB_PORT") {
            Some(raw) => raw.parse().with_context(|| format!("NUB_PORT '{raw}' is not a port"))?,
            None => 3000,
        };
        let price_poll_secs = match var("NUB_PRICE_POLL_SECS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("NUB_PRICE_POLL_SECS '{raw}' is not a number of seconds"))?,
            None => DEFAULT_POLL_SECS,
        };

        let admin = match (var("NUB_ADMIN_EMAIL"), var("NUB_ADMIN_PASSWORD_HASH")) {
            (Some(email), Some(password_hash)) => Some(AdminCredential {
                email: email.to_lowercase(),
                password_hash,
            }),
            _ => None,
        };

        Ok(Self {
            host: var("NUB_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: var("NUB_DB_PATH").unwrap_or_else(|| "nubmarket.db".into()).into(),
            jwt_secret,
            admin,
            price_feed_url: var("NUB_PRICE_FEED_URL").unwrap_or_else(|| DEFAULT_PRICE_FEED_URL.into()),
            price_poll_secs,
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }
}
