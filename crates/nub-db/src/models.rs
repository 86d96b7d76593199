//! Database row types for account data. Password hashes never leave the API layer, so these stay
//! separate from the nub-types models. Orders, settings and chat messages map straight onto
//! nub-types.
use chrono::{DateTime, Utc};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A sign-up waiting for its email code.
pub struct PendingRegistrationRow {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}
