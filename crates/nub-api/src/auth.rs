use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use tracing::{info, warn};
use uuid::Uuid;

use nub_db::models::{PendingRegistrationRow, UserRow};
use nub_engine::chat::new_guest_session_id;
use nub_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest, RegisterResponse, Session, VerifyRequest};

use crate::error::ApiError;
use crate::state::{AppState, run_db};

pub const TOKEN_LIFETIME_DAYS: i64 = 30;
pub const CODE_LIFETIME_MINUTES: i64 = 15;

const INVALID_LOGIN: &str = "Invalid email or password";

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(e) => {
            warn!("Stored password hash is malformed: {}", e);
            false
        }
    }
}

pub fn create_token(secret: &str, session: &Session) -> anyhow::Result<String> {
    let claims = Claims {
        sub: session.owner_id().to_string(),
        session: session.clone(),
        exp: (Utc::now() + Duration::days(TOKEN_LIFETIME_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn decode_token(secret: &str, token: &str) -> Result<Session, ApiError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized("Invalid or expired token".into()))?;
    Ok(token_data.claims.session)
}

fn issue(secret: &str, session: Session) -> Result<AuthResponse, ApiError> {
    let token = create_token(secret, &session)?;
    Ok(AuthResponse { token, session })
}

fn normalize_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !email.contains(char::is_whitespace),
        None => false,
    };
    if !valid {
        return Err(ApiError::Validation("A valid email address is required".into()));
    }
    Ok(email)
}

fn generate_code() -> String {
    format!("{:06}", rand::rng().random_range(0..1_000_000u32))
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.trim().to_string();
    if username.len() < 3 || username.len() > 32 {
        return Err(ApiError::Validation("Username must be 3 to 32 characters".into()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::Validation("Password must be at least 8 characters".into()));
    }
    let email = normalize_email(&req.email)?;

    let expires_at = Utc::now() + Duration::minutes(CODE_LIFETIME_MINUTES);
    let response = run_db(&state, move |state| {
        if state.db.get_user_by_email(&email)?.is_some() {
            return Err(ApiError::Conflict("An account with this email already exists".into()));
        }

        let code = generate_code();
        state.db.upsert_pending_registration(&PendingRegistrationRow {
            email: email.clone(),
            username,
            password_hash: hash_password(&req.password)?,
            code: code.clone(),
            expires_at,
        })?;

        state.mailer.send_verification_code(&email, &code).map_err(|e| {
            warn!("Failed to send verification code to {}: {:#}", email, e);
            ApiError::Internal(anyhow::anyhow!("Could not send verification email"))
        })?;

        Ok(RegisterResponse { email, expires_at })
    })
    .await?;

    Ok((StatusCode::ACCEPTED, Json(response)))
}

pub async fn verify(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email)?;
    let code = req.code.trim().to_string();

    let session = run_db(&state, move |state| {
        let pending = state
            .db
            .get_pending_registration(&email)?
            .ok_or_else(|| ApiError::Validation("No pending registration for this email".into()))?;

        if pending.expires_at < Utc::now() {
            state.db.delete_pending_registration(&email)?;
            return Err(ApiError::Validation("Verification code has expired".into()));
        }
        if pending.code != code {
            return Err(ApiError::Validation("Invalid verification code".into()));
        }
        if state.db.get_user_by_email(&email)?.is_some() {
            state.db.delete_pending_registration(&email)?;
            return Err(ApiError::Conflict("An account with this email already exists".into()));
        }

        let user_id = Uuid::new_v4();
        state.db.complete_registration(&UserRow {
            id: user_id.to_string(),
            username: pending.username.clone(),
            email: pending.email.clone(),
            password_hash: pending.password_hash,
            created_at: Utc::now(),
        })?;
        info!("Registered {} ({})", pending.username, pending.email);

        Ok(Session::Customer {
            user_id,
            email: pending.email,
            username: pending.username,
        })
    })
    .await?;

    Ok((StatusCode::CREATED, Json(issue(&state.jwt_secret, session)?)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();

    let session = run_db(&state, move |state| {
        if let Some(admin) = &state.admin {
            if admin.email.eq_ignore_ascii_case(&email) {
                if !verify_password(&req.password, &admin.password_hash) {
                    return Err(ApiError::Unauthorized(INVALID_LOGIN.into()));
                }
                info!("Admin {} logged in", admin.email);
                return Ok(Session::Admin {
                    email: admin.email.clone(),
                });
            }
        }

        let user = state
            .db
            .get_user_by_email(&email)?
            .ok_or_else(|| ApiError::Unauthorized(INVALID_LOGIN.into()))?;

        if !verify_password(&req.password, &user.password_hash) {
            return Err(ApiError::Unauthorized(INVALID_LOGIN.into()));
        }

        let user_id: Uuid = user
            .id
            .parse()
            .map_err(|e| anyhow::anyhow!("Corrupt user id '{}': {}", user.id, e))?;

        Ok(Session::Customer {
            user_id,
            email: user.email,
            username: user.username,
        })
    })
    .await?;

    Ok(Json(issue(&state.jwt_secret, session)?))
}

/// Start an anonymous session. Guests can trade and chat; their orders raise a system alert.
pub async fn guest(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let session = Session::Guest {
        session_id: new_guest_session_id(),
    };
    Ok((StatusCode::CREATED, Json(issue(&state.jwt_secret, session)?)))
}
