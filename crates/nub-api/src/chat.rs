use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::warn;

use nub_engine::chat::{self, HISTORY_LEN};
use nub_types::api::{ChatPostResponse, SendChatRequest, Session};
use nub_types::events::GatewayEvent;

use crate::error::ApiError;
use crate::state::{AppState, run_db};

pub const MAX_MESSAGE_LEN: usize = 2000;

/// Messages the session may read, oldest first. Admins get every thread.
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = run_db(&state, move |state| {
        let messages = if session.is_admin() {
            state.db.list_messages()?
        } else {
            state.db.list_thread_messages(session.owner_id())?
        };
        Ok(messages)
    })
    .await?;
    Ok(Json(messages))
}

/// Post to the caller's own thread. LockBot answers unless live support is on.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<SendChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if session.is_admin() {
        return Err(ApiError::Validation("Admins post through /admin/chat".into()));
    }
    let text = req.text.trim().to_string();
    if text.is_empty() {
        return Err(ApiError::Validation("Message cannot be empty".into()));
    }
    if text.chars().count() > MAX_MESSAGE_LEN {
        return Err(ApiError::Validation(format!("Message is longer than {MAX_MESSAGE_LEN} characters")));
    }

    let response = run_db(&state, move |state| {
        let thread = session.owner_id().to_string();

        let user_name = match &session {
            Session::Customer { username, .. } => username.clone(),
            _ => chat::guest_display_name(&state.db.list_guest_threads()?, &thread),
        };
        let history = chat::recent_history(&state.db.list_thread_messages(&thread)?, &thread, HISTORY_LEN);

        let message = chat::user_message(&thread, &user_name, &text, Utc::now());
        state.db.insert_message(&message)?;

        if state.db.get_settings()?.live_support {
            return Ok(ChatPostResponse { message, reply: None });
        }

        let rates = state.db.get_rates()?;
        let reply = match state.responder.respond(&text, &history, &rates) {
            Ok(answer) => chat::bot_message(&thread, answer, Utc::now()),
            Err(e) => {
                warn!("Support responder failed for {}: {}", thread, e);
                chat::apology_message(&thread, Utc::now())
            }
        };
        state.db.insert_message(&reply)?;

        Ok(ChatPostResponse {
            message,
            reply: Some(reply),
        })
    })
    .await?;

    state
        .dispatcher
        .broadcast(GatewayEvent::MessageCreate(response.message.clone()));
    if let Some(reply) = &response.reply {
        state.dispatcher.broadcast(GatewayEvent::MessageCreate(reply.clone()));
    }

    Ok((StatusCode::CREATED, Json(response)))
}
