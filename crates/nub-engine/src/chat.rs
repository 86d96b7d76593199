//! Support chat threads and the messages the desk posts on its own.
use chrono::{DateTime, Utc};
use uuid::Uuid;

use nub_types::models::{ChatMessage, ChatRole, GLOBAL_THREAD, Order, SYSTEM_THREAD};

use crate::order::random_base36;

pub const BOT_NAME: &str = "LockBot";
pub const ADMIN_NAME: &str = "Admin";
pub const HISTORY_LEN: usize = 5;
pub const GUEST_PREFIX: &str = "sess_";
pub const APOLOGY: &str = "I'm sorry, I encountered an error processing your request.";

/// Fresh guest session id such as `sess_k3z9q0a7m`.
pub fn new_guest_session_id() -> String {
    format!("{GUEST_PREFIX}{}", random_base36(9).to_ascii_lowercase())
}

/// The last `limit` messages of a thread as `role: text` lines, oldest first.
pub fn recent_history(messages: &[ChatMessage], user_id: &str, limit: usize) -> Vec<String> {
    let thread: Vec<&ChatMessage> = messages.iter().filter(|m| m.user_id == user_id).collect();
    let skip = thread.len().saturating_sub(limit);
    thread[skip..]
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.text))
        .collect()
}

/// `UserN` label for a guest. `guest_threads` lists guest session ids in order of first appearance.
pub fn guest_display_name(guest_threads: &[String], session_id: &str) -> String {
    let n = match guest_threads.iter().position(|id| id == session_id) {
        Some(i) => i + 1,
        None => guest_threads.len() + 1,
    };
    format!("User{n}")
}

fn message(role: ChatRole, text: String, thread: &str, user_name: &str, now: DateTime<Utc>) -> ChatMessage {
    ChatMessage {
        id: Uuid::new_v4(),
        role,
        text,
        timestamp: now,
        user_id: thread.to_string(),
        user_name: user_name.to_string(),
        is_error: false,
    }
}

pub fn user_message(thread: &str, user_name: &str, text: &str, now: DateTime<Utc>) -> ChatMessage {
    message(ChatRole::User, text.to_string(), thread, user_name, now)
}

pub fn bot_message(thread: &str, text: String, now: DateTime<Utc>) -> ChatMessage {
    message(ChatRole::Model, text, thread, BOT_NAME, now)
}

/// Stored in place of a reply when the responder fails.
pub fn apology_message(thread: &str, now: DateTime<Utc>) -> ChatMessage {
    ChatMessage {
        is_error: true,
        ..bot_message(thread, APOLOGY.to_string(), now)
    }
}

/// Admin post. Without a target it goes to the global thread.
pub fn admin_message(text: &str, target: Option<&str>, now: DateTime<Utc>) -> ChatMessage {
    let thread = target.map(str::trim).filter(|t| !t.is_empty()).unwrap_or(GLOBAL_THREAD);
    message(ChatRole::Admin, text.to_string(), thread, ADMIN_NAME, now)
}

pub fn completion_notice(order: &Order, now: DateTime<Utc>) -> ChatMessage {
    let text = format!(
        "✅ Order #{} completed! Our team has finalized your trade. Thank you for choosing Nub.market. We hope to see you again soon!",
        order.id
    );
    bot_message(&order.owner_id, text, now)
}

pub fn guest_order_alert(order: &Order, now: DateTime<Utc>) -> ChatMessage {
    let text = format!(
        "🚨 SYSTEM ALERT: New Guest Order #{} ({} DLs - ${:.2}). Check Orders tab.",
        order.id, order.amount, order.total_usd
    );
    message(ChatRole::Admin, text, SYSTEM_THREAD, ADMIN_NAME, now)
}
