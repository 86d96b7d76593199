use serde::{Deserialize, Serialize};

use crate::api::Session;
use crate::models::{ChatMessage, GLOBAL_THREAD, OrderStatus};

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms the connection and echoes the session it resolved.
    Ready { session: Session },

    /// A chat message was appended
    MessageCreate(ChatMessage),

    /// An order moved to a new status
    OrderStatusChanged {
        order_id: String,
        owner_id: String,
        status: OrderStatus,
    },
}

impl GatewayEvent {
    /// Returns the thread/owner this event belongs to, or `None` for connection-level events.
    pub fn thread(&self) -> Option<&str> {
        match self {
            Self::Ready { .. } => None,
            Self::MessageCreate(message) => Some(&message.user_id),
            Self::OrderStatusChanged { owner_id, .. } => Some(owner_id),
        }
    }

    /// Whether a connection holding `session` should receive this event. System alerts are
    /// admin-only.
    pub fn visible_to(&self, session: &Session) -> bool {
        if session.is_admin() {
            return true;
        }
        match self.thread() {
            None => true,
            Some(thread) => thread == session.owner_id() || thread == GLOBAL_THREAD,
        }
    }
}
