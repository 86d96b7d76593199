use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};

use nub_types::api::Session;
use nub_types::events::GatewayEvent;

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Serialize `event` for a client holding `session`, or `None` if the client may not see it.
pub fn encode_for(session: &Session, event: &GatewayEvent) -> Option<String> {
    if !event.visible_to(session) {
        return None;
    }
    match serde_json::to_string(event) {
        Ok(json) => Some(json),
        Err(e) => {
            error!("Failed to serialize gateway event: {}", e);
            None
        }
    }
}

/// Handle a pre-authenticated WebSocket connection.
/// The JWT was already validated at the HTTP upgrade layer, so we go straight to Ready + event loop.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, session: Session) {
    let (mut sender, mut receiver) = socket.split();
    let owner = session.owner_id().to_string();

    let open = dispatcher.connection_opened();
    info!("{} connected to gateway ({} open)", owner, open);

    // Subscribe before Ready so nothing published in between is missed
    let mut broadcast_rx = dispatcher.subscribe();

    let ready = GatewayEvent::Ready {
        session: session.clone(),
    };
    let sent = match encode_for(&session, &ready) {
        Some(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        None => false,
    };
    if !sent {
        dispatcher.connection_closed();
        return;
    }

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward visible events -> client, with heartbeat
    let send_session = session.clone();
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} events", n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    let Some(json) = encode_for(&send_session, &event) else {
                        continue;
                    };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // The stream is server-push only; clients just answer pings.
    let recv_owner = owner.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Pong(_) => pong_flag_recv.store(true, Ordering::Release),
                Message::Close(_) => break,
                Message::Text(text) => {
                    let preview: String = text.as_str().chars().take(200).collect();
                    debug!("{} sent unexpected text frame: {}", recv_owner, preview);
                }
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    let open = dispatcher.connection_closed();
    info!("{} disconnected from gateway ({} open)", owner, open);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use nub_types::models::{ChatMessage, ChatRole, GLOBAL_THREAD, SYSTEM_THREAD};
    use uuid::Uuid;

    fn message_in(thread: &str) -> GatewayEvent {
        GatewayEvent::MessageCreate(ChatMessage {
            id: Uuid::new_v4(),
            role: ChatRole::Admin,
            text: "hello".into(),
            timestamp: Utc::now(),
            user_id: thread.into(),
            user_name: "Admin".into(),
            is_error: false,
        })
    }

    #[test]
    fn guests_only_get_their_thread_and_broadcasts() {
        let guest = Session::Guest {
            session_id: "sess_aaa".into(),
        };
        assert!(encode_for(&guest, &message_in("sess_aaa")).is_some());
        assert!(encode_for(&guest, &message_in(GLOBAL_THREAD)).is_some());
        assert!(encode_for(&guest, &message_in("sess_bbb")).is_none());
        assert!(encode_for(&guest, &message_in(SYSTEM_THREAD)).is_none());
    }

    #[test]
    fn admins_get_everything() {
        let admin = Session::Admin {
            email: "ops@example.com".into(),
        };
        let json = encode_for(&admin, &message_in(SYSTEM_THREAD)).unwrap();
        assert!(json.contains("\"type\":\"MessageCreate\""));
    }

    #[test]
    fn ready_is_always_delivered() {
        let guest = Session::Guest {
            session_id: "sess_aaa".into(),
        };
        let ready = GatewayEvent::Ready {
            session: guest.clone(),
        };
        assert!(encode_for(&guest, &ready).is_some());
    }
}
