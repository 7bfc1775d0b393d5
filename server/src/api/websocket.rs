//! WebSocket endpoint for realtime updates
//!
//! Browsers cannot set headers on the upgrade request, so the bearer token is
//! passed as `?token=`. Each connection subscribes to the broadcast channel and
//! relays only the events addressed to its user, as `<event>:<json>` text frames.

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};

use super::helpers::RealtimeEvent;
use super::{authenticate, ApiQuery, AppState, AuthUser};
use crate::error::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// WebSocket upgrade handler; the token is checked before the upgrade request itself
pub async fn websocket_handler(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<WsQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> AppResult<Response> {
    let token = query
        .token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::unauthorized("Missing token"))?;
    let user = authenticate(&state, &token).await?;
    let ws = ws.map_err(|rejection| AppError::Validation(rejection.body_text()))?;

    tracing::info!(user_id = %user.id, role = %user.role, "WebSocket client connected");
    Ok(ws.on_upgrade(move |socket| handle_websocket(socket, state, user)))
}

/// Next event addressed to `user_id`, as a text frame; `None` once the channel closes
async fn next_frame(rx: &mut broadcast::Receiver<RealtimeEvent>, user_id: &str) -> Option<String> {
    loop {
        match rx.recv().await {
            Ok(event) if event.recipient_id == user_id => return Some(event.frame()),
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(user_id, skipped, "WebSocket client lagging, events dropped");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

async fn handle_websocket(mut socket: WebSocket, state: AppState, user: AuthUser) {
    let mut rx = state.tx.subscribe();

    loop {
        tokio::select! {
            frame = next_frame(&mut rx, &user.id) => match frame {
                Some(frame) => {
                    if socket.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                // Pings are answered by axum; other client frames are ignored
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::info!(user_id = %user.id, "WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn event(recipient_id: &str, message: &str) -> RealtimeEvent {
        RealtimeEvent {
            recipient_id: recipient_id.to_string(),
            event: "notification",
            payload: json!({ "message": message }),
        }
    }

    #[tokio::test]
    async fn test_only_own_events_are_relayed() {
        let (tx, mut rx) = broadcast::channel(8);
        tx.send(event("someone-else", "not yours")).unwrap();
        tx.send(event("user-1", "hello")).unwrap();
        tx.send(event("someone-else", "still not yours")).unwrap();
        drop(tx);

        let frame = next_frame(&mut rx, "user-1").await;
        assert_eq!(frame.as_deref(), Some(r#"notification:{"message":"hello"}"#));
        assert_eq!(next_frame(&mut rx, "user-1").await, None);
    }

    #[tokio::test]
    async fn test_lagging_receiver_keeps_going() {
        let (tx, mut rx) = broadcast::channel(2);
        for i in 0..4 {
            tx.send(event("user-1", &format!("m{}", i))).unwrap();
        }

        // The two oldest events were overwritten
        let frame = next_frame(&mut rx, "user-1").await;
        assert_eq!(frame.as_deref(), Some(r#"notification:{"message":"m2"}"#));
    }
}
