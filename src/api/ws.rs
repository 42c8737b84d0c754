// =============================================================================
// WebSocket Handler — Push-based price updates
// =============================================================================
//
// Clients connect to `/ws?token=<token>` and receive:
//   1. An immediate snapshot of the latest live price per symbol on connect.
//   2. Incremental price frames every 2 s whenever the state_version has
//      changed since the last push.
//
// The handler also responds to Ping frames (and the text message "ping")
// with Pongs, and cleans up on disconnect.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use serde::Deserialize;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use futures_util::{SinkExt, StreamExt};

use crate::api::auth::validate_token;
use crate::app_state::AppState;

/// Interval between push checks.
const PUSH_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

// =============================================================================
// Upgrade handler
// =============================================================================

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    // Token check happens before the upgrade so a bad token gets a clean
    // HTTP 403 instead of a doomed socket.
    let token_ok = query
        .token
        .as_deref()
        .map(validate_token)
        .unwrap_or(false);

    if !token_ok {
        warn!("WebSocket connection rejected: invalid or missing token");
        return axum::http::StatusCode::FORBIDDEN.into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

// =============================================================================
// Connection loop
// =============================================================================

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    info!("WebSocket client connected");

    let (mut sender, mut receiver) = socket.split();

    // 1. Immediate snapshot on connect.
    let snapshot = serde_json::json!({
        "type": "snapshot",
        "server_time": chrono::Utc::now().timestamp_millis(),
        "prices": state.build_price_map(),
    });
    if send_json(&mut sender, &snapshot).await.is_err() {
        warn!("WebSocket: failed to send initial snapshot, closing");
        return;
    }

    let mut last_pushed_version = state.current_state_version();
    let mut push_timer = interval(PUSH_INTERVAL);

    loop {
        tokio::select! {
            _ = push_timer.tick() => {
                let current_version = state.current_state_version();
                if current_version != last_pushed_version {
                    let frame = serde_json::json!({
                        "type": "prices",
                        "server_time": chrono::Utc::now().timestamp_millis(),
                        "prices": state.build_price_map(),
                    });
                    if send_json(&mut sender, &frame).await.is_err() {
                        debug!("WebSocket: push failed, client likely disconnected");
                        break;
                    }
                    last_pushed_version = current_version;
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if text.trim().eq_ignore_ascii_case("ping") {
                            if sender.send(Message::Text("pong".into())).await.is_err() {
                                break;
                            }
                        }
                        // Other client text is ignored; this is a push-only feed.
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if sender.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) => {
                        debug!("WebSocket: client sent close frame");
                        break;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        debug!("WebSocket: ignoring unexpected binary frame");
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket receive error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    info!("WebSocket client disconnected");
}

// =============================================================================
// Send helpers
// =============================================================================

async fn send_json<S>(sender: &mut S, value: &serde_json::Value) -> Result<(), axum::Error>
where
    S: futures_util::Sink<Message, Error = axum::Error> + Unpin,
{
    let payload = value.to_string();
    sender.send(Message::Text(payload)).await
}
