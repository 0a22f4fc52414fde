//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use glam::Vec3;
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::http::auth::{verify_jwt, AuthError};
use crate::presence::{PresenceHub, RelayEvent};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{
    decode_client_msg, ClientMsg, PlayerState, ServerMsg, DEFAULT_USERNAME,
};

/// Direct (non-broadcast) messages queued per connection
const DIRECT_CAPACITY: usize = 32;

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// JWT token, required when the relay has a secret configured
    pub token: Option<String>,
    /// Requested player id for unauthenticated relays
    pub player_id: Option<String>,
}

/// Resolve the connecting player's id
fn resolve_player_id(query: &WsQuery, secret: Option<&str>) -> Result<String, AuthError> {
    match secret {
        Some(secret) => {
            let token = query.token.as_deref().ok_or(AuthError::MissingToken)?;
            Ok(verify_jwt(token, secret)?.sub)
        }
        None => Ok(query
            .player_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string())),
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    match resolve_player_id(&query, state.config.supabase_jwt_secret.as_deref()) {
        Ok(player_id) => {
            info!(player_id = %player_id, "WebSocket upgrade");
            ws.on_upgrade(move |socket| handle_socket(socket, player_id, state))
        }
        Err(e) => {
            error!(error = %e, "WebSocket auth failed");
            e.into_response()
        }
    }
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, player_id: String, state: AppState) {
    info!(player_id = %player_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    let welcome = ServerMsg::Welcome {
        player_id: player_id.clone(),
        server_time: unix_millis(),
    };

    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(player_id = %player_id, error = %e, "Failed to send welcome");
        return;
    }

    let open_connections = state.presence.connect(&player_id);
    debug!(player_id = %player_id, open_connections, "Connection registered");

    let events_rx = state.presence.subscribe();
    let limiter = ConnectionRateLimiter::new(state.config.update_rate_limit);

    run_session(&player_id, &state.presence, limiter, ws_sink, ws_stream, events_rx).await;

    // Cleanup on disconnect; other sockets for this id keep the player present
    state.presence.leave(&player_id);

    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    player_id: &str,
    presence: &PresenceHub,
    limiter: ConnectionRateLimiter,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    mut events_rx: broadcast::Receiver<RelayEvent>,
) {
    let (direct_tx, mut direct_rx) = mpsc::channel::<ServerMsg>(DIRECT_CAPACITY);

    // Spawn writer task: direct replies and relayed events -> WebSocket
    let writer_player_id = player_id.to_string();
    let writer_handle = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                direct = direct_rx.recv() => match direct {
                    Some(msg) => msg,
                    None => break,
                },
                event = events_rx.recv() => match event {
                    Ok(event) if event.origin == writer_player_id => continue,
                    Ok(event) => event.msg,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Dropped updates are superseded by later ones
                        warn!(
                            player_id = %writer_player_id,
                            lagged_count = n,
                            "Client lagged, skipping {} relay events", n
                        );
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(player_id = %writer_player_id, "Relay channel closed");
                        break;
                    }
                },
            };

            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(player_id = %writer_player_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> presence hub
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => match decode_client_msg(&text) {
                Ok(client_msg) => {
                    if let Some(reply) = handle_client_msg(player_id, presence, &limiter, client_msg) {
                        if direct_tx.send(reply).await.is_err() {
                            debug!(player_id = %player_id, "Writer gone");
                            break;
                        }
                    }
                }
                Err(e) => {
                    warn!(player_id = %player_id, error = %e, "Failed to parse client message");
                }
            },
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(player_id = %player_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(player_id = %player_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Apply one client message to the hub. Returns a reply for this
/// connection only, if any.
fn handle_client_msg(
    player_id: &str,
    presence: &PresenceHub,
    limiter: &ConnectionRateLimiter,
    msg: ClientMsg,
) -> Option<ServerMsg> {
    match msg {
        ClientMsg::Join {
            username,
            avatar_url,
            position,
            rotation,
        } => {
            let state = PlayerState {
                id: player_id.to_string(),
                username: username
                    .filter(|u| !u.is_empty())
                    .unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
                avatar_url: avatar_url.unwrap_or_default(),
                position: position.map(Vec3::from_array).unwrap_or(Vec3::ZERO),
                rotation: rotation.unwrap_or(0.0),
                is_moving: false,
                is_running: false,
                last_updated: Some(unix_millis()),
            };
            let players = presence.join(state);
            Some(ServerMsg::Roster { players })
        }
        ClientMsg::PlayerUpdate(mut wire) => {
            if !limiter.check_update() {
                warn!(player_id = %player_id, "Rate limited player update");
                return None;
            }

            // A connection may only speak for itself
            wire.id = Some(player_id.to_string());
            match PlayerState::try_from(wire) {
                Ok(state) => presence.update(state),
                Err(e) => warn!(player_id = %player_id, error = %e, "Rejected player update"),
            }
            None
        }
        ClientMsg::Sync => {
            if !limiter.check_sync() {
                warn!(player_id = %player_id, "Rate limited roster sync");
                return None;
            }
            Some(ServerMsg::Roster {
                players: presence.roster_for(player_id),
            })
        }
        ClientMsg::Ping { t } => Some(ServerMsg::Pong { t }),
    }
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::WirePlayerState;

    #[test]
    fn unauthenticated_relay_uses_requested_id() {
        let query = WsQuery {
            token: None,
            player_id: Some("p7".into()),
        };
        assert_eq!(resolve_player_id(&query, None).unwrap(), "p7");

        let anonymous = WsQuery {
            token: None,
            player_id: None,
        };
        assert_eq!(resolve_player_id(&anonymous, None).unwrap().len(), 36);
    }

    #[test]
    fn secret_requires_token() {
        let query = WsQuery {
            token: None,
            player_id: Some("p7".into()),
        };
        assert!(matches!(
            resolve_player_id(&query, Some("s3cret")),
            Err(AuthError::MissingToken)
        ));
    }

    #[tokio::test]
    async fn join_replies_with_roster_and_updates_cannot_spoof() {
        let hub = PresenceHub::new();
        let limiter = ConnectionRateLimiter::default();

        let join = ClientMsg::Join {
            username: Some("ana".into()),
            avatar_url: None,
            position: None,
            rotation: None,
        };
        assert!(matches!(
            handle_client_msg("a", &hub, &limiter, join),
            Some(ServerMsg::Roster { ref players }) if players.is_empty()
        ));

        let mut rx = hub.subscribe();
        let spoofed = ClientMsg::PlayerUpdate(WirePlayerState {
            id: Some("someone-else".into()),
            position: Some([1.0, 0.0, 0.0]),
            ..Default::default()
        });
        assert!(handle_client_msg("a", &hub, &limiter, spoofed).is_none());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.origin, "a");
        assert!(!hub.contains("someone-else"));

        let roster = handle_client_msg("b", &hub, &limiter, ClientMsg::Sync);
        assert!(matches!(
            roster,
            Some(ServerMsg::Roster { ref players }) if players.len() == 1
        ));
    }
}
