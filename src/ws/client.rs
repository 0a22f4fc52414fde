//! WebSocket client side of the transport channel

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::sync::session::InboundSender;
use crate::sync::transport::InboundEvent;
use crate::ws::protocol::{decode_server_msg, ClientMsg, PlayerState, ServerMsg};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("WebSocket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Relay closed before welcome")]
    NoWelcome,

    #[error("Unexpected first message from relay")]
    UnexpectedMessage,
}

/// A connected relay socket that has received its welcome
pub struct RelayConnection {
    pub player_id: String,
    pub server_time: u64,
    socket: Socket,
}

impl RelayConnection {
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        info!("Connecting to {}...", url);
        let (mut socket, _) = connect_async(url).await?;

        while let Some(frame) = socket.next().await {
            match frame? {
                Message::Text(text) => {
                    return match decode_server_msg(&text) {
                        Ok(ServerMsg::Welcome {
                            player_id,
                            server_time,
                        }) => {
                            info!(player_id = %player_id, "Relay welcomed us");
                            Ok(Self {
                                player_id,
                                server_time,
                                socket,
                            })
                        }
                        _ => Err(ClientError::UnexpectedMessage),
                    };
                }
                Message::Close(_) => break,
                _ => continue,
            }
        }

        Err(ClientError::NoWelcome)
    }

    /// Split into reader and writer tasks. Outbound messages are drained
    /// from `outbound_rx`; decoded inbound events go to `inbound`.
    pub fn spawn(
        self,
        mut outbound_rx: mpsc::UnboundedReceiver<ClientMsg>,
        inbound: InboundSender,
    ) -> (JoinHandle<()>, JoinHandle<()>) {
        let (mut write, mut read) = self.socket.split();
        let player_id = self.player_id;

        let writer = tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                let json = match serde_json::to_string(&msg) {
                    Ok(json) => json,
                    Err(e) => {
                        error!(error = %e, "Failed to encode client message");
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::Text(json)).await {
                    debug!(error = %e, "WebSocket send failed");
                    break;
                }
            }
        });

        let reader = tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => {
                        info!(player_id = %player_id, "Relay closed connection");
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        error!(player_id = %player_id, error = %e, "WebSocket read error");
                        break;
                    }
                };

                let event = match decode_server_msg(&text) {
                    Ok(msg) => match inbound_event(msg) {
                        Some(event) => event,
                        None => continue,
                    },
                    Err(e) => {
                        warn!(error = %e, "Failed to parse relay message");
                        continue;
                    }
                };

                if !inbound.push(event) {
                    debug!("Sync session dropped, stopping reader");
                    break;
                }
            }
        });

        (writer, reader)
    }
}

/// Map a relay message onto the sync core's inbound events
pub fn inbound_event(msg: ServerMsg) -> Option<InboundEvent> {
    match msg {
        ServerMsg::Roster { players } => Some(InboundEvent::roster(players)),
        ServerMsg::PlayerUpdate(wire) => match PlayerState::try_from(wire) {
            Ok(state) => Some(InboundEvent::Update(state)),
            Err(e) => {
                warn!(error = %e, "Dropping player update");
                None
            }
        },
        ServerMsg::PlayerLeft { id } => Some(InboundEvent::Disconnect(id)),
        ServerMsg::Error { code, message } => {
            warn!(code = %code, message = %message, "Relay reported error");
            None
        }
        ServerMsg::Welcome { .. } | ServerMsg::Pong { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::WirePlayerState;

    #[test]
    fn relay_messages_map_to_events() {
        let roster = ServerMsg::Roster {
            players: vec![
                WirePlayerState {
                    id: Some("a".into()),
                    ..Default::default()
                },
                WirePlayerState::default(),
            ],
        };
        match inbound_event(roster) {
            Some(InboundEvent::Roster(players)) => assert_eq!(players.len(), 1),
            other => panic!("unexpected {other:?}"),
        }

        assert!(matches!(
            inbound_event(ServerMsg::PlayerLeft { id: "a".into() }),
            Some(InboundEvent::Disconnect(ref id)) if id == "a"
        ));
        assert!(inbound_event(ServerMsg::PlayerUpdate(WirePlayerState::default())).is_none());
        assert!(inbound_event(ServerMsg::Pong { t: 1 }).is_none());
    }
}
