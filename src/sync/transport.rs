//! Seams to the transport channel and the renderer

use glam::Vec3;
use tokio::sync::mpsc;

use crate::sync::animation::AnimationWeights;
use crate::ws::protocol::{ClientMsg, PlayerState, WirePlayerState};

/// Outbound half of the transport channel. Publishing never blocks.
pub trait Transport {
    fn publish(&self, msg: ClientMsg) -> Result<(), TransportError>;
}

/// Queue-backed transport; a socket writer task drains the receiver
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<ClientMsg>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ClientMsg>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn publish(&self, msg: ClientMsg) -> Result<(), TransportError> {
        self.tx.send(msg).map_err(|_| TransportError::Closed)
    }
}

/// Transport that is never connected
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineTransport;

impl Transport for OfflineTransport {
    fn publish(&self, _msg: ClientMsg) -> Result<(), TransportError> {
        Err(TransportError::Unavailable)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Transport is not connected")]
    Unavailable,

    #[error("Transport channel closed")]
    Closed,
}

/// Events delivered by the transport, already decoded
#[derive(Debug, Clone)]
pub enum InboundEvent {
    Roster(Vec<PlayerState>),
    Update(PlayerState),
    Disconnect(String),
}

impl InboundEvent {
    /// Decode the roster entries, dropping those without an id
    pub fn roster(players: Vec<WirePlayerState>) -> Self {
        Self::Roster(
            players
                .into_iter()
                .filter_map(|p| PlayerState::try_from(p).ok())
                .collect(),
        )
    }
}

/// One remote avatar's output for the current frame
#[derive(Debug, Clone, PartialEq)]
pub struct AvatarFrame {
    pub position: Vec3,
    pub rotation_y: f32,
    pub animation: AnimationWeights,
}

/// Renderer-side handle for remote avatars
pub trait AvatarBinding {
    fn apply(&mut self, id: &str, frame: &AvatarFrame);

    /// The player is gone; drop its avatar
    fn despawn(&mut self, _id: &str) {}
}
