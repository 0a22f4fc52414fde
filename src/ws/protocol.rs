//! WebSocket protocol message definitions
//! These are the wire types shared by the presence relay and sync clients

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Username substituted when a peer announces none
pub const DEFAULT_USERNAME: &str = "Guest";

/// Messages sent from client to relay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Announce presence in the store
    #[serde(rename_all = "camelCase")]
    Join {
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        avatar_url: Option<String>,
        #[serde(default)]
        position: Option<[f32; 3]>,
        #[serde(default)]
        rotation: Option<f32>,
    },

    /// Local motion accepted by the broadcast policy
    PlayerUpdate(WirePlayerState),

    /// Ask for a fresh roster
    Sync,

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from relay to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    #[serde(rename_all = "camelCase")]
    Welcome {
        player_id: String,
        server_time: u64,
    },

    /// Everyone currently in the store, excluding the recipient
    Roster {
        players: Vec<WirePlayerState>,
    },

    /// A peer's broadcast, relayed
    PlayerUpdate(WirePlayerState),

    /// A peer disconnected
    PlayerLeft {
        id: String,
    },

    /// Error message
    Error {
        code: String,
        message: String,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// Player state as it travels on the wire.
///
/// Every field is optional so that partial payloads from older clients still
/// parse; [`PlayerState::try_from`] applies the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePlayerState {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub position: Option<[f32; 3]>,
    #[serde(default)]
    pub rotation: Option<f32>,
    #[serde(default)]
    pub is_moving: Option<bool>,
    #[serde(default)]
    pub is_running: Option<bool>,
    /// Epoch milliseconds, sender's clock
    #[serde(default)]
    pub last_updated: Option<u64>,
}

/// Validated player state.
///
/// Defaults: position `[0, 0, 0]`, rotation `0`, motion flags `false`,
/// username [`DEFAULT_USERNAME`], empty avatar URL, no timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub id: String,
    pub username: String,
    pub avatar_url: String,
    pub position: Vec3,
    /// Radians, Y axis only
    pub rotation: f32,
    pub is_moving: bool,
    pub is_running: bool,
    pub last_updated: Option<u64>,
}

impl TryFrom<WirePlayerState> for PlayerState {
    type Error = DecodeError;

    fn try_from(wire: WirePlayerState) -> Result<Self, Self::Error> {
        let id = wire
            .id
            .filter(|id| !id.is_empty())
            .ok_or(DecodeError::MissingId)?;

        let position = wire
            .position
            .map(Vec3::from_array)
            .filter(|p| p.is_finite())
            .unwrap_or(Vec3::ZERO);
        let rotation = wire.rotation.filter(|r| r.is_finite()).unwrap_or(0.0);

        Ok(Self {
            id,
            username: wire
                .username
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
            avatar_url: wire.avatar_url.unwrap_or_default(),
            position,
            rotation,
            is_moving: wire.is_moving.unwrap_or(false),
            is_running: wire.is_running.unwrap_or(false),
            last_updated: wire.last_updated,
        })
    }
}

impl From<&PlayerState> for WirePlayerState {
    fn from(state: &PlayerState) -> Self {
        Self {
            id: Some(state.id.clone()),
            username: Some(state.username.clone()),
            avatar_url: Some(state.avatar_url.clone()),
            position: Some(state.position.to_array()),
            rotation: Some(state.rotation),
            is_moving: Some(state.is_moving),
            is_running: Some(state.is_running),
            last_updated: state.last_updated,
        }
    }
}

/// Boundary decode errors
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Player state is missing its id")]
    MissingId,

    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode a relay frame
pub fn decode_server_msg(text: &str) -> Result<ServerMsg, DecodeError> {
    Ok(serde_json::from_str(text)?)
}

/// Decode a client frame
pub fn decode_client_msg(text: &str) -> Result<ClientMsg, DecodeError> {
    Ok(serde_json::from_str(text)?)
}
