//! Broadcast policy: when the local player's motion is worth sending

use glam::Vec3;
use tracing::debug;

use crate::sync::config::SyncConfig;
use crate::sync::motion::LocalMotionSample;
use crate::sync::transport::Transport;
use crate::ws::protocol::{ClientMsg, PlayerState, WirePlayerState};

/// Display identity attached to every broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerIdentity {
    pub id: String,
    pub username: String,
    pub avatar_url: String,
}

/// What was last sent, one per local session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BroadcastState {
    pub last_broadcast_ms: u64,
    pub last_position: Vec3,
    pub last_rotation: f32,
    pub last_is_moving: bool,
}

impl Default for BroadcastState {
    fn default() -> Self {
        Self {
            last_broadcast_ms: 0,
            last_position: Vec3::ZERO,
            last_rotation: 0.0,
            last_is_moving: false,
        }
    }
}

/// Throttles outbound motion: a broadcast needs both a meaningful delta and
/// a minimum interval since the previous one.
pub struct BroadcastPolicy {
    config: SyncConfig,
    identity: PlayerIdentity,
    state: BroadcastState,
}

impl BroadcastPolicy {
    pub fn new(config: SyncConfig, identity: PlayerIdentity) -> Self {
        Self {
            config,
            identity,
            state: BroadcastState::default(),
        }
    }

    pub fn state(&self) -> &BroadcastState {
        &self.state
    }

    pub fn identity(&self) -> &PlayerIdentity {
        &self.identity
    }

    /// Decide whether `sample` should go out at `now_ms`
    pub fn should_broadcast(&self, sample: &LocalMotionSample, now_ms: u64) -> bool {
        let last = &self.state;

        let position_changed =
            sample.position.distance(last.last_position) > self.config.position_epsilon;
        let rotation_changed =
            (sample.rotation_y - last.last_rotation).abs() > self.config.rotation_epsilon;
        let moving_state_changed = sample.is_moving != last.last_is_moving;
        let changed = position_changed || rotation_changed || moving_state_changed;

        let elapsed = now_ms.saturating_sub(last.last_broadcast_ms);
        let due = elapsed > self.config.required_interval_ms(sample.is_moving);

        due && (changed || (self.config.heartbeat && !sample.is_moving))
    }

    /// Run the policy for one tick. Returns `true` when a broadcast was
    /// emitted. Transport failures drop the message; the state still
    /// advances so the next qualifying delta sends fresh data.
    pub fn tick(
        &mut self,
        sample: &LocalMotionSample,
        now_ms: u64,
        transport: &impl Transport,
    ) -> bool {
        if !self.should_broadcast(sample, now_ms) {
            return false;
        }

        let update = self.build_update(sample, now_ms);
        if let Err(e) = transport.publish(ClientMsg::PlayerUpdate(WirePlayerState::from(&update))) {
            debug!(player_id = %self.identity.id, error = %e, "Broadcast dropped");
        }

        self.state = BroadcastState {
            last_broadcast_ms: now_ms,
            last_position: sample.position,
            last_rotation: sample.rotation_y,
            last_is_moving: sample.is_moving,
        };

        true
    }

    fn build_update(&self, sample: &LocalMotionSample, now_ms: u64) -> PlayerState {
        PlayerState {
            id: self.identity.id.clone(),
            username: self.identity.username.clone(),
            avatar_url: self.identity.avatar_url.clone(),
            position: sample.position,
            rotation: sample.rotation_y,
            is_moving: sample.is_moving,
            is_running: sample.is_running,
            last_updated: Some(now_ms),
        }
    }
}
