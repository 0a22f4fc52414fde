//! Per-remote-player smoothing: velocity estimation, dead reckoning and
//! adaptive exponential interpolation

use std::f32::consts::{PI, TAU};
use std::time::Duration;

use glam::Vec3;

use crate::sync::animation::AnimationBlender;
use crate::sync::config::VELOCITY_GAP_SECS;
use crate::sync::transport::AvatarFrame;
use crate::ws::protocol::PlayerState;

/// Dead reckoning starts once an update is this overdue (seconds)
pub const DEAD_RECKONING_START_SECS: f32 = 0.1;
/// Dead reckoning stops here and the target is held
pub const DEAD_RECKONING_END_SECS: f32 = 0.3;
/// Extrapolate at half the estimated speed to avoid overshoot
pub const DEAD_RECKONING_DAMPING: f32 = 0.5;

const MOVING_LERP_RATE: f32 = 12.0;
const MOVING_LERP_MAX: f32 = 0.25;
const IDLE_LERP_RATE: f32 = 8.0;
const IDLE_LERP_MAX: f32 = 0.15;
const ROTATION_LERP_RATE: f32 = 8.0;
const ROTATION_LERP_MAX: f32 = 0.2;

/// Where a remote player sits relative to its last sample. Derived every
/// frame from elapsed time, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionPhase {
    /// Fresh sample, follow it directly
    Tracking,
    /// Overdue while moving, extrapolate from velocity
    DeadReckoning,
    /// Hold the last target
    Holding,
    /// Silent for longer than the eviction threshold
    Stale,
}

/// One remote participant as seen by this client
#[derive(Debug, Clone)]
pub struct RemotePlayer {
    id: String,
    username: String,
    avatar_url: String,

    pub target_position: Vec3,
    pub target_rotation: f32,
    rendered_position: Vec3,
    rendered_rotation: f32,
    velocity: Vec3,
    /// Last position actually received; velocity is estimated from samples,
    /// not from the extrapolated target
    last_sample_position: Vec3,

    pub is_moving: bool,
    pub is_running: bool,
    pub last_update_ms: u64,

    animation: AnimationBlender,
}

impl RemotePlayer {
    /// First sighting. The avatar appears where the sample says it is.
    pub fn new(state: &PlayerState, now_ms: u64) -> Self {
        Self {
            id: state.id.clone(),
            username: state.username.clone(),
            avatar_url: state.avatar_url.clone(),
            target_position: state.position,
            target_rotation: state.rotation,
            rendered_position: state.position,
            rendered_rotation: state.rotation,
            velocity: Vec3::ZERO,
            last_sample_position: state.position,
            is_moving: state.is_moving,
            is_running: state.is_running,
            last_update_ms: now_ms,
            animation: AnimationBlender::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn avatar_url(&self) -> &str {
        &self.avatar_url
    }

    pub fn rendered_position(&self) -> Vec3 {
        self.rendered_position
    }

    pub fn rendered_rotation(&self) -> f32 {
        self.rendered_rotation
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    /// Accept a new authoritative sample. Rendered state is left for the
    /// next [`RemotePlayer::step`]. Samples that land in the same frame as
    /// the previous one keep the current velocity.
    pub fn receive(&mut self, state: &PlayerState, now_ms: u64, max_speed: f32) {
        if let Some(velocity) = estimate_velocity(
            self.last_sample_position,
            state.position,
            now_ms.saturating_sub(self.last_update_ms),
            max_speed,
        ) {
            self.velocity = velocity;
        }

        self.target_position = state.position;
        self.target_rotation = state.rotation;
        self.last_sample_position = state.position;
        self.is_moving = state.is_moving;
        self.is_running = state.is_running;
        self.last_update_ms = now_ms;
    }

    /// Seconds since the last sample arrived
    pub fn time_since_update(&self, now_ms: u64) -> f32 {
        now_ms.saturating_sub(self.last_update_ms) as f32 / 1000.0
    }

    pub fn phase(&self, now_ms: u64, stale_after: Option<Duration>) -> MotionPhase {
        let since = self.time_since_update(now_ms);

        if stale_after.is_some_and(|limit| since > limit.as_secs_f32()) {
            MotionPhase::Stale
        } else if since <= DEAD_RECKONING_START_SECS {
            MotionPhase::Tracking
        } else if self.is_moving && since < DEAD_RECKONING_END_SECS {
            MotionPhase::DeadReckoning
        } else {
            MotionPhase::Holding
        }
    }

    /// Advance one render frame of `dt` seconds
    pub fn step(&mut self, now_ms: u64, dt: f32) -> AvatarFrame {
        let dt = dt.max(0.0);

        if self.phase(now_ms, None) == MotionPhase::DeadReckoning {
            self.target_position += self.velocity * dt * DEAD_RECKONING_DAMPING;
        }

        let factor = lerp_factor(self.is_moving, dt);
        self.rendered_position = self.rendered_position.lerp(self.target_position, factor);

        let delta = shortest_angle(self.rendered_rotation, self.target_rotation);
        self.rendered_rotation += delta * (dt * ROTATION_LERP_RATE).min(ROTATION_LERP_MAX);

        let animation = self
            .animation
            .update(self.is_moving, self.is_running, false, dt);

        AvatarFrame {
            position: self.rendered_position,
            rotation_y: self.rendered_rotation,
            animation,
        }
    }
}

/// Velocity from two consecutive samples `elapsed_ms` apart. Gaps of
/// [`VELOCITY_GAP_SECS`] or more are discontinuities and give zero.
/// Returns `None` when both samples share a timestamp, leaving the previous
/// estimate in place.
pub fn estimate_velocity(
    previous: Vec3,
    current: Vec3,
    elapsed_ms: u64,
    max_speed: f32,
) -> Option<Vec3> {
    if elapsed_ms == 0 {
        return None;
    }

    let dt = elapsed_ms as f32 / 1000.0;
    if dt >= VELOCITY_GAP_SECS {
        return Some(Vec3::ZERO);
    }

    let velocity = (current - previous) / dt;
    if velocity.length() > max_speed {
        Some(velocity.normalize_or_zero() * max_speed)
    } else {
        Some(velocity)
    }
}

/// Fraction of the remaining distance closed this frame
pub fn lerp_factor(is_moving: bool, dt: f32) -> f32 {
    if is_moving {
        (dt * MOVING_LERP_RATE).min(MOVING_LERP_MAX)
    } else {
        (dt * IDLE_LERP_RATE).min(IDLE_LERP_MAX)
    }
}

/// Signed angle from `from` to `to`, in `[-π, π)`
pub fn shortest_angle(from: f32, to: f32) -> f32 {
    (to - from + PI).rem_euclid(TAU) - PI
}
