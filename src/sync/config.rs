//! Tuning for broadcast throttling and remote-avatar smoothing

use std::env;
use std::time::Duration;

use crate::config::ConfigError;

/// Movement below this distance is not worth a broadcast (world units)
pub const POSITION_EPSILON: f32 = 0.1;
/// Facing change below this is not worth a broadcast (radians)
pub const ROTATION_EPSILON: f32 = 0.1;
/// Minimum gap between broadcasts while moving
pub const MOVING_INTERVAL_MS: u64 = 100;
/// Minimum gap between broadcasts while standing still
pub const STATIONARY_INTERVAL_MS: u64 = 3000;
/// Velocity estimates are clamped to this speed (units/s)
pub const MAX_SPEED: f32 = 10.0;
/// Samples further apart than this are treated as discontinuous (seconds)
pub const VELOCITY_GAP_SECS: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub position_epsilon: f32,
    pub rotation_epsilon: f32,
    pub moving_interval_ms: u64,
    pub stationary_interval_ms: u64,
    /// Re-announce an idle player every `stationary_interval_ms` even with no delta
    pub heartbeat: bool,
    pub max_speed: f32,
    /// Evict remote players that have been silent this long. `None` keeps
    /// them until an explicit disconnect notice.
    pub stale_after: Option<Duration>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            position_epsilon: POSITION_EPSILON,
            rotation_epsilon: ROTATION_EPSILON,
            moving_interval_ms: MOVING_INTERVAL_MS,
            stationary_interval_ms: STATIONARY_INTERVAL_MS,
            heartbeat: false,
            max_speed: MAX_SPEED,
            stale_after: None,
        }
    }
}

impl SyncConfig {
    /// Defaults overridden by `STALE_AFTER_MS` and `BROADCAST_HEARTBEAT`
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(ms) = env::var("STALE_AFTER_MS") {
            let ms: u64 = ms
                .parse()
                .map_err(|_| ConfigError::Invalid("STALE_AFTER_MS"))?;
            config.stale_after = (ms > 0).then(|| Duration::from_millis(ms));
        }

        if let Ok(flag) = env::var("BROADCAST_HEARTBEAT") {
            config.heartbeat = parse_flag(&flag).ok_or(ConfigError::Invalid("BROADCAST_HEARTBEAT"))?;
        }

        Ok(config)
    }

    /// Minimum gap before the next broadcast, depending on motion intent
    pub fn required_interval_ms(&self, is_moving: bool) -> u64 {
        if is_moving {
            self.moving_interval_ms
        } else {
            self.stationary_interval_ms
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_depends_on_motion() {
        let config = SyncConfig::default();
        assert_eq!(config.required_interval_ms(true), 100);
        assert_eq!(config.required_interval_ms(false), 3000);
    }

    #[test]
    fn flags_parse_loosely() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
