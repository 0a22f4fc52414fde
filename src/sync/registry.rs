//! Registry of remote players known to this client

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, info};

use crate::sync::interpolation::{MotionPhase, RemotePlayer};
use crate::ws::protocol::PlayerState;

/// Result of applying one incoming sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// First sighting, a record was created
    Created,
    Updated,
    /// The sample was our own echo
    IgnoredSelf,
}

/// Owns exactly one [`RemotePlayer`] per remote id
pub struct RemotePlayerRegistry {
    self_id: String,
    max_speed: f32,
    players: HashMap<String, RemotePlayer>,
}

impl RemotePlayerRegistry {
    pub fn new(self_id: impl Into<String>, max_speed: f32) -> Self {
        Self {
            self_id: self_id.into(),
            max_speed,
            players: HashMap::new(),
        }
    }

    /// Create records for roster entries we have not seen yet. Existing
    /// records keep their state. Returns how many were created.
    pub fn seed_from_roster(&mut self, roster: &[PlayerState], now_ms: u64) -> usize {
        let mut created = 0;
        for entry in roster {
            if entry.id == self.self_id || self.players.contains_key(&entry.id) {
                continue;
            }
            self.players
                .insert(entry.id.clone(), RemotePlayer::new(entry, now_ms));
            created += 1;
        }

        if created > 0 {
            info!(created, total = self.players.len(), "Seeded remote players from roster");
        }
        created
    }

    /// Apply a sample in arrival order; last write wins
    pub fn apply_update(&mut self, update: &PlayerState, now_ms: u64) -> ApplyOutcome {
        if update.id == self.self_id {
            return ApplyOutcome::IgnoredSelf;
        }

        match self.players.get_mut(&update.id) {
            Some(player) => {
                player.receive(update, now_ms, self.max_speed);
                ApplyOutcome::Updated
            }
            None => {
                debug!(player_id = %update.id, "First sighting via update");
                self.players
                    .insert(update.id.clone(), RemotePlayer::new(update, now_ms));
                ApplyOutcome::Created
            }
        }
    }

    /// Forget a player. Absent ids are fine.
    pub fn remove(&mut self, id: &str) -> Option<RemotePlayer> {
        let removed = self.players.remove(id);
        if removed.is_some() {
            info!(player_id = %id, "Remote player left");
        }
        removed
    }

    /// Drop players silent for longer than `stale_after`
    pub fn evict_stale(&mut self, now_ms: u64, stale_after: Duration) -> Vec<String> {
        let stale: Vec<String> = self
            .players
            .values()
            .filter(|p| p.phase(now_ms, Some(stale_after)) == MotionPhase::Stale)
            .map(|p| p.id().to_string())
            .collect();

        for id in &stale {
            self.players.remove(id);
            info!(player_id = %id, "Evicted stale remote player");
        }
        stale
    }

    pub fn get(&self, id: &str) -> Option<&RemotePlayer> {
        self.players.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemotePlayer> {
        self.players.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RemotePlayer> {
        self.players.values_mut()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn self_id(&self) -> &str {
        &self.self_id
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    fn update(id: &str, x: f32) -> PlayerState {
        PlayerState {
            id: id.into(),
            username: format!("user-{id}"),
            avatar_url: format!("https://cdn.example/{id}.glb"),
            position: Vec3::new(x, 0.0, 0.0),
            rotation: 0.5,
            is_moving: true,
            is_running: false,
            last_updated: Some(42),
        }
    }

    #[test]
    fn first_sighting_creates_one_record() {
        let mut registry = RemotePlayerRegistry::new("me", 10.0);

        assert_eq!(registry.apply_update(&update("a", 2.0), 1_000), ApplyOutcome::Created);
        assert_eq!(registry.apply_update(&update("a", 2.0), 1_016), ApplyOutcome::Updated);
        assert_eq!(registry.len(), 1);

        let player = registry.get("a").unwrap();
        assert_eq!(player.target_position, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(player.target_rotation, 0.5);
        assert_eq!(player.username(), "user-a");
        assert!(player.is_moving);
    }

    #[test]
    fn own_updates_are_ignored() {
        let mut registry = RemotePlayerRegistry::new("me", 10.0);
        assert_eq!(registry.apply_update(&update("me", 1.0), 0), ApplyOutcome::IgnoredSelf);
        assert!(registry.is_empty());
    }

    #[test]
    fn removing_absent_player_is_a_noop() {
        let mut registry = RemotePlayerRegistry::new("me", 10.0);
        registry.apply_update(&update("a", 0.0), 0);

        assert!(registry.remove("ghost").is_none());
        assert_eq!(registry.len(), 1);
        assert!(registry.remove("a").is_some());
        assert!(registry.remove("a").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn roster_seed_skips_self_and_known_players() {
        let mut registry = RemotePlayerRegistry::new("me", 10.0);
        registry.apply_update(&update("a", 7.0), 0);

        let roster = vec![update("me", 0.0), update("a", 0.0), update("b", 3.0)];
        assert_eq!(registry.seed_from_roster(&roster, 500), 1);
        assert_eq!(registry.len(), 2);

        // Known player kept its live target
        assert_eq!(registry.get("a").unwrap().target_position.x, 7.0);
        assert_eq!(registry.get("b").unwrap().rendered_position().x, 3.0);
    }

    #[test]
    fn update_leaves_rendered_state_alone() {
        let mut registry = RemotePlayerRegistry::new("me", 10.0);
        registry.apply_update(&update("a", 0.0), 0);
        registry.apply_update(&update("a", 1.0), 100);

        let player = registry.get("a").unwrap();
        assert_eq!(player.rendered_position(), Vec3::ZERO);
        assert!((player.velocity().x - 10.0).abs() < 1e-4);
    }

    #[test]
    fn updates_drained_in_one_frame_keep_velocity() {
        let mut registry = RemotePlayerRegistry::new("me", 10.0);
        registry.apply_update(&update("a", 0.0), 0);
        registry.apply_update(&update("a", 1.0), 100);

        registry.apply_update(&update("a", 1.8), 300);
        registry.apply_update(&update("a", 2.0), 300);

        let player = registry.get("a").unwrap();
        assert_ne!(player.velocity(), Vec3::ZERO);
        assert_eq!(player.target_position.x, 2.0);
    }

    #[test]
    fn stale_players_are_evicted() {
        let mut registry = RemotePlayerRegistry::new("me", 10.0);
        registry.apply_update(&update("a", 0.0), 0);
        registry.apply_update(&update("b", 0.0), 10_000);

        let evicted = registry.evict_stale(16_000, Duration::from_secs(15));
        assert_eq!(evicted, vec!["a".to_string()]);
        assert!(registry.get("b").is_some());
    }
}
