//! The per-client synchronization service.
//!
//! `SyncSession` is the single writer of remote-player state. Network tasks
//! only push decoded [`InboundEvent`]s into its queue; everything is applied
//! at the start of the next frame, before interpolation reads it.

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::sync::broadcast::{BroadcastPolicy, PlayerIdentity};
use crate::sync::config::SyncConfig;
use crate::sync::motion::{LocalMotionSample, MotionInput, MotionSampler, PhysicsBody};
use crate::sync::registry::RemotePlayerRegistry;
use crate::sync::transport::{AvatarBinding, InboundEvent, Transport};

/// Cloneable sender handed to the network-receive path
#[derive(Debug, Clone)]
pub struct InboundSender {
    tx: mpsc::UnboundedSender<InboundEvent>,
}

impl InboundSender {
    /// Queue an event for the next frame. Returns `false` once the session
    /// is gone.
    pub fn push(&self, event: InboundEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Summary of one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub sample: Option<LocalMotionSample>,
    pub broadcast: bool,
    pub events_applied: usize,
    pub evicted: Vec<String>,
    pub remote_players: usize,
}

pub struct SyncSession<T: Transport> {
    config: SyncConfig,
    transport: T,
    sampler: MotionSampler,
    policy: BroadcastPolicy,
    registry: RemotePlayerRegistry,
    inbound_rx: mpsc::UnboundedReceiver<InboundEvent>,
    inbound_tx: mpsc::UnboundedSender<InboundEvent>,
}

impl<T: Transport> SyncSession<T> {
    pub fn new(config: SyncConfig, identity: PlayerIdentity, transport: T) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let registry = RemotePlayerRegistry::new(identity.id.clone(), config.max_speed);

        info!(player_id = %identity.id, username = %identity.username, "Sync session started");

        Self {
            policy: BroadcastPolicy::new(config.clone(), identity),
            config,
            transport,
            sampler: MotionSampler::default(),
            registry,
            inbound_rx,
            inbound_tx,
        }
    }

    pub fn inbound(&self) -> InboundSender {
        InboundSender {
            tx: self.inbound_tx.clone(),
        }
    }

    pub fn registry(&self) -> &RemotePlayerRegistry {
        &self.registry
    }

    pub fn policy(&self) -> &BroadcastPolicy {
        &self.policy
    }

    /// Apply one event immediately. Used by the queue drain and by callers
    /// that already run on the frame thread.
    pub fn handle_event(&mut self, event: InboundEvent, now_ms: u64, binding: &mut impl AvatarBinding) {
        match event {
            InboundEvent::Roster(players) => {
                self.registry.seed_from_roster(&players, now_ms);
            }
            InboundEvent::Update(update) => {
                self.registry.apply_update(&update, now_ms);
            }
            InboundEvent::Disconnect(id) => {
                if self.registry.remove(&id).is_some() {
                    binding.despawn(&id);
                }
            }
        }
    }

    /// Run one render/simulation frame: drain the network queue, sample and
    /// maybe broadcast local motion, then advance every remote avatar.
    pub fn frame(
        &mut self,
        now_ms: u64,
        dt: f32,
        body: &impl PhysicsBody,
        input: MotionInput,
        binding: &mut impl AvatarBinding,
    ) -> FrameReport {
        let mut report = FrameReport::default();

        while let Ok(event) = self.inbound_rx.try_recv() {
            self.handle_event(event, now_ms, binding);
            report.events_applied += 1;
        }

        if let Some(stale_after) = self.config.stale_after {
            report.evicted = self.registry.evict_stale(now_ms, stale_after);
            for id in &report.evicted {
                binding.despawn(id);
            }
        }

        report.sample = self.sampler.sample(body, input);
        if let Some(sample) = &report.sample {
            report.broadcast = self.policy.tick(sample, now_ms, &self.transport);
        } else {
            debug!("Local body not ready, skipping broadcast");
        }

        for player in self.registry.iter_mut() {
            let frame = player.step(now_ms, dt);
            binding.apply(player.id(), &frame);
        }
        report.remote_players = self.registry.len();

        report
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use glam::Vec3;

    use super::*;
    use crate::sync::transport::{AvatarFrame, ChannelTransport};
    use crate::ws::protocol::{ClientMsg, PlayerState};

    struct Body(Option<Vec3>);

    impl PhysicsBody for Body {
        fn translation(&self) -> Option<Vec3> {
            self.0
        }

        fn linear_velocity(&self) -> Vec3 {
            Vec3::ZERO
        }
    }

    #[derive(Default)]
    struct Scene {
        avatars: HashMap<String, AvatarFrame>,
        despawned: Vec<String>,
    }

    impl AvatarBinding for Scene {
        fn apply(&mut self, id: &str, frame: &AvatarFrame) {
            self.avatars.insert(id.to_string(), frame.clone());
        }

        fn despawn(&mut self, id: &str) {
            self.avatars.remove(id);
            self.despawned.push(id.to_string());
        }
    }

    fn identity() -> PlayerIdentity {
        PlayerIdentity {
            id: "me".into(),
            username: "mara".into(),
            avatar_url: String::new(),
        }
    }

    fn remote(id: &str, x: f32) -> PlayerState {
        PlayerState {
            id: id.into(),
            username: id.into(),
            avatar_url: String::new(),
            position: Vec3::new(x, 0.0, 0.0),
            rotation: 0.0,
            is_moving: false,
            is_running: false,
            last_updated: None,
        }
    }

    #[test]
    fn queued_events_apply_before_interpolation() {
        let (transport, _rx) = ChannelTransport::new();
        let mut session = SyncSession::new(SyncConfig::default(), identity(), transport);
        let inbound = session.inbound();
        let mut scene = Scene::default();

        assert!(inbound.push(InboundEvent::Roster(vec![remote("a", 1.0), remote("me", 0.0)])));
        assert!(inbound.push(InboundEvent::Update(remote("b", 2.0))));

        let report = session.frame(1_000, 0.016, &Body(None), MotionInput::default(), &mut scene);
        assert_eq!(report.events_applied, 2);
        assert_eq!(report.remote_players, 2);
        assert!(report.sample.is_none());
        assert!(!report.broadcast);
        assert!(scene.avatars["b"].position.distance(Vec3::new(2.0, 0.0, 0.0)) < 1e-5);

        inbound.push(InboundEvent::Disconnect("a".into()));
        inbound.push(InboundEvent::Disconnect("a".into()));
        let report = session.frame(1_016, 0.016, &Body(None), MotionInput::default(), &mut scene);
        assert_eq!(report.remote_players, 1);
        assert_eq!(scene.despawned, vec!["a".to_string()]);
    }

    #[test]
    fn local_motion_is_published() {
        let (transport, mut rx) = ChannelTransport::new();
        let mut session = SyncSession::new(SyncConfig::default(), identity(), transport);
        let mut scene = Scene::default();
        let input = MotionInput {
            forward: true,
            ..Default::default()
        };

        let report = session.frame(5_000, 0.016, &Body(Some(Vec3::new(0.0, 0.0, 3.0))), input, &mut scene);
        assert!(report.broadcast);

        match rx.try_recv() {
            Ok(ClientMsg::PlayerUpdate(wire)) => {
                assert_eq!(wire.id.as_deref(), Some("me"));
                assert_eq!(wire.position, Some([0.0, 0.0, 3.0]));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn silent_players_are_evicted_when_configured() {
        let config = SyncConfig {
            stale_after: Some(std::time::Duration::from_secs(15)),
            ..SyncConfig::default()
        };
        let (transport, _rx) = ChannelTransport::new();
        let mut session = SyncSession::new(config, identity(), transport);
        let mut scene = Scene::default();

        session.inbound().push(InboundEvent::Update(remote("a", 0.0)));
        session.frame(0, 0.016, &Body(None), MotionInput::default(), &mut scene);
        let report = session.frame(16_000, 0.016, &Body(None), MotionInput::default(), &mut scene);

        assert_eq!(report.evicted, vec!["a".to_string()]);
        assert!(session.registry().is_empty());
        assert_eq!(scene.despawned, vec!["a".to_string()]);
    }
}
