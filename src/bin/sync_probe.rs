//! Headless storefront shopper
//!
//! Connects to the presence relay, wanders around the store floor and runs
//! the full sync loop at 60 Hz, logging what it sees of other shoppers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use storefront_sync::config::ProbeConfig;
use storefront_sync::sync::transport::ChannelTransport;
use storefront_sync::sync::{
    AvatarBinding, AvatarFrame, MotionInput, PhysicsBody, PlayerIdentity, SyncConfig, SyncSession,
    Transport,
};
use storefront_sync::util::logging::init_tracing;
use storefront_sync::util::time::{frame_interval, unix_millis, FrameClock};
use storefront_sync::ws::client::RelayConnection;
use storefront_sync::ws::protocol::ClientMsg;

const WALK_SPEED: f32 = 2.5;
const RUN_SPEED: f32 = 6.0;
/// Half-width of the store floor
const FLOOR_EXTENT: f32 = 20.0;
const REPORT_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy)]
enum Activity {
    Browsing { remaining: f32 },
    Walking { heading: f32, running: bool, remaining: f32 },
}

/// Kinematic stand-in for the local physics body
struct Wanderer {
    position: Vec3,
    velocity: Vec3,
    activity: Activity,
    rng: StdRng,
}

impl Wanderer {
    fn new() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            activity: Activity::Browsing { remaining: 1.0 },
            rng: StdRng::from_entropy(),
        }
    }

    fn advance(&mut self, dt: f32) {
        self.activity = match self.activity {
            Activity::Browsing { remaining } if remaining > 0.0 => Activity::Browsing {
                remaining: remaining - dt,
            },
            Activity::Walking {
                heading,
                running,
                remaining,
            } if remaining > 0.0 => Activity::Walking {
                heading,
                running,
                remaining: remaining - dt,
            },
            Activity::Browsing { .. } => Activity::Walking {
                heading: self.rng.gen_range(0.0..std::f32::consts::TAU),
                running: self.rng.gen_bool(0.3),
                remaining: self.rng.gen_range(1.0..4.0),
            },
            Activity::Walking { .. } => Activity::Browsing {
                remaining: self.rng.gen_range(0.5..3.0),
            },
        };

        self.velocity = match self.activity {
            Activity::Walking { heading, running, .. } => {
                let speed = if running { RUN_SPEED } else { WALK_SPEED };
                Vec3::new(heading.sin(), 0.0, heading.cos()) * speed
            }
            Activity::Browsing { .. } => Vec3::ZERO,
        };

        let next = self.position + self.velocity * dt;
        self.position = next.clamp(Vec3::splat(-FLOOR_EXTENT), Vec3::splat(FLOOR_EXTENT));
    }

    fn input(&self) -> MotionInput {
        match self.activity {
            Activity::Walking { running, .. } => MotionInput {
                forward: true,
                run: running,
                ..Default::default()
            },
            Activity::Browsing { .. } => MotionInput::default(),
        }
    }
}

impl PhysicsBody for Wanderer {
    fn translation(&self) -> Option<Vec3> {
        Some(self.position)
    }

    fn linear_velocity(&self) -> Vec3 {
        self.velocity
    }
}

/// Remote avatars as the renderer would hold them
#[derive(Clone, Default)]
struct Scene {
    avatars: Arc<Mutex<HashMap<String, AvatarFrame>>>,
}

impl AvatarBinding for Scene {
    fn apply(&mut self, id: &str, frame: &AvatarFrame) {
        self.avatars.lock().insert(id.to_string(), frame.clone());
    }

    fn despawn(&mut self, id: &str) {
        self.avatars.lock().remove(id);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = ProbeConfig::from_env()?;
    let sync_config = SyncConfig::from_env()?;
    init_tracing(&config.log_level);

    let connection = RelayConnection::connect(&config.relay_url).await?;
    let identity = PlayerIdentity {
        id: connection.player_id.clone(),
        username: config.username.clone(),
        avatar_url: config.avatar_url.clone(),
    };

    let (transport, outbound_rx) = ChannelTransport::new();
    let mut session = SyncSession::new(sync_config, identity, transport.clone());
    let (writer, reader) = connection.spawn(outbound_rx, session.inbound());

    transport.publish(ClientMsg::Join {
        username: Some(config.username.clone()),
        avatar_url: Some(config.avatar_url.clone()),
        position: Some([0.0, 0.0, 0.0]),
        rotation: Some(0.0),
    })?;

    let mut wanderer = Wanderer::new();
    let mut scene = Scene::default();
    let mut clock = FrameClock::new();
    let mut ticker = interval(frame_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut reporter = interval(REPORT_INTERVAL);
    let mut broadcasts = 0u32;

    info!("Probe running, Ctrl+C to stop");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let dt = clock.delta();
                wanderer.advance(dt);
                let input = wanderer.input();
                let report = session.frame(unix_millis(), dt, &wanderer, input, &mut scene);
                if report.broadcast {
                    broadcasts += 1;
                }
            }
            _ = reporter.tick() => {
                let avatars = scene.avatars.lock();
                info!(
                    remote_players = avatars.len(),
                    broadcasts,
                    x = wanderer.position.x,
                    z = wanderer.position.z,
                    "Probe status"
                );
                for (id, frame) in avatars.iter() {
                    info!(
                        player_id = %id,
                        x = frame.position.x,
                        z = frame.position.z,
                        rotation = frame.rotation_y,
                        clip = ?frame.animation.current,
                        "Remote avatar"
                    );
                }
                broadcasts = 0;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, leaving store");
                break;
            }
        }

        if reader.is_finished() {
            warn!("Relay connection lost");
            break;
        }
    }

    writer.abort();
    reader.abort();
    Ok(())
}
