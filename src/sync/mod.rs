//! Remote avatar synchronization: broadcast throttling on the way out,
//! registry and interpolation on the way in

pub mod animation;
pub mod broadcast;
pub mod config;
pub mod interpolation;
pub mod motion;
pub mod registry;
pub mod session;
pub mod transport;

pub use broadcast::{BroadcastPolicy, BroadcastState, PlayerIdentity};
pub use config::SyncConfig;
pub use interpolation::{MotionPhase, RemotePlayer};
pub use motion::{LocalMotionSample, MotionInput, MotionSampler, PhysicsBody};
pub use registry::{ApplyOutcome, RemotePlayerRegistry};
pub use session::{FrameReport, InboundSender, SyncSession};
pub use transport::{AvatarBinding, AvatarFrame, InboundEvent, Transport, TransportError};
