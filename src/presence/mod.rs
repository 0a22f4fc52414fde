//! Server side of the transport channel

pub mod hub;

pub use hub::{PresenceHub, RelayEvent};
