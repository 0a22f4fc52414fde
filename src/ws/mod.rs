//! WebSocket transport: relay handler, probe client and wire protocol

pub mod client;
pub mod handler;
pub mod protocol;
