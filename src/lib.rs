//! Storefront avatar synchronization
//!
//! - `sync`: the client-side core. Throttled broadcast of local motion, a
//!   registry of remote players, and per-frame interpolation with dead
//!   reckoning.
//! - `presence` / `ws` / `http`: a WebSocket presence relay that carries
//!   those broadcasts between shoppers.

pub mod app;
pub mod config;
pub mod http;
pub mod presence;
pub mod sync;
pub mod util;
pub mod ws;
