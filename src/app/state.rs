//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::presence::PresenceHub;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub presence: Arc<PresenceHub>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            presence: Arc::new(PresenceHub::new()),
        }
    }
}
