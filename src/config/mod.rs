//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;

use crate::util::rate_limit::UPDATE_RATE_LIMIT;

/// Relay configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Supabase JWT secret. When set, WebSocket clients must present a
    /// token and their player id is the token subject.
    pub supabase_jwt_secret: Option<String>,

    /// Allowed client origins for CORS, comma-separated. Empty allows any.
    pub client_origin: String,

    /// Max player updates accepted per connection per second
    pub update_rate_limit: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let update_rate_limit = match env::var("UPDATE_RATE_LIMIT") {
            Ok(v) => v
                .parse()
                .map_err(|_| ConfigError::Invalid("UPDATE_RATE_LIMIT"))?,
            Err(_) => UPDATE_RATE_LIMIT,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),

            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_default(),

            update_rate_limit,
        })
    }
}

/// Probe client configuration
#[derive(Clone, Debug)]
pub struct ProbeConfig {
    /// Relay WebSocket URL, e.g. `ws://127.0.0.1:8080/ws`
    pub relay_url: String,
    pub log_level: String,
    pub username: String,
    pub avatar_url: String,
}

impl ProbeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            relay_url: env::var("RELAY_URL")
                .map_err(|_| ConfigError::Missing("RELAY_URL"))?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            username: env::var("PROBE_USERNAME").unwrap_or_else(|_| "probe".to_string()),
            avatar_url: env::var("PROBE_AVATAR_URL").unwrap_or_default(),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
