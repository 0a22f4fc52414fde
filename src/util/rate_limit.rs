//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Player updates per second per connection. Well-behaved clients send at
/// most ten while moving.
pub const UPDATE_RATE_LIMIT: u32 = 30;

/// Roster re-sync requests per second per connection
pub const SYNC_RATE_LIMIT: u32 = 2;

/// Per-connection rate limiter state
#[derive(Clone)]
pub struct ConnectionRateLimiter {
    update_limiter: Arc<Limiter>,
    sync_limiter: Arc<Limiter>,
}

impl ConnectionRateLimiter {
    pub fn new(updates_per_second: u32) -> Self {
        Self {
            update_limiter: create_limiter(updates_per_second),
            sync_limiter: create_limiter(SYNC_RATE_LIMIT),
        }
    }

    /// Check if a player update is allowed (returns true if allowed)
    pub fn check_update(&self) -> bool {
        self.update_limiter.check().is_ok()
    }

    /// Check if a roster re-sync is allowed
    pub fn check_sync(&self) -> bool {
        self.sync_limiter.check().is_ok()
    }
}

impl Default for ConnectionRateLimiter {
    fn default() -> Self {
        Self::new(UPDATE_RATE_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_beyond_quota_is_rejected() {
        let limiter = ConnectionRateLimiter::new(5);
        let allowed = (0..20).filter(|_| limiter.check_update()).count();
        assert!(allowed >= 5 && allowed < 20);
    }
}
