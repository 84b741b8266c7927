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

/// Movement input messages (clients send on key change, bursts on focus loss)
pub const INPUT_RATE_LIMIT: u32 = 120;

/// Building placement requests
pub const BUILD_RATE_LIMIT: u32 = 5;

/// Ready-up / ping / other control messages
pub const CONTROL_RATE_LIMIT: u32 = 10;

/// Per-connection rate limiter state
#[derive(Clone)]
pub struct ConnectionRateLimiter {
    input_limiter: Arc<Limiter>,
    build_limiter: Arc<Limiter>,
    control_limiter: Arc<Limiter>,
}

impl ConnectionRateLimiter {
    pub fn new() -> Self {
        Self {
            input_limiter: create_limiter(INPUT_RATE_LIMIT),
            build_limiter: create_limiter(BUILD_RATE_LIMIT),
            control_limiter: create_limiter(CONTROL_RATE_LIMIT),
        }
    }

    /// Check if a movement input message is allowed
    pub fn check_input(&self) -> bool {
        self.input_limiter.check().is_ok()
    }

    /// Check if a building placement is allowed
    pub fn check_build(&self) -> bool {
        self.build_limiter.check().is_ok()
    }

    pub fn check_control(&self) -> bool {
        self.control_limiter.check().is_ok()
    }
}

impl Default for ConnectionRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_limiter_blocks_bursts() {
        let limiter = ConnectionRateLimiter::new();
        let allowed = (0..20).filter(|_| limiter.check_build()).count();
        assert_eq!(allowed, BUILD_RATE_LIMIT as usize);
    }

    #[test]
    fn zero_rate_falls_back_to_one() {
        let limiter = create_limiter(0);
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }
}
