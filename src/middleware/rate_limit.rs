//! Rate limiting built-in
//!
//! Currently a pass-through: the configuration surface exists so chains can
//! register it, but no requests are refused.
//
// TODO: real limiting needs a windowed per-key store and a decision on key
// extraction (IP vs header); design that before wiring anything here.

use crate::event::Event;
use std::time::Duration;

/// Rate limit configuration
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Maximum requests per window
    pub max_requests: u32,
    /// Window duration
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    /// Requests per second
    pub fn per_second(max: u32) -> Self {
        Self::new(max, Duration::from_secs(1))
    }

    /// Requests per minute
    pub fn per_minute(max: u32) -> Self {
        Self::new(max, Duration::from_secs(60))
    }
}

/// Placeholder: every request passes.
pub(crate) fn apply(_config: &RateLimitConfig, _event: &mut Event) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_never_blocks() {
        let config = RateLimitConfig::per_second(1);
        let mut ev = Event::new();
        for _ in 0..100 {
            apply(&config, &mut ev);
        }
        assert!(!ev.response.finished);
    }
}
