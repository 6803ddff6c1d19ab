//! Rate Limiting Middleware using GCRA Algorithm
//!
//! Limits sensor event submissions per client IP using tower_governor.
//! Pedal and seatbelt events arrive from UI controls that can fire far faster
//! than the tracker needs.

use governor::middleware::StateInformationMiddleware;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::PeerIpKeyExtractor;

use crate::error::ApiError;

/// Type alias for the governor config with default settings
/// StateInformationMiddleware is used when use_headers() is called to add X-RateLimit-* headers
pub type DefaultGovernorConfig =
    tower_governor::governor::GovernorConfig<PeerIpKeyExtractor, StateInformationMiddleware>;

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Whether sensor routes are rate limited at all
    pub enabled: bool,
    /// Milliseconds to replenish one request
    pub per_millisecond: u64,
    /// Burst size (max requests that can be made immediately)
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            per_millisecond: 200, // one event per debounce interval
            burst_size: 10,
        }
    }
}

impl RateLimitConfig {
    /// Create a strict config for slow clients
    pub fn strict() -> Self {
        Self {
            per_millisecond: 500,
            burst_size: 3,
            ..Default::default()
        }
    }

    /// Create a lenient config for simulators and replay
    pub fn lenient() -> Self {
        Self {
            per_millisecond: 50,
            burst_size: 50,
            ..Default::default()
        }
    }
}

/// Create a rate limiting governor config
///
/// Uses PeerIpKeyExtractor, so the service must be served with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
///
/// Adds X-RateLimit-* headers to responses for quota visibility.
pub fn create_governor_config(config: &RateLimitConfig) -> Result<Arc<DefaultGovernorConfig>, ApiError> {
    GovernorConfigBuilder::default()
        .per_millisecond(config.per_millisecond)
        .burst_size(config.burst_size)
        .use_headers()
        .finish()
        .map(Arc::new)
        .ok_or_else(|| {
            ApiError::Config(format!(
                "invalid rate limit: {} ms per request, burst {}",
                config.per_millisecond, config.burst_size
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RateLimitConfig::default();
        assert!(config.enabled);
        assert_eq!(config.per_millisecond, 200);
        assert_eq!(config.burst_size, 10);
    }

    #[test]
    fn test_strict_config() {
        let config = RateLimitConfig::strict();
        assert_eq!(config.per_millisecond, 500);
        assert_eq!(config.burst_size, 3);
    }

    #[test]
    fn test_create_governor_config() {
        let governor = create_governor_config(&RateLimitConfig::default()).unwrap();
        assert!(Arc::strong_count(&governor) > 0);
    }

    #[test]
    fn test_zero_burst_is_rejected() {
        let config = RateLimitConfig {
            burst_size: 0,
            ..Default::default()
        };
        assert!(matches!(create_governor_config(&config), Err(ApiError::Config(_))));
    }
}
