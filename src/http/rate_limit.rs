//! Rate limiting implementation
//!
//! Uses the governor crate for token bucket rate limiting.

use crate::error::{Error, Result};
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Time it takes the bucket to regain one permit when the caller supplies no limiter
pub const DEFAULT_REPLENISH_INTERVAL: Duration = Duration::from_secs(1);

/// Bucket capacity when the caller supplies no limiter
pub const DEFAULT_BURST_SIZE: u32 = 5;

/// Configuration for rate limiting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    /// Time to regain a single permit
    pub replenish_interval: Duration,
    /// Burst size (max tokens in bucket)
    pub burst_size: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            replenish_interval: DEFAULT_REPLENISH_INTERVAL,
            burst_size: DEFAULT_BURST_SIZE,
        }
    }
}

impl RateLimiterConfig {
    /// Create a new rate limiter config
    pub fn new(replenish_interval: Duration, burst_size: u32) -> Self {
        Self {
            replenish_interval,
            burst_size,
        }
    }

    /// Allow `requests_per_second` permits per second with the given burst.
    ///
    /// Rates above one per nanosecond are clamped to a 1ns interval.
    pub fn per_second(requests_per_second: u32, burst_size: u32) -> Self {
        let interval = if requests_per_second == 0 {
            Duration::ZERO
        } else {
            (Duration::from_secs(1) / requests_per_second).max(Duration::from_nanos(1))
        };
        Self::new(interval, burst_size)
    }
}

/// Token bucket rate limiter
///
/// Clones share the same bucket, so handing one limiter to several fetches
/// throttles them together.
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
    config: RateLimiterConfig,
}

impl RateLimiter {
    /// Create a new rate limiter with the given config
    pub fn new(config: &RateLimiterConfig) -> Result<Self> {
        let burst = NonZeroU32::new(config.burst_size)
            .ok_or_else(|| Error::invalid_value("burst_size", "must be greater than zero"))?;
        let quota = Quota::with_period(config.replenish_interval)
            .ok_or_else(|| Error::invalid_value("replenish_interval", "must be non-zero"))?
            .allow_burst(burst);

        Ok(Self {
            limiter: Arc::new(Governor::direct(quota)),
            config: config.clone(),
        })
    }

    /// Create a rate limiter with the default interval and burst
    pub fn with_defaults() -> Result<Self> {
        Self::new(&RateLimiterConfig::default())
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Wait until a permit is available
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }

    /// Try to acquire a permit, returning immediately
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
