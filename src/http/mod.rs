//! HTTP fetch module
//!
//! Provides a single rate-limited fetch over an injectable transport.
//!
//! # Features
//!
//! - **Injectable Transport**: `Transport` trait with a reqwest-backed adapter
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Status Classification**: A fixed set of HTTP statuses fail the fetch
//! - **Cancellation**: Every wait honours the caller's `FetchContext`

mod client;
mod fetch;
mod rate_limit;
mod transport;

pub use client::Client;
pub use fetch::{
    build_request, fetch, is_classified_error, FetchConfig, CLASSIFIED_ERROR_STATUSES,
};
pub use rate_limit::{
    RateLimiter, RateLimiterConfig, DEFAULT_BURST_SIZE, DEFAULT_REPLENISH_INTERVAL,
};
pub use transport::{
    BodyStream, ReqwestTransport, Transport, TransportConfig, TransportConfigBuilder,
    TransportRequest, TransportResponse,
};
