#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

//! # throttled-fetch
//!
//! A minimal outbound HTTP helper: one bodyless request, throttled by a token
//! bucket, sent over an injectable transport, with a fixed set of error
//! statuses turned into errors.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use throttled_fetch::http::{fetch, Client, FetchConfig, TransportConfig};
//! use throttled_fetch::{FetchContext, Result};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Client::reqwest(&TransportConfig::default())?;
//!     let config = FetchConfig::new()
//!         .client(&client)
//!         .method("GET")
//!         .parse_url("https://api.example.com/status")?;
//!
//!     let ctx = FetchContext::background().with_timeout(Duration::from_secs(10));
//!     let body = fetch(&ctx, &config).await?;
//!     println!("{}", String::from_utf8_lossy(&body));
//!     Ok(())
//! }
//! ```
//!
//! ## Pipeline
//!
//! ```text
//! validate ─▶ limiter ─▶ build ─▶ wait permit ─▶ send ─▶ classify ─▶ read body
//!                                   (ctx)        (ctx)                (ctx)
//! ```

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Cancellation and deadlines
pub mod context;

/// Transport, rate limiting and the fetch operation
pub mod http;

// ============================================================================
// Re-exports
// ============================================================================

pub use context::{CancelToken, FetchContext, FetchStage};
pub use error::{Error, Result};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
