//! Rate-limited fetch
//!
//! One linear pass per call: validate the config, pick (or create) a rate
//! limiter, build a bodyless request, wait for a permit, send it through the
//! client's transport, classify the status, read the body. Any step failing
//! returns immediately; nothing is retried.

use super::client::Client;
use super::rate_limit::RateLimiter;
use super::transport::{BodyStream, TransportRequest, TransportResponse};
use crate::context::{FetchContext, FetchStage};
use crate::error::{Error, Result};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::{Method, StatusCode};
use tracing::{debug, trace};
use url::Url;

/// Statuses that fail a fetch. Anything else, 402 and 503 included, is handed
/// back to the caller as a body.
pub const CLASSIFIED_ERROR_STATUSES: [StatusCode; 6] = [
    StatusCode::BAD_REQUEST,
    StatusCode::UNAUTHORIZED,
    StatusCode::FORBIDDEN,
    StatusCode::NOT_FOUND,
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
];

/// Whether `status` is one of [`CLASSIFIED_ERROR_STATUSES`]
pub fn is_classified_error(status: StatusCode) -> bool {
    CLASSIFIED_ERROR_STATUSES.contains(&status)
}

/// Everything a single fetch needs.
///
/// `client`, `method` and `url` are required. When `rate_limiter` is unset a
/// fresh default limiter is created for each call, so only a limiter supplied
/// here throttles across calls.
#[derive(Debug, Clone, Default)]
pub struct FetchConfig<'a> {
    pub client: Option<&'a Client>,
    pub method: String,
    pub url: Option<Url>,
    pub rate_limiter: Option<RateLimiter>,
}

impl<'a> FetchConfig<'a> {
    /// Create an empty config
    pub fn new() -> Self {
        Self::default()
    }

    /// GET `url` through `client`
    pub fn get(client: &'a Client, url: Url) -> Self {
        Self::new().client(client).method("GET").url(url)
    }

    #[must_use]
    pub fn client(mut self, client: &'a Client) -> Self {
        self.client = Some(client);
        self
    }

    #[must_use]
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    #[must_use]
    pub fn url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    /// Parse and set the target URL
    pub fn parse_url(self, url: &str) -> Result<Self> {
        Ok(self.url(Url::parse(url)?))
    }

    /// Throttle through `limiter`; pass clones of one limiter to share a bucket
    #[must_use]
    pub fn rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Check the required fields, in order: client, method, url
    pub fn validate(&self) -> Result<(&'a Client, &str, &Url)> {
        let client = self.client.ok_or_else(|| Error::missing_field("client"))?;
        if self.method.is_empty() {
            return Err(Error::missing_field("method"));
        }
        let url = self.url.as_ref().ok_or_else(|| Error::missing_field("url"))?;
        Ok((client, &self.method, url))
    }
}

/// Build a bodyless request
pub fn build_request(method: &str, url: &Url) -> Result<TransportRequest> {
    let method = Method::from_bytes(method.as_bytes()).map_err(|_| Error::InvalidMethod {
        method: method.to_string(),
    })?;

    if url.cannot_be_a_base() {
        return Err(Error::InvalidRequestUrl {
            url: url.to_string(),
            message: "URL cannot be a base".to_string(),
        });
    }
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidRequestUrl {
            url: url.to_string(),
            message: format!("unsupported scheme '{}'", url.scheme()),
        });
    }

    Ok(TransportRequest {
        method,
        url: url.clone(),
    })
}

/// Perform one rate-limited request and return the raw response body.
///
/// Every suspension point (permit wait, send, body read) honours `ctx`; an
/// already cancelled or expired context returns before anything is sent.
pub async fn fetch(ctx: &FetchContext, config: &FetchConfig<'_>) -> Result<Bytes> {
    let (client, method, url) = config.validate()?;

    let limiter = match &config.rate_limiter {
        Some(limiter) => limiter.clone(),
        None => {
            trace!("no rate limiter supplied, using defaults");
            RateLimiter::with_defaults()?
        }
    };

    let request = build_request(method, url)?;

    ctx.guard(FetchStage::RateLimit, limiter.wait()).await?;
    trace!("rate limit permit acquired");

    debug!(method = %request.method, url = %request.url, "sending request");
    let response = ctx
        .guard(FetchStage::Send, client.transport().execute(request))
        .await?
        .map_err(|source| Error::NoResponse { source })?;

    let TransportResponse { status, body, .. } = response;
    debug!(status = status.as_u16(), "response received");

    if is_classified_error(status) {
        let body = ctx.guard(FetchStage::ReadBody, read_body(body)).await??;
        return Err(Error::HttpStatus {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown Status").to_string(),
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }

    let body = ctx.guard(FetchStage::ReadBody, read_body(body)).await??;
    debug!(bytes = body.len(), "response body read");
    Ok(body)
}

/// Drain the body stream. The stream is dropped when this returns.
async fn read_body(mut body: BodyStream) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|source| Error::BodyRead { source })?;
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

#[cfg(test)]
mod fetch_tests {
    use super::*;
    use crate::http::transport::{Transport, TransportResponse};
    use crate::error::TransportError;
    use async_trait::async_trait;
    use test_case::test_case;

    struct Unreachable;

    #[async_trait]
    impl Transport for Unreachable {
        async fn execute(
            &self,
            _request: TransportRequest,
        ) -> std::result::Result<TransportResponse, TransportError> {
            Err("unreachable".into())
        }
    }

    fn url() -> Url {
        Url::parse("http://example.test/items").unwrap()
    }

    #[test_case(400 ; "bad request")]
    #[test_case(401 ; "unauthorized")]
    #[test_case(403 ; "forbidden")]
    #[test_case(404 ; "not found")]
    #[test_case(429 ; "too many requests")]
    #[test_case(500 ; "internal server error")]
    fn test_classified_statuses(code: u16) {
        assert!(is_classified_error(StatusCode::from_u16(code).unwrap()));
    }

    #[test_case(200 ; "ok")]
    #[test_case(204 ; "no content")]
    #[test_case(301 ; "moved permanently")]
    #[test_case(402 ; "payment required")]
    #[test_case(405 ; "method not allowed")]
    #[test_case(502 ; "bad gateway")]
    #[test_case(503 ; "service unavailable")]
    fn test_unclassified_statuses(code: u16) {
        assert!(!is_classified_error(StatusCode::from_u16(code).unwrap()));
    }

    #[test]
    fn test_validate_reports_first_missing_field() {
        let client = Client::new(Unreachable);

        let err = FetchConfig::new().validate().unwrap_err();
        assert!(matches!(err, Error::MissingConfigField { field: "client" }));

        let err = FetchConfig::new().method("GET").url(url()).validate().unwrap_err();
        assert!(matches!(err, Error::MissingConfigField { field: "client" }));

        let err = FetchConfig::new().client(&client).url(url()).validate().unwrap_err();
        assert!(matches!(err, Error::MissingConfigField { field: "method" }));

        let err = FetchConfig::new().client(&client).method("GET").validate().unwrap_err();
        assert!(matches!(err, Error::MissingConfigField { field: "url" }));

        let config = FetchConfig::get(&client, url());
        let (_, method, target) = config.validate().unwrap();
        assert_eq!(method, "GET");
        assert_eq!(target, &url());
    }

    #[test]
    fn test_parse_url() {
        let config = FetchConfig::new().parse_url("https://example.test/a?b=c").unwrap();
        assert_eq!(config.url.unwrap().path(), "/a");

        let err = FetchConfig::new().parse_url("not a url").unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }

    #[test]
    fn test_build_request() {
        let request = build_request("DELETE", &url()).unwrap();
        assert_eq!(request.method, Method::DELETE);
        assert_eq!(request.url, url());
    }

    #[test]
    fn test_build_request_rejects_bad_method() {
        let err = build_request("GE T", &url()).unwrap_err();
        assert!(matches!(err, Error::InvalidMethod { method } if method == "GE T"));
    }

    #[test]
    fn test_build_request_rejects_non_http_urls() {
        let err = build_request("GET", &Url::parse("mailto:someone@example.test").unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequestUrl { .. }));

        let err = build_request("GET", &Url::parse("ftp://example.test/file").unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequestUrl { message, .. } if message.contains("ftp")));
    }
}
