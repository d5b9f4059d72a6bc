//! Rate limit enforcement middleware.
//!
//! # Request Flow
//!
//! ```text
//! request ─► exempt path? ──yes──────────────────────────────► inner
//!                │ no
//!                ▼
//!          ClientKeyResolver::resolve
//!                │
//!                ▼
//!          RateLimiter::try_consume ──allowed──► inner ─► + X-RateLimit-* headers
//!                │ denied
//!                ▼
//!          429 + X-RateLimit-* + Retry-After + JSON body
//! ```
//!
//! The decision is made synchronously in [`Service::call`], before the inner
//! service is touched. Install this layer outermost so rejected requests cost
//! nothing downstream.
//!
//! # Response Headers
//!
//! Set on every non-exempt response, allowed or denied:
//! - `X-RateLimit-Limit`: bucket capacity
//! - `X-RateLimit-Remaining`: tokens left after this request
//! - `X-RateLimit-Reset`: Unix time (seconds) of the next expected refill
//!
//! On 429 only:
//! - `Retry-After`: seconds to wait
//!
//! # Failure Mode
//!
//! A limiter check cannot fail. Should it panic, the panic propagates and the
//! request is dropped; nothing here turns a fault into an admission.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::Json;
use axum::body::Body;
use axum::http::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use serde::Serialize;
use tower::{Layer, Service};
use tracing::{debug, warn};

use super::client_key::ClientKeyResolver;
use crate::limiter::{RateLimitDecision, RateLimiter};
use crate::metrics::{RequestOutcome, record_request_outcome};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// JSON body of a 429 response.
#[derive(Debug, Serialize)]
struct RateLimitExceeded {
    error: &'static str,
    message: String,
    #[serde(rename = "retryAfter")]
    retry_after: u64,
}

impl RateLimitExceeded {
    fn new(retry_after: u64) -> Self {
        Self {
            error: "Too Many Requests",
            message: format!("Rate limit exceeded. Please retry after {retry_after} seconds."),
            retry_after,
        }
    }
}

/// Tower layer enforcing per-client rate limits.
///
/// # Example
///
/// ```rust,ignore
/// let policy = BucketPolicy::new(100, 10, 1000)?;
/// let limiter = Arc::new(TokenBucketLimiter::new(policy));
/// let app = Router::new()
///     .route("/api", get(handler))
///     .layer(RateLimitLayer::new(limiter).with_exempt_prefixes(vec!["/health".into()]));
/// ```
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<dyn RateLimiter>,
    resolver: Arc<ClientKeyResolver>,
    exempt_prefixes: Arc<Vec<String>>,
}

impl RateLimitLayer {
    /// Layer with the default resolver and no exempt paths.
    pub fn new(limiter: Arc<dyn RateLimiter>) -> Self {
        Self {
            limiter,
            resolver: Arc::new(ClientKeyResolver::new()),
            exempt_prefixes: Arc::new(Vec::new()),
        }
    }

    pub fn with_resolver(mut self, resolver: ClientKeyResolver) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Paths starting with any of `prefixes` bypass the limiter entirely.
    pub fn with_exempt_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.exempt_prefixes = Arc::new(prefixes);
        self
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        is_exempt(&self.exempt_prefixes, path)
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: Arc::clone(&self.limiter),
            resolver: Arc::clone(&self.resolver),
            exempt_prefixes: Arc::clone(&self.exempt_prefixes),
        }
    }
}

/// Rate limiting service wrapper.
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: Arc<dyn RateLimiter>,
    resolver: Arc<ClientKeyResolver>,
    exempt_prefixes: Arc<Vec<String>>,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // Take the service that was driven to readiness, leave a clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        if is_exempt(&self.exempt_prefixes, req.uri().path()) {
            record_request_outcome(RequestOutcome::Exempt);
            return Box::pin(async move { inner.call(req).await });
        }

        let key = self.resolver.resolve(&req);
        let decision = self.limiter.try_consume(&key);

        if decision.allowed {
            record_request_outcome(RequestOutcome::Allowed);
            debug!(
                client = %key,
                remaining = decision.remaining,
                "Request admitted"
            );

            return Box::pin(async move {
                let mut response = inner.call(req).await?;
                apply_rate_limit_headers(response.headers_mut(), &decision);
                Ok(response)
            });
        }

        record_request_outcome(RequestOutcome::Denied);
        warn!(
            client = %key,
            path = %req.uri().path(),
            retry_after_secs = decision.retry_after_seconds,
            "Rate limit exceeded"
        );

        let response = too_many_requests(&decision);
        Box::pin(async move { Ok(response) })
    }
}

fn is_exempt(prefixes: &[String], path: &str) -> bool {
    prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
}

/// Write the `X-RateLimit-*` headers for `decision`.
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(
        X_RATELIMIT_RESET,
        HeaderValue::from(decision.reset_epoch_seconds),
    );
}

/// Build the 429 response for a denied decision.
fn too_many_requests(decision: &RateLimitDecision) -> Response<Body> {
    let retry_after = decision.retry_after_seconds;

    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(RateLimitExceeded::new(retry_after)),
    )
        .into_response();

    let headers = response.headers_mut();
    apply_rate_limit_headers(headers, decision);
    headers.insert(RETRY_AFTER, HeaderValue::from(retry_after));

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_exempt_prefix_matching() {
        let prefixes = vec!["/health".to_string(), "/actuator".to_string()];

        assert!(is_exempt(&prefixes, "/health"));
        assert!(is_exempt(&prefixes, "/actuator/metrics"));
        assert!(!is_exempt(&prefixes, "/api/health"));
        assert!(!is_exempt(&[], "/health"));
    }

    #[test]
    fn test_rejection_body_shape() {
        let body = serde_json::to_string(&RateLimitExceeded::new(3)).unwrap();
        assert_eq!(
            body,
            r#"{"error":"Too Many Requests","message":"Rate limit exceeded. Please retry after 3 seconds.","retryAfter":3}"#
        );
    }

    #[test]
    fn test_too_many_requests_headers() {
        let decision = RateLimitDecision::denied(100, 1_700_000_001, 2);
        let response = too_many_requests(&decision);

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let headers = response.headers();
        assert_eq!(headers["x-ratelimit-limit"], "100");
        assert_eq!(headers["x-ratelimit-remaining"], "0");
        assert_eq!(headers["x-ratelimit-reset"], "1700000001");
        assert_eq!(headers["retry-after"], "2");
        assert_eq!(headers["content-type"], "application/json");
    }

    #[test]
    fn test_apply_headers_overwrites_existing() {
        let mut headers = HeaderMap::new();
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from_static("stale"));

        apply_rate_limit_headers(&mut headers, &RateLimitDecision::allowed(10, 7, 5));

        assert_eq!(headers["x-ratelimit-limit"], "10");
        assert_eq!(headers["x-ratelimit-remaining"], "7");
        assert_eq!(headers["x-ratelimit-reset"], "5");
    }
}
