//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │  Rate Limiting   │ ← 429 if exceeded (exempt prefixes skip it)
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response logging
//! └────────┬─────────┘
//!          │
//!          ▼
//!      Handler
//! ```
//!
//! Rate limiting is the outermost layer so rejected requests never reach
//! tracing spans or handlers.
//!
//! # Serving
//!
//! Peer-address keys need connection info:
//!
//! ```rust,ignore
//! axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
//! ```

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers;
use crate::middleware::{ClientKeyResolver, RateLimitLayer, TrustedProxies};
use crate::state::AppState;

/// Build the application router with all routes and middleware configured.
///
/// Rate limiting is applied when `state.limiter` is present, using the
/// exempt prefixes and trusted proxies from `state.config`.
pub fn build_router(state: AppState) -> Router {
    let config = &state.config;

    let mut router = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/stats", get(handlers::stats))
        .route("/api/ping", get(handlers::ping))
        .layer(TraceLayer::new_for_http());

    match &state.limiter {
        Some(limiter) => {
            let policy = limiter.policy();
            info!(
                capacity = policy.capacity(),
                refill_rate = policy.refill_rate(),
                refill_interval_ms = policy.refill_interval_ms(),
                exempt_paths = ?config.rate_limit_exempt_paths,
                trusted_proxies = config.trusted_proxies.len(),
                "Rate limiting enabled"
            );

            let resolver =
                ClientKeyResolver::with_trusted_proxies(TrustedProxies::new(&config.trusted_proxies));
            router = router.layer(
                RateLimitLayer::new(limiter.clone())
                    .with_resolver(resolver)
                    .with_exempt_prefixes(config.rate_limit_exempt_paths.clone()),
            );
        }
        None => info!("Rate limiting disabled (RATE_LIMIT_CAPACITY=0)"),
    }

    router.with_state(state)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::extract::ConnectInfo;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::limiter::{BucketPolicy, ManualClock, TokenBucketLimiter};

    const START_MS: i64 = 1_700_000_000_000;

    fn app(capacity: u32) -> (Router, Arc<TokenBucketLimiter>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(START_MS));
        let policy = BucketPolicy::new(capacity, 1, 1000).unwrap();
        let limiter = Arc::new(TokenBucketLimiter::with_clock(policy, clock.clone()));
        let config = Config {
            rate_limit_capacity: capacity,
            rate_limit_refill_rate: 1,
            bucket_sweep_interval: std::time::Duration::ZERO,
            ..Config::default()
        };
        let state = AppState::with_limiter(config, limiter.clone());
        (build_router(state), limiter, clock)
    }

    fn get_from(path: &str, peer: &str) -> Request<Body> {
        let addr: SocketAddr = peer.parse().unwrap();
        let mut req = Request::builder().uri(path).body(Body::empty()).unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        req
    }

    #[tokio::test]
    async fn test_allowed_response_carries_headers() {
        let (app, _, _) = app(3);

        let response = app.oneshot(get_from("/api/ping", "10.0.0.1:1000")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers["x-ratelimit-limit"], "3");
        assert_eq!(headers["x-ratelimit-remaining"], "2");
        assert_eq!(
            headers["x-ratelimit-reset"],
            ((START_MS + 1000) / 1000).to_string().as_str()
        );
        assert!(headers.get("retry-after").is_none());
    }

    #[tokio::test]
    async fn test_exhausted_client_gets_429() {
        let (app, _, _) = app(2);

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(get_from("/api/ping", "10.0.0.1:1000"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.oneshot(get_from("/api/ping", "10.0.0.1:1000")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let headers = response.headers();
        assert_eq!(headers["x-ratelimit-limit"], "2");
        assert_eq!(headers["x-ratelimit-remaining"], "0");
        assert_eq!(headers["retry-after"], "1");
        assert_eq!(headers["content-type"], "application/json");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(
            body,
            r#"{"error":"Too Many Requests","message":"Rate limit exceeded. Please retry after 1 seconds.","retryAfter":1}"#
        );
    }

    #[tokio::test]
    async fn test_denied_client_recovers_after_interval() {
        let (app, _, clock) = app(1);

        app.clone()
            .oneshot(get_from("/api/ping", "10.0.0.1:1000"))
            .await
            .unwrap();
        let denied = app
            .clone()
            .oneshot(get_from("/api/ping", "10.0.0.1:1000"))
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);

        clock.advance(1500);
        let allowed = app.oneshot(get_from("/api/ping", "10.0.0.1:1000")).await.unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);
        assert_eq!(allowed.headers()["x-ratelimit-remaining"], "0");
    }

    #[tokio::test]
    async fn test_clients_are_limited_independently() {
        let (app, _, _) = app(1);

        app.clone()
            .oneshot(get_from("/api/ping", "10.0.0.1:1000"))
            .await
            .unwrap();

        let other = app.oneshot(get_from("/api/ping", "10.0.0.2:1000")).await.unwrap();
        assert_eq!(other.status(), StatusCode::OK);
        assert_eq!(other.headers()["x-ratelimit-remaining"], "0");
    }

    #[tokio::test]
    async fn test_exempt_path_never_touches_limiter() {
        let (app, limiter, _) = app(1);

        for _ in 0..5 {
            let response = app
                .clone()
                .oneshot(get_from("/health", "10.0.0.1:1000"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(response.headers().get("x-ratelimit-limit").is_none());
        }

        assert_eq!(limiter.tracked_keys(), 0);
        assert!(!limiter.store().contains_key("ip:10.0.0.1"));
    }

    #[tokio::test]
    async fn test_bearer_clients_bucketed_by_token() {
        let (app, limiter, _) = app(5);

        let req = Request::builder()
            .uri("/api/ping")
            .header("authorization", "Bearer token-a")
            .header("x-forwarded-for", "1.2.3.4")
            .body(Body::empty())
            .unwrap();
        app.oneshot(req).await.unwrap();

        assert!(limiter.store().contains_key("user:token-a"));
        assert!(!limiter.store().contains_key("ip:1.2.3.4"));
    }

    #[tokio::test]
    async fn test_disabled_rate_limiting_adds_no_headers() {
        let config = Config {
            rate_limit_capacity: 0,
            ..Config::default()
        };
        let state = AppState::new(config).unwrap();
        let app = build_router(state);

        let response = app.oneshot(get_from("/api/ping", "10.0.0.1:1000")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-ratelimit-limit").is_none());
    }

    #[tokio::test]
    async fn test_stats_reports_tracked_clients() {
        let (app, _, _) = app(10);

        app.clone()
            .oneshot(get_from("/api/ping", "10.0.0.1:1000"))
            .await
            .unwrap();
        let response = app.oneshot(get_from("/stats", "10.0.0.2:1000")).await.unwrap();

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let stats: serde_json::Value = serde_json::from_slice(&body).unwrap();
        // the /stats request itself is rate limited and counted
        assert_eq!(stats["tracked_clients"], 2);
        assert_eq!(stats["capacity"], 10);
        assert_eq!(stats["rate_limiting_enabled"], true);
    }
}
