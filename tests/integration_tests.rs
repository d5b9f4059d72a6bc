//! End-to-end tests against a real server on an ephemeral port.
//!
//! The server is served with connect info, so unauthenticated requests
//! without `X-Forwarded-For` are keyed by the loopback peer address.
//!
//! Run with: `cargo test --test integration_tests`
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::net::TcpListener;

use tollgate::models::StatsResponse;
use tollgate::{AppState, Config, build_router};

/// Running server plus an HTTP client pointed at it.
struct TestServer {
    base_url: String,
    client: Client,
    state: AppState,
}

impl TestServer {
    async fn start(config: Config) -> Self {
        let state = AppState::new(config).expect("valid config");
        let app = build_router(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to ephemeral port");
        let addr = listener.local_addr().expect("Failed to get local address");

        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("Server failed");
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: format!("http://{addr}"),
            client,
            state,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn small_budget(capacity: u32) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        rate_limit_capacity: capacity,
        rate_limit_refill_rate: 1,
        // long interval so nothing refills during a test
        rate_limit_refill_interval_ms: 60_000,
        bucket_sweep_interval: Duration::ZERO,
        ..Config::default()
    }
}

fn header<'a>(response: &'a reqwest::Response, name: &str) -> &'a str {
    response
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("missing header {name}"))
        .to_str()
        .unwrap()
}

#[tokio::test]
async fn test_rate_limit_headers_on_allowed_requests() {
    let server = TestServer::start(small_budget(3)).await;

    for expected_remaining in ["2", "1", "0"] {
        let response = server.client.get(server.url("/api/ping")).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "x-ratelimit-limit"), "3");
        assert_eq!(header(&response, "x-ratelimit-remaining"), expected_remaining);
        assert!(header(&response, "x-ratelimit-reset").parse::<u64>().unwrap() > 0);
    }
}

#[tokio::test]
async fn test_rejected_request_contract() {
    let server = TestServer::start(small_budget(1)).await;

    let first = server.client.get(server.url("/api/ping")).send().await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let response = server.client.get(server.url("/api/ping")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(header(&response, "x-ratelimit-limit"), "1");
    assert_eq!(header(&response, "x-ratelimit-remaining"), "0");

    let retry_after: u64 = header(&response, "retry-after").parse().unwrap();
    assert!(retry_after >= 1);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Too Many Requests");
    assert_eq!(body["retryAfter"], retry_after);
    assert_eq!(
        body["message"],
        format!("Rate limit exceeded. Please retry after {retry_after} seconds.")
    );
}

#[tokio::test]
async fn test_forwarded_clients_limited_separately() {
    let server = TestServer::start(small_budget(1)).await;

    let send = |xff: &'static str| {
        server
            .client
            .get(server.url("/api/ping"))
            .header("x-forwarded-for", xff)
            .send()
    };

    assert_eq!(send("1.2.3.4, 10.0.0.1").await.unwrap().status(), StatusCode::OK);
    assert_eq!(
        send("1.2.3.4").await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(send("5.6.7.8").await.unwrap().status(), StatusCode::OK);
}

#[tokio::test]
async fn test_bearer_identity_ignores_forwarded_for() {
    let server = TestServer::start(small_budget(1)).await;

    let as_user = |xff: &'static str| {
        server
            .client
            .get(server.url("/api/ping"))
            .bearer_auth("token-shared-by-two-proxies")
            .header("x-forwarded-for", xff)
            .send()
    };

    assert_eq!(as_user("1.1.1.1").await.unwrap().status(), StatusCode::OK);
    // same token from a different address shares the bucket
    assert_eq!(
        as_user("2.2.2.2").await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS
    );
}

#[tokio::test]
async fn test_health_is_exempt() {
    let server = TestServer::start(small_budget(1)).await;

    for _ in 0..5 {
        let response = server.client.get(server.url("/health")).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-ratelimit-limit").is_none());
    }

    assert_eq!(server.state.tracked_clients(), 0);
}

#[tokio::test]
async fn test_stats_endpoint() {
    let server = TestServer::start(small_budget(10)).await;

    server
        .client
        .get(server.url("/api/ping"))
        .header("x-forwarded-for", "9.9.9.9")
        .send()
        .await
        .unwrap();

    let stats: StatsResponse = server
        .client
        .get(server.url("/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(stats.rate_limiting_enabled);
    // 9.9.9.9 plus the loopback peer that asked for /stats
    assert_eq!(stats.tracked_clients, 2);
    assert_eq!(stats.capacity, 10);
    assert_eq!(stats.refill_interval_ms, 60_000);
}

#[tokio::test]
async fn test_disabled_limiter_passes_everything() {
    let server = TestServer::start(small_budget(0)).await;

    for _ in 0..20 {
        let response = server.client.get(server.url("/api/ping")).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-ratelimit-limit").is_none());
    }
}
