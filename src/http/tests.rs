//! Tests for the HTTP client module

use super::*;
use crate::auth::AuthConfig;
use crate::error::Error;
use crate::types::BackoffType;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_config(base_url: &str) -> HttpClientConfig {
    HttpClientConfig::builder()
        .base_url(base_url)
        .backoff(
            BackoffType::Constant,
            Duration::from_millis(10),
            Duration::from_secs(1),
        )
        .jitter(false)
        .build()
}

#[test]
fn test_http_client_config_default() {
    let config = HttpClientConfig::default();
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert_eq!(config.max_attempts, 5);
    assert!(config.jitter);
    assert!(config.base_url.is_none());
    assert!(config.rate_limit.is_none());
    assert!(config.user_agent.starts_with("tap-cj/"));
}

#[test]
fn test_invalid_base_url_rejected() {
    let config = HttpClientConfig::builder().base_url("not a url").build();
    assert!(matches!(
        HttpClient::with_config(config).unwrap_err(),
        Error::InvalidUrl(_)
    ));
}

#[test]
fn test_http_client_config_builder() {
    let config = HttpClientConfig::builder()
        .base_url("https://commissions.api.cj.com")
        .timeout(Duration::from_secs(60))
        .max_attempts(3)
        .backoff(
            BackoffType::Linear,
            Duration::from_millis(200),
            Duration::from_secs(30),
        )
        .max_throttle_wait(Duration::from_secs(5))
        .rate_limit(RateLimiterConfig::per_second(2))
        .header("X-Custom", "value")
        .user_agent("test-agent/1.0")
        .build();

    assert_eq!(
        config.base_url.as_deref(),
        Some("https://commissions.api.cj.com")
    );
    assert_eq!(config.timeout, Duration::from_secs(60));
    assert_eq!(config.max_attempts, 3);
    assert_eq!(config.backoff_type, BackoffType::Linear);
    assert_eq!(config.initial_backoff, Duration::from_millis(200));
    assert_eq!(config.max_backoff, Duration::from_secs(30));
    assert_eq!(config.max_throttle_wait, Duration::from_secs(5));
    assert_eq!(config.rate_limit, Some(RateLimiterConfig::new(2, 2)));
    assert_eq!(
        config.default_headers.get("X-Custom"),
        Some(&"value".to_string())
    );
    assert_eq!(config.user_agent, "test-agent/1.0");
}

#[test]
fn test_api_request_builder() {
    let request = ApiRequest::get("/records")
        .query("offset", "0")
        .query("limit", "10")
        .query("offset", "20")
        .header("X-Request-Id", "abc123")
        .json(json!({"key": "value"}));

    assert_eq!(
        request.query,
        vec![
            ("offset".to_string(), "20".to_string()),
            ("limit".to_string(), "10".to_string()),
        ]
    );
    assert_eq!(
        request.headers.get("X-Request-Id"),
        Some(&"abc123".to_string())
    );
    assert_eq!(request.body, Some(json!({"key": "value"})));
}

#[tokio::test]
async fn test_execute_get_parses_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/items"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": 1}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(&mock_server.uri())).unwrap();
    let mut budget = RateBudget::new();
    let response = client
        .execute(&ApiRequest::get("/api/items").query("page", "2"), &mut budget)
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.attempts, 1);
    assert_eq!(response.body["items"][0]["id"], 1);
}

#[tokio::test]
async fn test_execute_post_graphql_with_bearer() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .and(header("authorization", "Bearer secret-token"))
        .and(header("user-agent", "tap-cj-test"))
        .and(body_json(json!({"query": "{ ping }"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"ping": "pong"}})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = fast_config(&mock_server.uri());
    config.user_agent = "tap-cj-test".to_string();
    let client = HttpClient::with_auth(config, AuthConfig::bearer("secret-token")).unwrap();

    let request = ApiRequest::post("/query").json(json!({"query": "{ ping }"}));
    let response = client
        .execute(&request, &mut RateBudget::new())
        .await
        .unwrap();

    assert_eq!(response.body["data"]["ping"], "pong");
}

#[tokio::test]
async fn test_execute_empty_body_is_null() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(&mock_server.uri())).unwrap();
    let response = client
        .execute(&ApiRequest::get("/"), &mut RateBudget::new())
        .await
        .unwrap();

    assert_eq!(response.body, serde_json::Value::Null);
}

#[tokio::test]
async fn test_execute_invalid_json_is_decode_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(&mock_server.uri())).unwrap();
    let err = client
        .execute(&ApiRequest::get("/"), &mut RateBudget::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Decode { .. }));
}

#[tokio::test]
async fn test_execute_404_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not found"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(&mock_server.uri())).unwrap();
    let err = client
        .execute(&ApiRequest::get("/api/missing"), &mut RateBudget::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::HttpStatus { status: 404, .. }));
}

#[tokio::test]
async fn test_execute_retries_500_then_succeeds() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(&mock_server.uri())).unwrap();
    let response = client
        .execute(&ApiRequest::get("/api/flaky"), &mut RateBudget::new())
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.attempts, 3);
}

#[tokio::test]
async fn test_execute_429_honors_retry_after() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/limited"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "1")
                .set_body_string("Rate limited"),
        )
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/limited"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ratelimit-limit", "100")
                .insert_header("x-ratelimit-remaining", "99")
                .set_body_json(json!({"ok": true})),
        )
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(&mock_server.uri())).unwrap();
    let mut budget = RateBudget::new();
    let started = Instant::now();
    let response = client
        .execute(&ApiRequest::get("/api/limited"), &mut budget)
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(response.attempts, 2);
    assert_eq!(budget.limit, Some(100));
    assert_eq!(budget.remaining, Some(99));
    assert!(budget.retry_after.is_none());
}

#[tokio::test]
async fn test_execute_gives_up_after_max_attempts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/always-limited"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&mock_server)
        .await;

    let mut config = fast_config(&mock_server.uri());
    config.max_attempts = 3;
    let client = HttpClient::with_config(config).unwrap();
    let err = client
        .execute(&ApiRequest::get("/api/always-limited"), &mut RateBudget::new())
        .await
        .unwrap_err();

    match err {
        Error::RetriesExhausted {
            attempts,
            last_error,
        } => {
            assert_eq!(attempts, 3);
            assert!(last_error.contains("Rate limited"));
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
}

/// Accept connections, read the request, write `reply` and hang up
async fn hang_up_after(reply: &'static [u8]) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepts = Arc::new(AtomicUsize::new(0));
    let counter = accepts.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let mut buf = [0_u8; 4096];
            let _ = socket.read(&mut buf).await;
            let _ = socket.write_all(reply).await;
        }
    });
    (format!("http://{addr}"), accepts)
}

#[tokio::test]
async fn test_execute_retries_dropped_connection() {
    let (base_url, accepts) = hang_up_after(b"").await;
    let mut config = fast_config(&base_url);
    config.max_attempts = 3;
    let client = HttpClient::with_config(config).unwrap();

    let err = client
        .execute(&ApiRequest::get("/api/items"), &mut RateBudget::new())
        .await
        .unwrap_err();

    assert!(
        matches!(err, Error::RetriesExhausted { attempts: 3, .. }),
        "unexpected error {err:?}"
    );
    assert_eq!(accepts.load(Ordering::SeqCst), 3);

    let dropped = reqwest::get(format!("{base_url}/api/items")).await.unwrap_err();
    assert!(Error::Http(dropped).is_retryable());
}

#[tokio::test]
async fn test_execute_retries_truncated_body() {
    let (base_url, accepts) = hang_up_after(
        b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 64\r\n\r\n{\"data\": [",
    )
    .await;
    let mut config = fast_config(&base_url);
    config.max_attempts = 2;
    let client = HttpClient::with_config(config).unwrap();

    let err = client
        .execute(&ApiRequest::get("/api/items"), &mut RateBudget::new())
        .await
        .unwrap_err();

    assert!(
        matches!(err, Error::RetriesExhausted { attempts: 2, .. }),
        "unexpected error {err:?}"
    );
    assert_eq!(accepts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_execute_waits_for_exhausted_budget() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(&mock_server.uri())).unwrap();
    let mut budget = RateBudget {
        limit: Some(10),
        remaining: Some(0),
        reset_at: Some(chrono::Utc::now() + chrono::Duration::milliseconds(600)),
        retry_after: None,
    };

    let started = Instant::now();
    client
        .execute(&ApiRequest::get("/"), &mut budget)
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_millis(400));
    assert!(!budget.is_exhausted());
}

#[tokio::test]
async fn test_execute_full_url_without_base() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/test"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let client = HttpClient::new().unwrap();
    let response = client
        .execute(
            &ApiRequest::get(format!("{}/api/test", mock_server.uri())),
            &mut RateBudget::new(),
        )
        .await
        .unwrap();
    assert_eq!(response.status, 200);
}

#[test]
fn test_calculate_backoff_constant() {
    let config = HttpClientConfig::builder()
        .backoff(
            BackoffType::Constant,
            Duration::from_millis(100),
            Duration::from_secs(10),
        )
        .build();

    let client = HttpClient::with_config(config).unwrap();

    assert_eq!(client.calculate_backoff(0), Duration::from_millis(100));
    assert_eq!(client.calculate_backoff(5), Duration::from_millis(100));
}

#[test]
fn test_calculate_backoff_linear() {
    let config = HttpClientConfig::builder()
        .backoff(
            BackoffType::Linear,
            Duration::from_millis(100),
            Duration::from_secs(10),
        )
        .build();

    let client = HttpClient::with_config(config).unwrap();

    assert_eq!(client.calculate_backoff(0), Duration::from_millis(100));
    assert_eq!(client.calculate_backoff(1), Duration::from_millis(200));
    assert_eq!(client.calculate_backoff(2), Duration::from_millis(300));
}

#[test]
fn test_calculate_backoff_exponential_capped() {
    let config = HttpClientConfig::builder()
        .backoff(
            BackoffType::Exponential,
            Duration::from_millis(100),
            Duration::from_millis(500),
        )
        .build();

    let client = HttpClient::with_config(config).unwrap();

    assert_eq!(client.calculate_backoff(0), Duration::from_millis(100));
    assert_eq!(client.calculate_backoff(1), Duration::from_millis(200));
    assert_eq!(client.calculate_backoff(2), Duration::from_millis(400));
    assert_eq!(client.calculate_backoff(3), Duration::from_millis(500));
    assert_eq!(client.calculate_backoff(40), Duration::from_millis(500));
}

#[test]
fn test_jitter_stays_within_quarter() {
    let base = Duration::from_millis(1000);
    for _ in 0..100 {
        let jittered = super::client::apply_jitter(base);
        assert!(jittered >= Duration::from_millis(750));
        assert!(jittered <= Duration::from_millis(1250));
    }
}

#[test]
fn test_http_client_debug_hides_token() {
    let client = HttpClient::with_auth(
        HttpClientConfig::default(),
        AuthConfig::bearer("very-secret"),
    )
    .unwrap();
    let debug_str = format!("{client:?}");
    assert!(debug_str.contains("HttpClient"));
    assert!(!debug_str.contains("very-secret"));
}

#[tokio::test]
async fn test_http_client_with_rate_limiter() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/data"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&mock_server)
        .await;

    let config = HttpClientConfig::builder()
        .base_url(mock_server.uri())
        .rate_limit(RateLimiterConfig::new(100, 10))
        .build();

    let client = HttpClient::with_config(config).unwrap();
    assert!(client.has_rate_limiter());

    let mut budget = RateBudget::new();
    for _ in 0..3 {
        let response = client
            .execute(&ApiRequest::get("/api/data"), &mut budget)
            .await
            .unwrap();
        assert_eq!(response.status, 200);
    }
}
