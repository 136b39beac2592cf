//! End-to-end tests against a mock HTTP server.

use fetchkit_http_client::{
    CancellationToken, CircuitBreakerConfig, CircuitState, EndpointKey, ErrorKind, HttpClient,
    HttpClientConfig, HttpClientError, Response, RetryOptions, StatusCode, StatusValidator,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, retry: RetryOptions) -> HttpClient {
    let config = HttpClientConfig::builder()
        .base_url(server.uri())
        .retry(retry)
        .build();
    assert_ok!(HttpClient::new(config))
}

#[tokio::test]
async fn retries_transient_status_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, RetryOptions::fixed(3, Duration::from_millis(10)));
    let response = assert_ok!(client.get("/flaky").send().await);

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().unwrap(), "ok");
}

#[tokio::test]
async fn client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such item"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, RetryOptions::fixed(3, Duration::from_millis(10)));
    let err = assert_err!(client.get("/missing").send().await);

    assert_eq!(err.kind(), ErrorKind::ClientOrFatal);
    assert_eq!(err.status_code(), Some(StatusCode::NOT_FOUND));
    match err {
        HttpClientError::Status { message, .. } => assert_eq!(message, "no such item"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn exhausted_retries_report_attempts_and_last_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let client = client(&server, RetryOptions::exponential(2, Duration::from_millis(5)));
    let err = assert_err!(client.get("/down").send().await);

    assert_eq!(err.kind(), ErrorKind::RetriesExhausted);
    assert_eq!(err.status_code(), Some(StatusCode::BAD_GATEWAY));
    assert!(matches!(err, HttpClientError::RetriesExhausted { attempts: 3, .. }));
    assert!(std::error::Error::source(&err).is_some());
}

#[tokio::test]
async fn single_attempt_returns_bare_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, RetryOptions::exponential(3, Duration::from_millis(5)));
    let err = assert_err!(client.get("/busy").no_retry().send().await);

    assert_eq!(err.kind(), ErrorKind::ServerTransient);
    assert!(matches!(err, HttpClientError::Status { .. }));
}

#[tokio::test]
async fn circuit_opens_and_rejects_without_calling_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/unstable"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let config = HttpClientConfig::builder()
        .base_url(server.uri())
        .retry(RetryOptions::fixed(1, Duration::from_millis(5)).with_circuit_breaker(true))
        .circuit_breaker(CircuitBreakerConfig::new(2, Duration::from_secs(60)))
        .build();
    let client = assert_ok!(HttpClient::new(config));

    let first = assert_err!(client.get("/unstable").send().await);
    assert!(matches!(first, HttpClientError::RetriesExhausted { attempts: 2, .. }));

    let second = assert_err!(client.get("/unstable").send().await);
    assert!(second.is_circuit_open());
    assert_eq!(second.kind(), ErrorKind::CircuitOpen);

    let endpoint = EndpointKey::new(format!("GET {}/unstable", server.uri()));
    assert_eq!(client.breakers().state(&endpoint), Some(CircuitState::Open));

    let stats = client.breakers().stats(&endpoint).unwrap();
    assert_eq!(stats.total_failures, 2);
    assert_eq!(stats.total_rejections, 1);
}

#[tokio::test]
async fn breakers_are_per_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bad"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/good"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = HttpClientConfig::builder()
        .base_url(server.uri())
        .retry(RetryOptions::none().with_circuit_breaker(true))
        .circuit_breaker(CircuitBreakerConfig::new(1, Duration::from_secs(60)))
        .build();
    let client = assert_ok!(HttpClient::new(config));

    assert_err!(client.get("/bad").send().await);
    let rejected = assert_err!(client.get("/bad").send().await);
    assert!(rejected.is_circuit_open());

    assert_ok!(client.get("/good").send().await);
    assert_eq!(client.breakers().len(), 2);
}

#[tokio::test]
async fn custom_validator_accepts_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, RetryOptions::fixed(3, Duration::from_millis(5)));
    let response = assert_ok!(
        client
            .get("/maybe")
            .status_validator(StatusValidator::new(|s| {
                s.is_success() || s == StatusCode::NOT_FOUND
            }))
            .send()
            .await
    );

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn json_body_is_replayed_on_retry() {
    let server = MockServer::start().await;
    let order = json!({"item": "widget", "quantity": 5});
    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(body_json(&order))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(body_json(&order))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 42})))
        .expect(1)
        .mount(&server)
        .await;

    #[derive(Deserialize)]
    struct Created {
        id: u64,
    }

    let client = client(&server, RetryOptions::fixed(2, Duration::from_millis(5)));
    let created: Created = assert_ok!(client.post("/orders").json(&order).send_json().await);

    assert_eq!(created.id, 42);
}

#[tokio::test]
async fn base_url_prefix_and_query_are_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/items"))
        .and(query_param("page", "2"))
        .and(query_param("sort", "name"))
        .and(header("x-api-key", "secret"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = HttpClientConfig::builder()
        .base_url(format!("{}/v1/", server.uri()))
        .default_header("X-Api-Key", "secret")
        .build();
    let client = assert_ok!(HttpClient::new(config));

    assert_ok!(
        client
            .get("/items")
            .queries([("page", "2"), ("sort", "name")])
            .send()
            .await
    );
}

#[tokio::test]
async fn interceptors_run_on_every_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("x-attempt-tag", "fetchkit"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header("x-attempt-tag", "fetchkit"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let sent = Arc::new(AtomicU32::new(0));
    let received = Arc::new(AtomicU32::new(0));
    let sent_counter = Arc::clone(&sent);
    let received_counter = Arc::clone(&received);

    let client = client(&server, RetryOptions::fixed(2, Duration::from_millis(5)))
        .with_request_interceptor(
            move |mut req: reqwest::Request| -> fetchkit_http_client::Result<reqwest::Request> {
                sent_counter.fetch_add(1, Ordering::SeqCst);
                req.headers_mut()
                    .insert("x-attempt-tag", "fetchkit".parse().unwrap());
                Ok(req)
            },
        )
        .with_response_interceptor(
            move |resp: Response| -> fetchkit_http_client::Result<Response> {
                received_counter.fetch_add(1, Ordering::SeqCst);
                Ok(resp)
            },
        );

    assert_ok!(client.get("/tagged").send().await);
    assert_eq!(sent.load(Ordering::SeqCst), 2);
    assert_eq!(received.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn slow_attempt_times_out_and_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fast"))
        .mount(&server)
        .await;

    let client = client(&server, RetryOptions::fixed(2, Duration::from_millis(5)));
    let response = assert_ok!(
        client
            .get("/slow")
            .timeout(Duration::from_millis(200))
            .send()
            .await
    );

    assert_eq!(response.text().unwrap(), "fast");
}

#[tokio::test]
async fn attempt_timeout_is_reported_with_its_duration() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let client = client(&server, RetryOptions::none());
    let err = assert_err!(
        client
            .get("/slow")
            .timeout(Duration::from_millis(200))
            .send()
            .await
    );

    assert!(err.is_timeout());
    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(matches!(err, HttpClientError::Timeout(d) if d == Duration::from_millis(200)));
}

#[tokio::test]
async fn refused_connection_is_retried_then_opens_breaker() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let config = HttpClientConfig::builder()
        .base_url(format!("http://127.0.0.1:{port}"))
        .retry(RetryOptions::fixed(2, Duration::from_millis(5)).with_circuit_breaker(true))
        .circuit_breaker(CircuitBreakerConfig::new(3, Duration::from_secs(60)))
        .build();
    let client = assert_ok!(HttpClient::new(config));

    let err = assert_err!(client.get("/health").send().await);

    assert!(matches!(err, HttpClientError::RetriesExhausted { attempts: 3, .. }));
    assert!(err.last_error().is_connection());
    assert_eq!(err.last_error().kind(), ErrorKind::Network);

    let endpoint = EndpointKey::new(format!("GET http://127.0.0.1:{port}/health"));
    assert_eq!(client.breakers().state(&endpoint), Some(CircuitState::Open));

    let rejected = assert_err!(client.get("/health").send().await);
    assert!(rejected.is_circuit_open());
}

#[tokio::test]
async fn cancellation_interrupts_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client(&server, RetryOptions::fixed(5, Duration::from_secs(10)));
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let err = assert_err!(client.get("/busy").cancel_on(token).send().await);

    assert!(matches!(err, HttpClientError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn total_timeout_bounds_the_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let config = HttpClientConfig::builder()
        .base_url(server.uri())
        .retry(RetryOptions::fixed(3, Duration::from_millis(5)))
        .total_timeout(Duration::from_millis(300))
        .build();
    let client = assert_ok!(HttpClient::new(config));

    let started = Instant::now();
    let err = assert_err!(client.get("/stuck").send().await);

    assert!(matches!(err, HttpClientError::DeadlineExceeded));
    assert!(err.is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(3));
}
