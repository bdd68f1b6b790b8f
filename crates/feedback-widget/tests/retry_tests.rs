//! Retry behaviour against a live HTTP server

mod common;

use assert_matches::assert_matches;
use common::{
    fast_policy,
    host,
    http_client,
    submission,
};
use feedback_widget::{
    AttemptError,
    HttpTransport,
    RetryNotice,
    RetryPolicy,
    SubmissionClient,
};
use serde_json::json;
use std::{
    net::TcpListener,
    time::Duration,
};
use wiremock::{
    Mock,
    MockServer,
    ResponseTemplate,
    matchers::{
        method,
        path,
    },
};

fn endpoint(server: &MockServer) -> String {
    format!("{}/submit_comment", server.uri())
}

#[tokio::test]
async fn test_recovers_after_transient_server_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/submit_comment"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/submit_comment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = http_client(&endpoint(&mock_server), fast_policy());
    let mut notices = Vec::new();
    let response = client
        .submit_with(&submission("Flaky backend"), |notice| notices.push(notice))
        .await
        .expect("third attempt should succeed");

    assert_eq!(response, json!({ "status": "ok" }));
    assert_eq!(
        notices,
        vec![
            RetryNotice {
                attempt: 1,
                max_attempts: 3,
                delay: Duration::from_millis(10),
            },
            RetryNotice {
                attempt: 2,
                max_attempts: 3,
                delay: Duration::from_millis(20),
            },
        ]
    );
}

#[tokio::test]
async fn test_gateway_timeout_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(504))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 3 })))
        .mount(&mock_server)
        .await;

    let client = http_client(&endpoint(&mock_server), fast_policy());
    let response = client.submit(&submission("Proxy hiccup")).await.unwrap();

    assert_eq!(response["id"], 3);
}

#[tokio::test]
async fn test_unauthorized_fails_immediately() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = http_client(&endpoint(&mock_server), fast_policy());
    let failure = client.submit(&submission("Locked out")).await.unwrap_err();

    assert_eq!(failure.error, AttemptError::Http { status: 401 });
    assert_eq!(
        failure.user_message(),
        "Invalid request. Please check your input and try again."
    );
}

#[tokio::test]
async fn test_slow_backend_times_out_and_retries() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "ok" }))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let transport =
        HttpTransport::with_timeout(&endpoint(&mock_server), &host(), Duration::from_millis(50))
            .unwrap();
    let policy = RetryPolicy {
        max_retries: 1,
        delays: vec![Duration::from_millis(10)],
    };
    let client = SubmissionClient::with_transport(transport, policy);

    let failure = client.submit(&submission("Too slow")).await.unwrap_err();

    assert_eq!(failure.error, AttemptError::Timeout);
    assert_eq!(failure.attempts, 2);
    assert_eq!(
        failure.to_string(),
        "Request timed out after 2 attempts. Please check your connection and try again."
    );
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    // Reserve a port, then free it so nothing is listening there.
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let client = http_client(
        &format!("http://127.0.0.1:{port}/submit_comment"),
        fast_policy(),
    );
    let failure = client.submit(&submission("Backend down")).await.unwrap_err();

    assert_matches!(failure.error, AttemptError::Network(_));
    assert_eq!(failure.attempts, 3);
}
