//! Wire format of a submission as seen by the feedback backend
//!
//! These tests verify that:
//! - The payload is posted as JSON with the widget headers
//! - Client errors are not retried
//! - Server errors are retried until the policy is exhausted

mod common;

use assert_matches::assert_matches;
use common::{
    fast_policy,
    http_client,
    submission,
    try_start_mock_server,
    USER_AGENT,
};
use feedback_widget::{
    AttemptError,
    SubmissionFailure,
};
use httpmock::prelude::*;
use serde_json::json;

#[tokio::test]
async fn test_submission_payload_and_headers() {
    let server = try_start_mock_server();

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/submit_comment")
            .header("content-type", "application/json")
            .header("accept", "application/json")
            .header("cache-control", "no-cache")
            .header("x-requested-with", "XMLHttpRequest")
            .header("x-widget-version", "1.0.0")
            .header("x-widget-origin", "shop.example.com")
            .json_body_partial(
                json!({
                    "comment": "Search results load slowly",
                    "name": "Ada",
                    "email": "ada@example.com",
                    "company": "shop.example.com",
                    "website_url": "https://shop.example.com",
                    "user_agent": USER_AGENT,
                    "widget_version": "1.0.0"
                })
                .to_string(),
            );
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "message": "Comment received", "id": 17 }));
    });

    let client = http_client(&server.url("/submit_comment"), fast_policy());
    let response = client
        .submit(&submission("  Search results load slowly  "))
        .await
        .expect("submission should succeed");

    assert_eq!(response["id"], 17);
    mock.assert();
}

#[tokio::test]
async fn test_bad_request_is_not_retried() {
    let server = try_start_mock_server();

    let mock = server.mock(|when, then| {
        when.method(POST).path("/submit_comment");
        then.status(400).json_body(json!({ "error": "comment missing" }));
    });

    let client = http_client(&server.url("/submit_comment"), fast_policy());
    let failure = client.submit(&submission("Bad input")).await.unwrap_err();

    assert_eq!(
        failure,
        SubmissionFailure {
            error: AttemptError::Http { status: 400 },
            attempts: 1,
        }
    );
    mock.assert_hits(1);
}

#[tokio::test]
async fn test_too_many_requests_message() {
    let server = try_start_mock_server();

    let mock = server.mock(|when, then| {
        when.method(POST).path("/submit_comment");
        then.status(429);
    });

    let client = http_client(&server.url("/submit_comment"), fast_policy());
    let failure = client.submit(&submission("Slow down")).await.unwrap_err();

    assert_eq!(
        failure.user_message(),
        "Too many requests. Please wait a moment and try again."
    );
    mock.assert_hits(1);
}

#[tokio::test]
async fn test_server_error_exhausts_retries() {
    let server = try_start_mock_server();

    let mock = server.mock(|when, then| {
        when.method(POST).path("/submit_comment");
        then.status(502);
    });

    let client = http_client(&server.url("/submit_comment"), fast_policy());
    let failure = client.submit(&submission("Anyone there?")).await.unwrap_err();

    assert_matches!(failure.error, AttemptError::Http { status: 502 });
    assert_eq!(failure.attempts, 3);
    assert_eq!(
        failure.to_string(),
        "Server error after 3 attempts. Please try again later."
    );
    mock.assert_hits(3);
}

#[tokio::test]
async fn test_non_json_success_body_is_malformed() {
    let server = try_start_mock_server();

    let mock = server.mock(|when, then| {
        when.method(POST).path("/submit_comment");
        then.status(200).body("<html>ok</html>");
    });

    let client = http_client(&server.url("/submit_comment"), fast_policy());
    let failure = client.submit(&submission("Odd backend")).await.unwrap_err();

    assert_matches!(failure.error, AttemptError::MalformedResponse(_));
    assert_eq!(failure.attempts, 1);
    mock.assert_hits(1);
}
