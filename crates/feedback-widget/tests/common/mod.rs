#![allow(dead_code)]

use chrono::Utc;
use feedback_widget::{
    FeedbackSubmission,
    HostContext,
    HttpTransport,
    RetryPolicy,
    SubmissionClient,
};
use httpmock::MockServer;
use std::{
    net::TcpListener,
    time::Duration,
};

pub const PAGE_URL: &str = "https://shop.example.com/pricing";
pub const USER_AGENT: &str = "feedback-widget-tests/1.0";

/// Start an httpmock server, failing with a readable message when the
/// sandbox does not allow binding a local port.
pub fn try_start_mock_server() -> MockServer {
    TcpListener::bind("127.0.0.1:0")
        .map_err(|err| format!("Failed to bind localhost for httpmock: {err}"))
        .and_then(|listener| {
            drop(listener);
            std::panic::catch_unwind(MockServer::start).map_err(|err| {
                err.downcast_ref::<&str>()
                    .map(|msg| (*msg).to_string())
                    .or_else(|| err.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "MockServer::start() panicked".to_string())
            })
        })
        .expect("Failed to start httpmock server")
}

pub fn host() -> HostContext {
    HostContext::from_page_url(PAGE_URL, USER_AGENT).expect("valid page url")
}

pub fn submission(comment: &str) -> FeedbackSubmission {
    FeedbackSubmission::new(comment, "Ada", "ada@example.com", &host(), Utc::now())
}

/// Retry policy with millisecond delays so tests run quickly on a real clock.
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        delays: vec![Duration::from_millis(10), Duration::from_millis(20)],
    }
}

pub fn http_client(endpoint: &str, policy: RetryPolicy) -> SubmissionClient<HttpTransport> {
    let transport = HttpTransport::new(endpoint, &host()).expect("valid endpoint");
    SubmissionClient::with_transport(transport, policy)
}
