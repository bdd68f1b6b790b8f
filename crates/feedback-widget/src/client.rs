//! HTTP submission with timeout, retry and error classification

use crate::{
    config::WidgetConfig,
    error::{
        Error,
        Result,
    },
    submission::{
        FeedbackSubmission,
        HostContext,
    },
};
use reqwest::header::{
    ACCEPT,
    CACHE_CONTROL,
    HeaderMap,
    HeaderName,
    HeaderValue,
};
use serde_json::Value;
use std::{
    fmt,
    future::Future,
    time::Duration,
};
use tracing::{
    debug,
    error,
    info,
    warn,
};
use url::Url;

/// Per-attempt request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const X_REQUESTED_WITH: HeaderName = HeaderName::from_static("x-requested-with");
const X_WIDGET_VERSION: HeaderName = HeaderName::from_static("x-widget-version");
const X_WIDGET_ORIGIN: HeaderName = HeaderName::from_static("x-widget-origin");

/// Failure of a single submission attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {status}")]
    Http { status: u16 },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl AttemptError {
    /// Transport failures and gateway-style server errors are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            AttemptError::Timeout | AttemptError::Network(_) => true,
            AttemptError::Http { status } => matches!(status, 500 | 502 | 503 | 504),
            AttemptError::MalformedResponse(_) => false,
        }
    }
}

impl From<reqwest::Error> for AttemptError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AttemptError::Timeout
        } else if err.is_decode() {
            AttemptError::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            AttemptError::Http {
                status: status.as_u16(),
            }
        } else {
            AttemptError::Network(err.to_string())
        }
    }
}

/// Terminal failure of a submission after all permitted attempts.
///
/// The display text is the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionFailure {
    /// Error of the last attempt
    pub error: AttemptError,
    /// Number of attempts made, including the first one
    pub attempts: u32,
}

impl SubmissionFailure {
    pub fn user_message(&self) -> String {
        let n = self.attempts;
        let plural = if n > 1 { "s" } else { "" };
        match &self.error {
            AttemptError::Timeout => {
                format!(
                    "Request timed out after {n} attempt{plural}. Please check your connection and try again."
                )
            }
            AttemptError::Network(_) => {
                format!(
                    "Network error after {n} attempt{plural}. Please check your connection and try again."
                )
            }
            AttemptError::Http { status: 429 } => {
                "Too many requests. Please wait a moment and try again.".to_string()
            }
            AttemptError::Http { status } if (400..500).contains(status) => {
                "Invalid request. Please check your input and try again.".to_string()
            }
            AttemptError::Http { status } if (500..600).contains(status) => {
                format!("Server error after {n} attempt{plural}. Please try again later.")
            }
            _ => format!("Failed to submit feedback after {n} attempt{plural}. Please try again."),
        }
    }
}

impl fmt::Display for SubmissionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user_message())
    }
}

impl std::error::Error for SubmissionFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Backoff schedule for retryable failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before retry `n` is `delays[n]`; the last entry is reused past the end
    pub delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delays: vec![
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(4000),
            ],
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay to wait after failed attempt number `attempt` (zero based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.delays
            .get(attempt as usize)
            .or(self.delays.last())
            .copied()
            .unwrap_or_default()
    }
}

/// Notification emitted before a delayed retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryNotice {
    /// The attempt that just failed (one based)
    pub attempt: u32,
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryNotice {
    pub fn message(&self) -> String {
        format!("Retrying... ({}/{})", self.attempt, self.max_attempts)
    }
}

/// Sends one submission attempt.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        submission: &FeedbackSubmission,
    ) -> impl Future<Output = std::result::Result<Value, AttemptError>> + Send;
}

/// JSON-over-HTTP transport backed by reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpTransport {
    pub fn new(endpoint: &str, host: &HostContext) -> Result<Self> {
        Self::with_timeout(endpoint, host, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(endpoint: &str, host: &HostContext, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(X_REQUESTED_WITH, HeaderValue::from_static("XMLHttpRequest"));
        headers.insert(
            X_WIDGET_ORIGIN,
            HeaderValue::from_str(host.origin_header()).map_err(|e| {
                Error::ConfigError(format!("Invalid widget origin header: {e}"))
            })?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl Transport for HttpTransport {
    async fn send(
        &self,
        submission: &FeedbackSubmission,
    ) -> std::result::Result<Value, AttemptError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(X_WIDGET_VERSION, submission.widget_version.as_str())
            .json(submission)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Http {
                status: status.as_u16(),
            });
        }

        Ok(response.json::<Value>().await?)
    }
}

/// Submits feedback, retrying retryable failures according to a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct SubmissionClient<T = HttpTransport> {
    transport: T,
    policy: RetryPolicy,
}

impl SubmissionClient<HttpTransport> {
    /// Create an HTTP client for the configured (or host-derived) endpoint.
    pub fn new(config: &WidgetConfig, host: &HostContext) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(&config.resolved_api_url(host), host)?;
        Ok(Self::with_transport(transport, RetryPolicy::default()))
    }
}

impl<T: Transport> SubmissionClient<T> {
    pub fn with_transport(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Submit without retry notifications.
    pub async fn submit(
        &self,
        submission: &FeedbackSubmission,
    ) -> std::result::Result<Value, SubmissionFailure> {
        self.submit_with(submission, |_| {}).await
    }

    /// Submit, calling `on_retry` before each delayed retry.
    pub async fn submit_with<F>(
        &self,
        submission: &FeedbackSubmission,
        mut on_retry: F,
    ) -> std::result::Result<Value, SubmissionFailure>
    where
        F: FnMut(RetryNotice) + Send,
    {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0;

        loop {
            debug!(
                attempt = attempt + 1,
                max_attempts, "Submitting feedback"
            );

            match self.transport.send(submission).await {
                Ok(body) => {
                    if attempt > 0 {
                        info!(
                            attempts = attempt + 1,
                            "Feedback submitted after {attempt} retries"
                        );
                    } else {
                        info!("Feedback submitted");
                    }
                    return Ok(body);
                }
                Err(error) if error.is_retryable() && attempt < self.policy.max_retries => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        %error,
                        attempt = attempt + 1,
                        max_attempts,
                        "Submission attempt failed, retrying in {}ms",
                        delay.as_millis()
                    );
                    on_retry(RetryNotice {
                        attempt: attempt + 1,
                        max_attempts,
                        delay,
                    });
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    error!(
                        %error,
                        attempts = attempt + 1,
                        retryable = error.is_retryable(),
                        "Submission failed, giving up"
                    );
                    return Err(SubmissionFailure {
                        error,
                        attempts: attempt + 1,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;
    use std::{
        collections::VecDeque,
        sync::Arc,
    };
    use tokio::time::Instant;

    /// Transport that replays scripted responses and records when it was called.
    #[derive(Clone, Default)]
    pub(crate) struct ScriptedTransport {
        responses: Arc<Mutex<VecDeque<std::result::Result<Value, AttemptError>>>>,
        calls: Arc<Mutex<Vec<Instant>>>,
        latency: Duration,
    }

    impl ScriptedTransport {
        pub(crate) fn new(
            responses: impl IntoIterator<Item = std::result::Result<Value, AttemptError>>,
        ) -> Self {
            Self {
                responses: Arc::new(Mutex::new(responses.into_iter().collect())),
                calls: Arc::default(),
                latency: Duration::ZERO,
            }
        }

        /// Delay every response by `latency`.
        pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }

        pub(crate) fn calls(&self) -> Vec<Instant> {
            self.calls.lock().clone()
        }
    }

    impl Transport for ScriptedTransport {
        async fn send(
            &self,
            _submission: &FeedbackSubmission,
        ) -> std::result::Result<Value, AttemptError> {
            self.calls.lock().push(Instant::now());
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(AttemptError::Network("script exhausted".to_string())))
        }
    }

    fn submission() -> FeedbackSubmission {
        let host = HostContext::from_page_url("https://example.com/", "agent").unwrap();
        FeedbackSubmission::new("Works great", "", "", &host, Utc::now())
    }

    fn http(status: u16) -> std::result::Result<Value, AttemptError> {
        Err(AttemptError::Http { status })
    }

    #[rstest]
    #[case(AttemptError::Timeout, true)]
    #[case(AttemptError::Network("refused".into()), true)]
    #[case(AttemptError::Http { status: 500 }, true)]
    #[case(AttemptError::Http { status: 502 }, true)]
    #[case(AttemptError::Http { status: 503 }, true)]
    #[case(AttemptError::Http { status: 504 }, true)]
    #[case(AttemptError::Http { status: 501 }, false)]
    #[case(AttemptError::Http { status: 400 }, false)]
    #[case(AttemptError::Http { status: 429 }, false)]
    #[case(AttemptError::MalformedResponse("eof".into()), false)]
    fn retryable_classification(#[case] error: AttemptError, #[case] retryable: bool) {
        assert_eq!(error.is_retryable(), retryable);
    }

    #[test]
    fn delay_schedule_reuses_last_entry() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(7), Duration::from_millis(4000));

        let empty = RetryPolicy {
            max_retries: 1,
            delays: vec![],
        };
        assert_eq!(empty.delay_for(0), Duration::ZERO);
    }

    #[rstest]
    #[case(AttemptError::Timeout, 4, "Request timed out after 4 attempts. Please check your connection and try again.")]
    #[case(AttemptError::Timeout, 1, "Request timed out after 1 attempt. Please check your connection and try again.")]
    #[case(AttemptError::Network("x".into()), 4, "Network error after 4 attempts. Please check your connection and try again.")]
    #[case(AttemptError::Http { status: 429 }, 1, "Too many requests. Please wait a moment and try again.")]
    #[case(AttemptError::Http { status: 400 }, 1, "Invalid request. Please check your input and try again.")]
    #[case(AttemptError::Http { status: 503 }, 4, "Server error after 4 attempts. Please try again later.")]
    #[case(AttemptError::Http { status: 501 }, 1, "Server error after 1 attempt. Please try again later.")]
    #[case(AttemptError::MalformedResponse("x".into()), 1, "Failed to submit feedback after 1 attempt. Please try again.")]
    fn user_messages(#[case] error: AttemptError, #[case] attempts: u32, #[case] expected: &str) {
        let failure = SubmissionFailure { error, attempts };
        assert_eq!(failure.user_message(), expected);
        assert_eq!(failure.to_string(), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_with_backoff_until_success() {
        let transport =
            ScriptedTransport::new([http(503), http(503), Ok(json!({"status": "ok"}))]);
        let client = SubmissionClient::with_transport(transport.clone(), RetryPolicy::default());

        let mut notices = Vec::new();
        let body = client
            .submit_with(&submission(), |notice| notices.push(notice))
            .await
            .unwrap();

        assert_eq!(body, json!({"status": "ok"}));

        let calls = transport.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1] - calls[0], Duration::from_millis(1000));
        assert_eq!(calls[2] - calls[1], Duration::from_millis(2000));

        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].message(), "Retrying... (1/4)");
        assert_eq!(notices[1].attempt, 2);
        assert_eq!(notices[1].delay, Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn client_error_is_not_retried() {
        let transport = ScriptedTransport::new([http(400), Ok(json!({}))]);
        let client = SubmissionClient::with_transport(transport.clone(), RetryPolicy::default());

        let failure = client.submit(&submission()).await.unwrap_err();

        assert_eq!(failure.attempts, 1);
        assert_matches!(failure.error, AttemptError::Http { status: 400 });
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_retry_budget() {
        let transport = ScriptedTransport::new([
            Err(AttemptError::Timeout),
            Err(AttemptError::Timeout),
            Err(AttemptError::Timeout),
            Err(AttemptError::Timeout),
            Ok(json!({})),
        ]);
        let client = SubmissionClient::with_transport(transport.clone(), RetryPolicy::default());
        let started = Instant::now();

        let failure = client.submit(&submission()).await.unwrap_err();

        assert_eq!(failure.attempts, 4);
        assert_eq!(failure.error, AttemptError::Timeout);
        assert_eq!(transport.calls().len(), 4);
        assert_eq!(started.elapsed(), Duration::from_millis(7000));
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_response_is_not_retried() {
        let transport =
            ScriptedTransport::new([Err(AttemptError::MalformedResponse("eof".to_string()))]);
        let client = SubmissionClient::with_transport(transport.clone(), RetryPolicy::default());

        let failure = client.submit(&submission()).await.unwrap_err();

        assert_eq!(failure.attempts, 1);
        assert_eq!(
            failure.user_message(),
            "Failed to submit feedback after 1 attempt. Please try again."
        );
    }

    #[test]
    fn new_rejects_invalid_api_url() {
        let host = HostContext::from_page_url("https://example.com/", "agent").unwrap();
        let config = WidgetConfig::default().with_api_url("ftp://example.com");

        assert_matches!(
            SubmissionClient::new(&config, &host),
            Err(Error::ConfigError(_))
        );
    }

    #[test]
    fn new_uses_host_environment_endpoint() {
        let host = HostContext::from_page_url("http://localhost:3000/", "agent").unwrap();
        let client = SubmissionClient::new(&WidgetConfig::default(), &host).unwrap();

        assert_eq!(
            client.transport().endpoint().as_str(),
            "http://localhost:5000/submit_comment"
        );
    }
}
