//! Host context and the payload posted to the feedback endpoint

use crate::error::Result;
use chrono::{
    DateTime,
    SecondsFormat,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use url::Url;

/// Version reported in the payload and in the `X-Widget-Version` header.
pub const WIDGET_VERSION: &str = "1.0.0";

/// Description of the page hosting the widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostContext {
    /// Page origin, e.g. `https://shop.example.com`
    pub origin: String,
    /// Page hostname, reported as the submitting company
    pub hostname: String,
    /// URL scheme without the trailing colon (`https`, `file`, ...)
    pub protocol: String,
    /// User agent of the submitting client
    pub user_agent: String,
}

impl HostContext {
    /// Build a host context from the page URL.
    pub fn from_page_url(page_url: &str, user_agent: impl Into<String>) -> Result<Self> {
        let url = Url::parse(page_url)?;
        Ok(Self {
            origin: url.origin().ascii_serialization(),
            hostname: url.host_str().unwrap_or_default().to_string(),
            protocol: url.scheme().to_string(),
            user_agent: user_agent.into(),
        })
    }

    /// Whether the page is served from a developer machine.
    pub fn is_local(&self) -> bool {
        matches!(self.hostname.as_str(), "localhost" | "127.0.0.1" | "") || self.protocol == "file"
    }

    /// Value of the `X-Widget-Origin` header.
    pub fn origin_header(&self) -> &str {
        if self.hostname.is_empty() {
            "unknown"
        } else {
            &self.hostname
        }
    }
}

/// One feedback submission as sent to the backend.
///
/// Built fresh for every submit and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackSubmission {
    pub comment: String,
    pub name: String,
    pub email: String,
    pub company: String,
    pub website_url: String,
    pub user_agent: String,
    pub timestamp: String,
    pub widget_version: String,
}

impl FeedbackSubmission {
    pub fn new(
        comment: &str,
        name: &str,
        email: &str,
        host: &HostContext,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            comment: comment.trim().to_string(),
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            company: host.hostname.clone(),
            website_url: host.origin.clone(),
            user_agent: host.user_agent.clone(),
            timestamp: submitted_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            widget_version: WIDGET_VERSION.to_string(),
        }
    }

    /// Summary safe to hand to event listeners and logs.
    pub fn summary(&self) -> SubmissionSummary {
        SubmissionSummary {
            comment: self.comment.clone(),
            name: self.name.clone(),
            email: if self.email.is_empty() {
                "[NOT PROVIDED]".to_string()
            } else {
                "[PROVIDED]".to_string()
            },
        }
    }
}

/// Redacted view of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionSummary {
    pub comment: String,
    pub name: String,
    pub email: String,
}
