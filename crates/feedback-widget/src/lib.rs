//! Submission pipeline for an embeddable feedback widget.
//!
//! A [`Widget`] owns the panel state of one widget instance. Submitting runs
//! the draft through a honeypot check, field validation and a per-instance
//! rate limiter before posting it to the feedback backend with retries.
//! Hosts observe the widget through [`WidgetEvent`]s.
//!
//! ```no_run
//! use feedback_widget::{
//!     Field,
//!     HostContext,
//!     Widget,
//!     WidgetConfig,
//! };
//!
//! # async fn run() -> feedback_widget::Result<()> {
//! let host = HostContext::from_page_url("https://shop.example.com/", "my-agent/1.0")?;
//! let widget = Widget::init(WidgetConfig::default(), host)?;
//!
//! widget.open();
//! widget.set_field(Field::Comment, "Checkout was quick and easy");
//! let outcome = widget.submit().await;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]

pub mod client;
pub mod config;
pub mod display;
pub mod error;
pub mod events;
pub mod rate_limit;
pub mod submission;
pub mod validation;
pub mod widget;

pub use client::{
    AttemptError,
    HttpTransport,
    RetryNotice,
    RetryPolicy,
    SubmissionClient,
    SubmissionFailure,
    Transport,
};
pub use config::{
    Environment,
    Position,
    ThemePreference,
    WidgetConfig,
};
pub use display::{
    PanelGeometry,
    Theme,
};
pub use error::{
    Error,
    Result,
};
pub use events::WidgetEvent;
pub use rate_limit::{
    RateLimitConfig,
    RateLimitError,
};
pub use submission::{
    FeedbackSubmission,
    HostContext,
    SubmissionSummary,
};
pub use validation::{
    Field,
    ValidationError,
};
pub use widget::{
    BlockReason,
    FormInput,
    FormStatus,
    FormView,
    SubmitOutcome,
    Widget,
};
