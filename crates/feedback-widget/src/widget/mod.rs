//! The widget instance: panel state, the submit pipeline and deferred UI transitions.
//!
//! A [`Widget`] is a cheap, cloneable handle. All mutable state lives behind
//! one mutex that is never held across an `.await`, so the submit guard and
//! every transition are decided synchronously.
//!
//! # Submit pipeline
//!
//! 1. Reject if a submission is already in flight.
//! 2. Honeypot check. A filled honeypot ends in a generic error, without any
//!    validation feedback.
//! 3. Field validation in comment, name, email order. The first failure is
//!    stored against its field and blocks the submission.
//! 4. Rate limit gate.
//! 5. Network submission with retries through the [`SubmissionClient`].
//!
//! # Deferred transitions
//!
//! Success and error states return to idle on their own after a display
//! period. Each scheduled transition owns a [`CancellationToken`] derived
//! from the widget's root token; any later transition cancels it, and the
//! deferred action re-checks its token under the state lock before running.


use crate::{
    client::{
        HttpTransport,
        RetryNotice,
        SubmissionClient,
        SubmissionFailure,
        Transport,
    },
    config::{
        ThemePreference,
        WidgetConfig,
    },
    display::{
        PanelGeometry,
        Theme,
        is_mobile,
        resolve_theme,
    },
    error::{
        Error,
        Result,
    },
    events::{
        EventBus,
        WidgetEvent,
    },
    rate_limit::{
        RateLimitConfig,
        RateLimitError,
        RateLimiter,
    },
    submission::{
        FeedbackSubmission,
        HostContext,
    },
    validation::{
        Field,
        ValidationError,
        validate_field,
    },
};
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use std::{
    collections::BTreeMap,
    fmt,
    sync::Arc,
    time::Duration,
};
use tokio::{
    runtime::Handle,
    sync::broadcast,
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use tracing::{
    debug,
    info,
    warn,
};

/// How long the success message stays up before the panel closes.
pub const SUCCESS_DISPLAY: Duration = Duration::from_millis(3000);
/// How long an error message stays up before the form comes back.
pub const ERROR_DISPLAY: Duration = Duration::from_millis(5000);
/// Quiet period before a viewport change is applied.
pub const VIEWPORT_DEBOUNCE: Duration = Duration::from_millis(100);

const BOT_REJECTION_MESSAGE: &str = "Submission failed. Please try again.";

/// Visible state of the form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FormStatus {
    #[default]
    Idle,
    Submitting,
    Success,
    /// Error message shown in place of the form
    Error(String),
}

/// Draft values typed into the form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormInput {
    pub comment: String,
    pub name: String,
    pub email: String,
    pub honeypot: String,
}

impl FormInput {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Comment => &self.comment,
            Field::Name => &self.name,
            Field::Email => &self.email,
            Field::Honeypot => &self.honeypot,
        }
    }

    pub fn set(&mut self, field: Field, value: String) {
        match field {
            Field::Comment => self.comment = value,
            Field::Name => self.name = value,
            Field::Email => self.email = value,
            Field::Honeypot => self.honeypot = value,
        }
    }
}

/// Snapshot of everything the host needs to render the panel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormView {
    pub status: FormStatus,
    /// Submit button shows a spinner and is disabled
    pub loading: bool,
    pub input: FormInput,
    pub field_errors: BTreeMap<Field, ValidationError>,
    pub retry_notice: Option<RetryNotice>,
}

impl FormView {
    /// Back to the plain form, keeping the draft.
    fn show_form(&mut self) {
        self.status = FormStatus::Idle;
        self.loading = false;
        self.retry_notice = None;
    }

    /// Back to an empty form.
    fn reset(&mut self) {
        self.show_form();
        self.input = FormInput::default();
        self.field_errors.clear();
    }
}

/// Why a submission was stopped before reaching the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    /// The honeypot field was filled in
    SuspectedBot,
    RateLimited(RateLimitError),
}

impl BlockReason {
    pub fn message(&self) -> String {
        match self {
            BlockReason::SuspectedBot => BOT_REJECTION_MESSAGE.to_string(),
            BlockReason::RateLimited(err) => err.to_string(),
        }
    }
}

/// Result of one [`Widget::submit`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The backend accepted the feedback
    Submitted { response: Value, attempts: u32 },
    /// Another submission is in flight; nothing happened
    AlreadySubmitting,
    /// A field failed validation
    Invalid {
        field: Field,
        error: ValidationError,
    },
    /// Stopped by the honeypot or the rate limiter
    Blocked(BlockReason),
    /// The network submission failed for good
    Failed(SubmissionFailure),
}

#[derive(Debug, Clone, Copy)]
enum DeferredAction {
    ShowForm,
    CloseAfterSuccess,
}

#[derive(Debug)]
struct WidgetState {
    open: bool,
    submitting: bool,
    view: FormView,
    rate_limiter: RateLimiter,
    system_prefers_dark: bool,
    geometry: Option<PanelGeometry>,
    pending_dismiss: Option<CancellationToken>,
    pending_viewport: Option<CancellationToken>,
}

impl WidgetState {
    fn cancel_dismiss(&mut self) {
        if let Some(token) = self.pending_dismiss.take() {
            token.cancel();
        }
    }
}

struct Inner<T> {
    config: WidgetConfig,
    host: HostContext,
    client: SubmissionClient<T>,
    state: Mutex<WidgetState>,
    events: EventBus,
    shutdown: CancellationToken,
    runtime: Handle,
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Handle to one feedback widget instance.
pub struct Widget<T = HttpTransport> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Widget<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Widget<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Widget")
            .field("website", &self.inner.host.origin)
            .field("open", &state.open)
            .field("submitting", &state.submitting)
            .field("status", &state.view.status)
            .finish_non_exhaustive()
    }
}

/// Releases the in-flight flag when a submission is abandoned before it
/// finishes, e.g. because the `submit` future was dropped.
struct InFlight<'a, T> {
    widget: &'a Widget<T>,
    armed: bool,
}

impl<T> InFlight<'_, T> {
    fn complete(mut self) {
        self.armed = false;
    }
}

impl<T> Drop for InFlight<'_, T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let mut state = self.widget.inner.state.lock();
        state.submitting = false;
        state.view.show_form();
        warn!("Submission abandoned before completion");
    }
}

impl Widget<HttpTransport> {
    /// Initialize a widget that submits over HTTP.
    ///
    /// Must be called from within a Tokio runtime; deferred transitions are
    /// spawned onto it.
    pub fn init(config: WidgetConfig, host: HostContext) -> Result<Self> {
        let client = SubmissionClient::new(&config, &host)?;
        Self::with_client(config, host, client, RateLimitConfig::default())
    }
}

impl<T: Transport + 'static> Widget<T> {
    pub fn with_client(
        config: WidgetConfig,
        host: HostContext,
        client: SubmissionClient<T>,
        rate_limit: RateLimitConfig,
    ) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;

        let api_url = config.resolved_api_url(&host);
        match config.detected_environment(&host) {
            Some(mode) => info!(%mode, %api_url, website = %host.origin, "Initializing feedback widget"),
            None => info!(%api_url, website = %host.origin, "Initializing feedback widget"),
        }

        let state = WidgetState {
            open: false,
            submitting: false,
            view: FormView::default(),
            rate_limiter: RateLimiter::new(rate_limit),
            system_prefers_dark: false,
            geometry: None,
            pending_dismiss: None,
            pending_viewport: None,
        };

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                host,
                client,
                state: Mutex::new(state),
                events: EventBus::default(),
                shutdown: CancellationToken::new(),
                runtime,
            }),
        })
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.inner.config
    }

    pub fn host(&self) -> &HostContext {
        &self.inner.host
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WidgetEvent> {
        self.inner.events.subscribe()
    }

    pub fn is_open(&self) -> bool {
        self.inner.state.lock().open
    }

    pub fn is_submitting(&self) -> bool {
        self.inner.state.lock().submitting
    }

    pub fn view(&self) -> FormView {
        self.inner.state.lock().view.clone()
    }

    pub fn theme(&self) -> Theme {
        resolve_theme(self.inner.config.theme, self.inner.state.lock().system_prefers_dark)
    }

    pub fn geometry(&self) -> Option<PanelGeometry> {
        self.inner.state.lock().geometry
    }

    /// Open the panel. Returns `false` if it was already open.
    ///
    /// A result that finished while the panel was closed is dropped, along
    /// with its pending auto-dismiss, so it cannot close the reopened panel.
    pub fn open(&self) -> bool {
        {
            let mut state = self.inner.state.lock();
            if state.open {
                return false;
            }
            state.open = true;
            if state.pending_dismiss.is_some() {
                state.cancel_dismiss();
                state.view.show_form();
            }
        }

        debug!("Panel opened");
        self.inner.events.emit(WidgetEvent::Opened {
            timestamp: Utc::now(),
        });
        true
    }

    /// Close the panel. Returns `false` if it was already closed.
    ///
    /// Closing cancels any pending auto-dismiss and clears the form, unless a
    /// submission is still in flight.
    pub fn close(&self) -> bool {
        {
            let mut state = self.inner.state.lock();
            if !state.open {
                return false;
            }
            state.open = false;
            state.cancel_dismiss();
            if !state.submitting {
                state.view.reset();
            }
        }

        debug!("Panel closed");
        self.inner.events.emit(WidgetEvent::Closed {
            timestamp: Utc::now(),
        });
        true
    }

    pub fn toggle(&self) {
        if self.is_open() {
            self.close();
        } else {
            self.open();
        }
    }

    /// Update a draft field. Editing a field clears its error.
    pub fn set_field(&self, field: Field, value: impl Into<String>) {
        let mut state = self.inner.state.lock();
        state.view.input.set(field, value.into());
        state.view.field_errors.remove(&field);
    }

    /// Validate a field when the user leaves it. Empty fields are left alone;
    /// the required check happens on submit.
    pub fn blur_field(&self, field: Field) -> std::result::Result<(), ValidationError> {
        let mut state = self.inner.state.lock();
        state.view.field_errors.remove(&field);

        if !self.is_visible(field) {
            return Ok(());
        }

        let value = state.view.input.get(field);
        if value.trim().is_empty() {
            return Ok(());
        }

        let result = validate_field(field, value);
        if let Err(error) = result {
            state.view.field_errors.insert(field, error);
        }
        result
    }

    /// Run the submit pipeline for the current draft.
    pub async fn submit(&self) -> SubmitOutcome {
        let submission = match self.begin_submission() {
            Ok(submission) => submission,
            Err(outcome) => return outcome,
        };
        let in_flight = InFlight {
            widget: self,
            armed: true,
        };

        let mut retries = 0;
        let result = self
            .inner
            .client
            .submit_with(&submission, |notice| {
                retries += 1;
                self.inner.state.lock().view.retry_notice = Some(notice);
            })
            .await;

        in_flight.complete();
        self.finish_submission(&submission, result, retries + 1)
    }

    /// Report a change of the system color scheme.
    pub fn system_theme_changed(&self, prefers_dark: bool) {
        let preference = self.inner.config.theme;
        let theme = {
            let mut state = self.inner.state.lock();
            let previous = resolve_theme(preference, state.system_prefers_dark);
            state.system_prefers_dark = prefers_dark;

            let theme = resolve_theme(preference, prefers_dark);
            if preference != ThemePreference::Auto || theme == previous {
                return;
            }
            theme
        };

        debug!(theme = theme.as_str(), "Theme changed");
        self.inner.events.emit(WidgetEvent::ThemeChanged {
            timestamp: Utc::now(),
            theme,
        });
    }

    /// Report a viewport resize. Bursts are coalesced; only the last size is
    /// applied once the viewport has been stable for [`VIEWPORT_DEBOUNCE`].
    pub fn viewport_changed(&self, width: u32, height: u32) {
        let mut state = self.inner.state.lock();
        if let Some(previous) = state.pending_viewport.take() {
            previous.cancel();
        }

        let token = self.inner.shutdown.child_token();
        state.pending_viewport = Some(token.clone());

        let widget = self.clone();
        self.inner.runtime.spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(VIEWPORT_DEBOUNCE) => widget.apply_viewport(width, height, &token),
            }
        });
    }

    /// Tear the widget down, cancelling every pending deferred action.
    pub fn dispose(&self) {
        self.inner.shutdown.cancel();
        let mut state = self.inner.state.lock();
        state.pending_dismiss = None;
        state.pending_viewport = None;
        debug!("Widget disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    fn is_visible(&self, field: Field) -> bool {
        match field {
            Field::Name => self.inner.config.show_name,
            Field::Email => self.inner.config.show_email,
            Field::Comment | Field::Honeypot => true,
        }
    }

    /// Synchronous part of the pipeline, decided under one lock.
    fn begin_submission(&self) -> std::result::Result<FeedbackSubmission, SubmitOutcome> {
        let mut state = self.inner.state.lock();
        if state.submitting {
            debug!("Submission already in progress");
            return Err(SubmitOutcome::AlreadySubmitting);
        }

        if state.view.status != FormStatus::Idle {
            state.cancel_dismiss();
            state.view.show_form();
        }
        state.view.field_errors.clear();

        let mut input = state.view.input.clone();
        for field in [Field::Name, Field::Email] {
            if !self.is_visible(field) {
                input.set(field, String::new());
            }
        }

        if !input.honeypot.trim().is_empty() {
            warn!("Honeypot triggered, potential spam bot detected");
            let reason = BlockReason::SuspectedBot;
            self.show_error(&mut state, reason.message());
            return Err(SubmitOutcome::Blocked(reason));
        }

        let validation = [Field::Comment, Field::Name, Field::Email]
            .into_iter()
            .try_for_each(|field| validate_field(field, input.get(field)).map_err(|error| (field, error)));
        if let Err((field, error)) = validation {
            debug!(?field, %error, "Field validation failed");
            state.view.field_errors.insert(field, error);
            return Err(SubmitOutcome::Invalid { field, error });
        }

        let now = Instant::now();
        if let Err(err) = state.rate_limiter.check(now) {
            info!(%err, "Submission rate limited");
            let reason = BlockReason::RateLimited(err);
            self.show_error(&mut state, reason.message());
            return Err(SubmitOutcome::Blocked(reason));
        }

        let submission = FeedbackSubmission::new(
            &input.comment,
            &input.name,
            &input.email,
            &self.inner.host,
            Utc::now(),
        );

        state.submitting = true;
        state.rate_limiter.record(now);
        state.view.status = FormStatus::Submitting;
        state.view.loading = true;
        state.view.retry_notice = None;

        info!(
            comment_chars = submission.comment.chars().count(),
            has_name = !submission.name.is_empty(),
            has_email = !submission.email.is_empty(),
            company = %submission.company,
            "Submitting feedback"
        );

        Ok(submission)
    }

    fn finish_submission(
        &self,
        submission: &FeedbackSubmission,
        result: std::result::Result<Value, SubmissionFailure>,
        attempts: u32,
    ) -> SubmitOutcome {
        let mut state = self.inner.state.lock();
        state.submitting = false;
        state.view.loading = false;
        state.view.retry_notice = None;

        match result {
            Ok(response) => {
                state.view.input = FormInput::default();
                state.view.field_errors.clear();
                state.view.status = FormStatus::Success;
                self.schedule_dismiss(&mut state, SUCCESS_DISPLAY, DeferredAction::CloseAfterSuccess);
                drop(state);

                info!(attempts, "Feedback submitted successfully");
                self.inner.events.emit(WidgetEvent::Submitted {
                    timestamp: Utc::now(),
                    attempt: attempts,
                    data: submission.summary(),
                });
                SubmitOutcome::Submitted { response, attempts }
            }
            Err(failure) => {
                self.show_error(&mut state, failure.user_message());
                drop(state);

                self.inner.events.emit(WidgetEvent::SubmitError {
                    timestamp: Utc::now(),
                    error: failure.error.to_string(),
                    attempts: failure.attempts,
                    data: submission.summary(),
                });
                SubmitOutcome::Failed(failure)
            }
        }
    }

    fn show_error(&self, state: &mut WidgetState, message: String) {
        debug!(%message, "Showing error");
        state.view.status = FormStatus::Error(message);
        state.view.loading = false;
        state.view.retry_notice = None;
        self.schedule_dismiss(state, ERROR_DISPLAY, DeferredAction::ShowForm);
    }

    /// Schedule `action` after `delay`, replacing any pending dismiss.
    fn schedule_dismiss(&self, state: &mut WidgetState, delay: Duration, action: DeferredAction) {
        state.cancel_dismiss();

        let token = self.inner.shutdown.child_token();
        state.pending_dismiss = Some(token.clone());

        let widget = self.clone();
        self.inner.runtime.spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(delay) => widget.run_deferred(action, &token),
            }
        });
    }

    fn run_deferred(&self, action: DeferredAction, token: &CancellationToken) {
        let closed = {
            let mut state = self.inner.state.lock();
            if token.is_cancelled() {
                return;
            }
            state.pending_dismiss = None;

            match action {
                DeferredAction::ShowForm => {
                    state.view.show_form();
                    false
                }
                DeferredAction::CloseAfterSuccess => {
                    state.view.reset();
                    std::mem::replace(&mut state.open, false)
                }
            }
        };

        debug!(?action, "Deferred transition applied");
        if closed {
            self.inner.events.emit(WidgetEvent::Closed {
                timestamp: Utc::now(),
            });
        }
    }

    fn apply_viewport(&self, width: u32, height: u32, token: &CancellationToken) {
        {
            let mut state = self.inner.state.lock();
            if token.is_cancelled() {
                return;
            }
            state.pending_viewport = None;
            state.geometry = PanelGeometry::for_viewport(width, height);
        }

        debug!(width, height, "Viewport adjusted");
        self.inner.events.emit(WidgetEvent::ViewportChanged {
            timestamp: Utc::now(),
            width,
            height,
            is_mobile: is_mobile(width),
        });
    }
}
