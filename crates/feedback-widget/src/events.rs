//! Events published to the host page.

use crate::{
    display::Theme,
    submission::SubmissionSummary,
};
use chrono::{
    DateTime,
    Utc,
};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Something the host page may want to react to.
///
/// Serializes with a `type` tag matching the event name, e.g.
/// `{"type":"submitError","timestamp":...,"attempts":4,...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WidgetEvent {
    Opened {
        timestamp: DateTime<Utc>,
    },
    Closed {
        timestamp: DateTime<Utc>,
    },
    Submitted {
        timestamp: DateTime<Utc>,
        /// Attempt that succeeded (one based)
        attempt: u32,
        data: SubmissionSummary,
    },
    SubmitError {
        timestamp: DateTime<Utc>,
        error: String,
        attempts: u32,
        data: SubmissionSummary,
    },
    ThemeChanged {
        timestamp: DateTime<Utc>,
        theme: Theme,
    },
    ViewportChanged {
        timestamp: DateTime<Utc>,
        width: u32,
        height: u32,
        is_mobile: bool,
    },
}

impl WidgetEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WidgetEvent::Opened { .. } => "opened",
            WidgetEvent::Closed { .. } => "closed",
            WidgetEvent::Submitted { .. } => "submitted",
            WidgetEvent::SubmitError { .. } => "submitError",
            WidgetEvent::ThemeChanged { .. } => "themeChanged",
            WidgetEvent::ViewportChanged { .. } => "viewportChanged",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            WidgetEvent::Opened { timestamp }
            | WidgetEvent::Closed { timestamp }
            | WidgetEvent::Submitted { timestamp, .. }
            | WidgetEvent::SubmitError { timestamp, .. }
            | WidgetEvent::ThemeChanged { timestamp, .. }
            | WidgetEvent::ViewportChanged { timestamp, .. } => *timestamp,
        }
    }
}

/// Fan-out of widget events to any number of host listeners.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<WidgetEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_CHANNEL_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WidgetEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Events emitted while nobody listens are dropped.
    pub fn emit(&self, event: WidgetEvent) {
        trace!(event = event.name(), "Dispatching widget event");
        let _ = self.sender.send(event);
    }
}
