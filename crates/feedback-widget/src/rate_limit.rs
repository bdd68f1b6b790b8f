//! Per-widget submission rate limiting.
//!
//! Two gates guard the submit path: a short cooldown that swallows double
//! clicks, and an hourly quota. The window restarts once the last accepted
//! submission is older than the window length.

use serde::{
    Deserialize,
    Serialize,
};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Thresholds for the submission gates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Minimum time between two accepted submissions (milliseconds).
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    /// Length of the quota window (milliseconds).
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Accepted submissions per window.
    #[serde(default = "default_max_per_window")]
    pub max_per_window: u32,
}

const fn default_min_interval_ms() -> u64 {
    2_000
}

const fn default_window_ms() -> u64 {
    3_600_000
}

const fn default_max_per_window() -> u32 {
    5
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
            window_ms: default_window_ms(),
            max_per_window: default_max_per_window(),
        }
    }
}

impl RateLimitConfig {
    fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Bookkeeping for accepted submissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitState {
    /// When the last submission passed the gate; `None` if it never did
    pub last_submission: Option<Instant>,
    /// Accepted submissions in the current window
    pub submission_count: u32,
}

impl RateLimitState {
    fn window_expired(&self, config: &RateLimitConfig, now: Instant) -> bool {
        self.last_submission
            .is_none_or(|last| now.saturating_duration_since(last) > config.window())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RateLimitError {
    #[error("Please wait before submitting again.")]
    TooSoon { retry_after: Duration },
    #[error("Too many submissions. Please try again later.")]
    QuotaExceeded,
}

/// Decide whether a submission at `now` may proceed. Never mutates `state`.
pub fn check_rate_limit(
    config: &RateLimitConfig,
    state: &RateLimitState,
    now: Instant,
) -> Result<(), RateLimitError> {
    if let Some(last) = state.last_submission {
        let elapsed = now.saturating_duration_since(last);
        if elapsed < config.min_interval() {
            return Err(RateLimitError::TooSoon {
                retry_after: config.min_interval() - elapsed,
            });
        }
    }

    let count = if state.window_expired(config, now) {
        0
    } else {
        state.submission_count
    };

    if count >= config.max_per_window {
        return Err(RateLimitError::QuotaExceeded);
    }

    Ok(())
}

/// Rate limiter owned by one widget instance.
#[derive(Debug, Clone, Default)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: RateLimitState,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: RateLimitState::default(),
        }
    }

    pub fn check(&self, now: Instant) -> Result<(), RateLimitError> {
        check_rate_limit(&self.config, &self.state, now)
    }

    /// Record a submission that passed [`RateLimiter::check`].
    pub fn record(&mut self, now: Instant) {
        if self.state.window_expired(&self.config, now) {
            self.state.submission_count = 0;
        }
        self.state.submission_count += 1;
        self.state.last_submission = Some(now);
    }

    pub fn state(&self) -> &RateLimitState {
        &self.state
    }
}
