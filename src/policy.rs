//! Retry policies consulted between connection attempts.
//!
//! A policy is a pure decision function: given the current failure streak
//! ([`RetryInfo`]) it answers whether to give up and how long to wait before
//! the next attempt. Policies never sleep and never mutate the streak; the
//! runner owns the loop, the sleep, and the bookkeeping.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff as _;

use crate::config::{ReconnectConfig, RetryConfig};
use crate::error::WsError;

/// Record of the current failure streak, passed read-only to the policy and to
/// the `on_retry` hook.
///
/// The attempt count is 1-based and never resets automatically; a wrapping
/// policy such as [`SawtoothBackoff`] bounds its own delays instead.
#[derive(Debug)]
pub struct RetryInfo {
    attempts: u32,
    started: Instant,
    last_error: Option<WsError>,
}

impl RetryInfo {
    pub(crate) fn new() -> Self {
        Self {
            attempts: 0,
            started: Instant::now(),
            last_error: None,
        }
    }

    pub(crate) fn next_attempt(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    pub(crate) fn record(&mut self, error: WsError) {
        self.last_error = Some(error);
    }

    /// Number of attempts made so far (1-based once the first attempt ran).
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The failure that ended the most recent attempt.
    #[must_use]
    pub fn last_error(&self) -> Option<&WsError> {
        self.last_error.as_ref()
    }

    /// Time elapsed since the first attempt began.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Outcome of a policy consultation: retry after a delay, or give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    abort: bool,
    delay: Duration,
}

impl RetryDecision {
    /// Retry after waiting `delay`.
    #[must_use]
    pub const fn retry_after(delay: Duration) -> Self {
        Self {
            abort: false,
            delay,
        }
    }

    /// Stop retrying; the runner reports `Aborted`.
    #[must_use]
    pub const fn give_up() -> Self {
        Self {
            abort: true,
            delay: Duration::ZERO,
        }
    }

    #[must_use]
    pub const fn is_abort(&self) -> bool {
        self.abort
    }

    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }
}

/// Decision function mapping retry history to a wait delay and an abort flag.
///
/// Implementations must be deterministic given the same [`RetryInfo`] sequence.
pub trait RetryPolicy: Send + Sync + 'static {
    fn decide(&self, info: &RetryInfo) -> RetryDecision;
}

/// Default policy: linearly increasing delay that wraps back to zero every
/// `reset_window` attempts.
///
/// With the defaults (300ms atom, window of 10) the delays are
/// `0, 300ms, 600ms, …, 2.7s, 0, 300ms, …`. Never aborts.
#[derive(Debug, Clone, Default)]
pub struct SawtoothBackoff {
    config: RetryConfig,
}

impl SawtoothBackoff {
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

impl RetryPolicy for SawtoothBackoff {
    fn decide(&self, info: &RetryInfo) -> RetryDecision {
        let window = self.config.reset_window.max(1);
        let step = info.attempts().saturating_sub(1) % window;
        RetryDecision::retry_after(self.config.atom_delay.saturating_mul(step))
    }
}

/// Exponential backoff policy built on [`backoff::ExponentialBackoff`].
///
/// Aborts once the configured `max_elapsed` budget is exhausted. The underlying
/// schedule applies jitter; build from a [`ReconnectConfig`] with the jitter
/// characteristics you need if strict determinism is required.
#[derive(Debug)]
pub struct ExponentialRetry {
    inner: Mutex<ExponentialBackoff>,
}

impl ExponentialRetry {
    #[must_use]
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            inner: Mutex::new(config.into()),
        }
    }
}

impl Default for ExponentialRetry {
    fn default() -> Self {
        Self::new(ReconnectConfig::default())
    }
}

impl From<ReconnectConfig> for ExponentialRetry {
    fn from(config: ReconnectConfig) -> Self {
        Self::new(config)
    }
}

impl RetryPolicy for ExponentialRetry {
    fn decide(&self, _info: &RetryInfo) -> RetryDecision {
        let mut schedule = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match schedule.next_backoff() {
            Some(delay) => RetryDecision::retry_after(delay),
            None => RetryDecision::give_up(),
        }
    }
}
