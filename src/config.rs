#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};

const DEFAULT_ATOM_RETRY_DELAY: Duration = Duration::from_millis(300);
const DEFAULT_RESET_WINDOW: u32 = 10;
const DEFAULT_INITIAL_BACKOFF_DURATION: Duration = Duration::from_secs(1);
const DEFAULT_MAX_BACKOFF_DURATION: Duration = Duration::from_secs(60);
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Configuration for the default sawtooth retry policy.
///
/// The delay for attempt `n` is `((n - 1) mod reset_window) * atom_delay`:
/// linearly increasing, wrapping back to zero every `reset_window` attempts.
/// This bounds the maximum wait while still backing off, unlike an
/// exponential schedule.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Base unit of delay; attempt `n` waits a multiple of this
    pub atom_delay: Duration,
    /// Number of attempts after which the delay wraps back to zero
    pub reset_window: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            atom_delay: DEFAULT_ATOM_RETRY_DELAY,
            reset_window: DEFAULT_RESET_WINDOW,
        }
    }
}

/// Configuration for exponential reconnection backoff.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum total time spent retrying before giving up.
    /// `None` means retry forever.
    pub max_elapsed: Option<Duration>,
    /// Initial backoff duration for the first reconnection attempt
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    pub max_backoff: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_elapsed: None, // Infinite reconnection by default
            initial_backoff: DEFAULT_INITIAL_BACKOFF_DURATION,
            max_backoff: DEFAULT_MAX_BACKOFF_DURATION,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl From<ReconnectConfig> for ExponentialBackoff {
    fn from(config: ReconnectConfig) -> Self {
        ExponentialBackoffBuilder::default()
            .with_initial_interval(config.initial_backoff)
            .with_max_interval(config.max_backoff)
            .with_multiplier(config.backoff_multiplier)
            .with_max_elapsed_time(config.max_elapsed)
            .build()
    }
}
