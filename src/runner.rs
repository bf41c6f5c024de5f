//! Retry driver composing repeated session attempts.
//!
//! The attempt/backoff/abort decision is an explicit, inspectable loop: run
//! one session attempt, classify how it ended, consult the retry policy, and
//! either sleep and go again or surface a terminal status.

use std::sync::Arc;

use crate::dispatcher::Dispatcher;
use crate::error::WsError;
use crate::policy::{RetryInfo, RetryPolicy};
use crate::session::{ConnectionSession, RunState, SessionEnd};
use crate::transport::Transport;

/// How a completed run ended.
///
/// Distinct from errors so callers can tell a deliberate stop from the policy
/// giving up: fatal faults are the only thing reported through `Err`.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalStatus {
    /// Graceful stop was requested
    Stopped,
    /// The retry policy declined to continue
    Aborted {
        /// Description of the failure that exhausted the policy
        reason: String,
    },
    /// Hard cancellation was requested
    Cancelled,
}

/// Drives repeated [`ConnectionSession`] attempts under a retry policy.
///
/// A `None` policy disables retry entirely: a single attempt runs, and a
/// recoverable failure stops the runner permanently instead of re-raising.
pub struct RetryingRunner<T, D>
where
    T: Transport,
    D: Dispatcher,
{
    session: ConnectionSession<T, D>,
    policy: Option<Arc<dyn RetryPolicy>>,
}

impl<T, D> RetryingRunner<T, D>
where
    T: Transport,
    D: Dispatcher,
{
    pub fn new(session: ConnectionSession<T, D>, policy: Option<Arc<dyn RetryPolicy>>) -> Self {
        Self { session, policy }
    }

    pub(crate) fn set_policy(&mut self, policy: Option<Arc<dyn RetryPolicy>>) {
        self.policy = policy;
    }

    pub(crate) fn session(&self) -> &ConnectionSession<T, D> {
        &self.session
    }

    /// Run attempts until stopped, cancelled, aborted by policy, or a fatal
    /// fault occurs.
    ///
    /// Recoverable failures (transport errors and connection closures) are
    /// recorded into the [`RetryInfo`] streak and offered to the policy; the
    /// attempt count is never reset automatically. Everything else is fatal
    /// and bypasses the policy.
    pub async fn run(&self) -> Result<TerminalStatus, WsError> {
        let shared = self.session.shared();
        let mut info = RetryInfo::new();

        loop {
            info.next_attempt();

            match self.session.run_once().await {
                Ok(SessionEnd::Stopped) => {
                    shared.set_state(RunState::Stopped);
                    return Ok(TerminalStatus::Stopped);
                }
                Ok(SessionEnd::Cancelled) => {
                    shared.set_state(RunState::Stopped);
                    return Ok(TerminalStatus::Cancelled);
                }
                Err(error) if error.is_recoverable() => {
                    let Some(policy) = self.policy.as_ref() else {
                        // Retry disabled: the attempt already disconnected
                        // cleanly, so stop permanently.
                        shared.set_state(RunState::Stopped);
                        return Ok(TerminalStatus::Stopped);
                    };

                    let reason = error.to_string();
                    info.record(error);
                    let decision = policy.decide(&info);
                    if decision.is_abort() {
                        shared.set_state(RunState::Aborted);
                        return Ok(TerminalStatus::Aborted { reason });
                    }

                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        attempt = info.attempts(),
                        delay = ?decision.delay(),
                        error = %reason,
                        "Socket error, reconnecting"
                    );
                    #[cfg(not(feature = "tracing"))]
                    let _ = &reason;

                    if let Err(e) = self.session.dispatcher().on_retry(&info).await {
                        shared.set_state(RunState::Stopped);
                        return Err(WsError::Dispatcher(e));
                    }

                    tokio::select! {
                        () = tokio::time::sleep(decision.delay()) => {}
                        () = shared.stop.cancelled() => {
                            shared.set_state(RunState::Stopped);
                            return Ok(TerminalStatus::Stopped);
                        }
                        () = shared.cancel.cancelled() => {
                            shared.set_state(RunState::Stopped);
                            return Ok(TerminalStatus::Cancelled);
                        }
                    }
                }
                Err(error) => {
                    shared.set_state(RunState::Stopped);
                    return Err(error);
                }
            }
        }
    }
}
