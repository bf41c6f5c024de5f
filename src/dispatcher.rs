//! Lifecycle and message hooks implemented by the caller.

use async_trait::async_trait;

use crate::error::BoxError;
use crate::policy::RetryInfo;
use crate::session::SessionHandle;
use crate::transport::Message;

/// Result of a dispatcher hook. An `Err` is a dispatcher fault: fatal,
/// propagated immediately, never retried.
pub type HookResult = Result<(), BoxError>;

/// Caller-supplied handler receiving lifecycle and message hooks.
///
/// All hooks default to no-ops, so implementations only override what they
/// need. Hooks fire in strict order per attempt:
/// `before_connect → on_connect → {on_message}* → before_disconnect →
/// on_disconnect`, with messages delivered one at a time in arrival order.
/// `on_retry` fires between attempts, before the backoff sleep.
///
/// The [`SessionHandle`] passed at invocation time is the non-owning way back
/// into the session: hooks may call [`SessionHandle::send`] (for example to
/// subscribe on `on_connect`) or request a stop. Hooks may perform arbitrary
/// side effects but must not block indefinitely, and `on_retry` must not fail
/// under normal operation.
#[async_trait]
pub trait Dispatcher: Send + Sync + 'static {
    /// Fired before the transport handshake starts.
    async fn before_connect(&self, session: &SessionHandle) -> HookResult {
        let _ = session;
        Ok(())
    }

    /// Fired once the connection is established, before any message arrives.
    async fn on_connect(&self, session: &SessionHandle) -> HookResult {
        let _ = session;
        Ok(())
    }

    /// Fired when teardown begins; no message is delivered after this.
    async fn before_disconnect(&self, session: &SessionHandle) -> HookResult {
        let _ = session;
        Ok(())
    }

    /// Fired once the transport is closed.
    async fn on_disconnect(&self, session: &SessionHandle) -> HookResult {
        let _ = session;
        Ok(())
    }

    /// Fired for each inbound message, synchronously, in arrival order.
    async fn on_message(&self, session: &SessionHandle, message: Message) -> HookResult {
        let _ = (session, message);
        Ok(())
    }

    /// Observability hook fired before each reconnect attempt's backoff sleep.
    async fn on_retry(&self, info: &RetryInfo) -> HookResult {
        let _ = info;
        Ok(())
    }
}

/// Dispatcher that ignores every hook; useful for tests and minimal consumers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDispatcher;

#[async_trait]
impl Dispatcher for NoopDispatcher {}
