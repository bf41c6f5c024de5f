//! Public client facade.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::dispatcher::Dispatcher;
use crate::error::WsError;
use crate::policy::{RetryPolicy, SawtoothBackoff};
use crate::runner::{RetryingRunner, TerminalStatus};
use crate::session::{ConnectionSession, RunState, SessionHandle, SessionShared};
use crate::transport::{Message, Transport, WsTransport};

/// Reconnecting WebSocket client.
///
/// Wraps a [`ConnectionSession`] and a [`RetryingRunner`]: [`Self::start`]
/// runs the connect/receive/disconnect cycle and reconnects after transport
/// failures according to the retry policy (sawtooth backoff by default) until
/// stopped, cancelled, or the policy gives up.
///
/// # Example
///
/// ```no_run
/// use ws_reconnect::{Client, Dispatcher, HookResult, Message, SessionHandle};
/// use async_trait::async_trait;
///
/// struct Echo;
///
/// #[async_trait]
/// impl Dispatcher for Echo {
///     async fn on_connect(&self, session: &SessionHandle) -> HookResult {
///         session.send(Message::text("hello")).await?;
///         Ok(())
///     }
///
///     async fn on_message(&self, session: &SessionHandle, message: Message) -> HookResult {
///         session.send(message).await?;
///         Ok(())
///     }
/// }
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = Client::new("wss://echo.example.com", Echo);
///     let status = client.start().await?;
///     println!("client ended: {status:?}");
///     Ok(())
/// }
/// ```
pub struct Client<D, T = WsTransport>
where
    D: Dispatcher,
    T: Transport,
{
    runner: RetryingRunner<T, D>,
}

impl<D> Client<D, WsTransport>
where
    D: Dispatcher,
{
    /// Create a client with the default tungstenite transport and the default
    /// sawtooth retry policy.
    pub fn new<S: Into<String>>(endpoint: S, dispatcher: D) -> Self {
        Self::with_transport(endpoint, dispatcher, WsTransport)
    }
}

impl<D, T> Client<D, T>
where
    D: Dispatcher,
    T: Transport,
{
    /// Create a client over a custom transport.
    pub fn with_transport<S: Into<String>>(endpoint: S, dispatcher: D, transport: T) -> Self {
        let shared = Arc::new(SessionShared::new(
            CancellationToken::new(),
            CancellationToken::new(),
        ));
        let session = ConnectionSession::from_parts(
            endpoint.into(),
            Arc::new(transport),
            Arc::new(dispatcher),
            shared,
        );
        let policy: Option<Arc<dyn RetryPolicy>> = Some(Arc::new(SawtoothBackoff::default()));
        Self {
            runner: RetryingRunner::new(session, policy),
        }
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_policy<P: RetryPolicy>(mut self, policy: P) -> Self {
        self.runner.set_policy(Some(Arc::new(policy)));
        self
    }

    /// Disable retry entirely: a single attempt runs, and a recoverable
    /// failure stops the client permanently.
    #[must_use]
    pub fn without_retry(mut self) -> Self {
        self.runner.set_policy(None);
        self
    }

    /// Run until stopped, cancelled, aborted by the retry policy, or a fatal
    /// fault occurs.
    ///
    /// Blocking in the async sense: the future resolves only at a terminal
    /// outcome. Fatal dispatcher faults are the only `Err` case; every other
    /// ending is a [`TerminalStatus`].
    pub async fn start(&self) -> Result<TerminalStatus, WsError> {
        self.runner.run().await
    }

    /// Request a graceful stop. Idempotent; interrupts whichever suspension
    /// point is active (connect, receive, backoff sleep).
    pub fn stop(&self) {
        self.runner.session().shared().stop.cancel();
    }

    /// Token for hard cancellation, reported as
    /// [`TerminalStatus::Cancelled`] rather than `Stopped`.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.runner.session().shared().cancel.clone()
    }

    /// Send a message over the live connection.
    ///
    /// May be called from any task while the receive loop is running. Fails
    /// with [`WsError::NotConnected`] when no connection is established.
    pub async fn send(&self, message: Message) -> Result<(), WsError> {
        self.runner.session().send(message).await
    }

    /// Current observable state.
    #[must_use]
    pub fn state(&self) -> RunState {
        self.runner.session().shared().state()
    }

    /// Subscribe to state changes; useful for detecting reconnections.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<RunState> {
        self.runner.session().shared().state_receiver()
    }

    /// Non-owning handle usable from other tasks and from dispatcher hooks.
    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        self.runner.session().handle()
    }
}
