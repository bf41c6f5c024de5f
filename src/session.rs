//! Single-attempt connection lifecycle.
//!
//! A [`ConnectionSession`] owns exactly one attempt at a time: connect, fire
//! the dispatcher hooks in order, pump the receive loop, and tear down. The
//! retry driver in [`crate::runner`] composes repeated attempts on top.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;

use crate::dispatcher::Dispatcher;
use crate::error::WsError;
use crate::transport::{Connection as _, ConnectionReader, ConnectionWriter, Message, Transport};

/// Observable client state, published through a watch channel.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No connection and no attempt in progress
    Idle,
    /// Handshake in progress
    Connecting,
    /// Connected; the receive loop is pumping messages
    Running,
    /// Teardown in progress
    Disconnecting,
    /// Terminal: stopped by request (or cancelled)
    Stopped,
    /// Terminal: the retry policy declined to continue
    Aborted,
}

/// How a receive loop ended when no error occurred.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Graceful stop was requested
    Stopped,
    /// Hard cancellation was requested
    Cancelled,
}

/// State shared between the session, its handle, and the retry driver.
pub(crate) struct SessionShared {
    writer: Mutex<Option<Box<dyn ConnectionWriter>>>,
    reader: Mutex<Option<Box<dyn ConnectionReader>>>,
    running: AtomicBool,
    pub(crate) stop: CancellationToken,
    pub(crate) cancel: CancellationToken,
    state: watch::Sender<RunState>,
}

impl SessionShared {
    pub(crate) fn new(stop: CancellationToken, cancel: CancellationToken) -> Self {
        let (state, _) = watch::channel(RunState::Idle);
        Self {
            writer: Mutex::new(None),
            reader: Mutex::new(None),
            running: AtomicBool::new(false),
            stop,
            cancel,
            state,
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn set_state(&self, state: RunState) {
        let _ = self.state.send_replace(state);
    }

    pub(crate) fn state(&self) -> RunState {
        *self.state.borrow()
    }

    pub(crate) fn state_receiver(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    async fn install(
        &self,
        writer: Box<dyn ConnectionWriter>,
        reader: Box<dyn ConnectionReader>,
    ) {
        *self.writer.lock().await = Some(writer);
        *self.reader.lock().await = Some(reader);
    }

    async fn has_connection(&self) -> bool {
        self.writer.lock().await.is_some()
    }

    /// Drop the reader half and close the writer half. Safe to call when no
    /// connection is installed, and safe to call twice.
    async fn close_transport(&self) {
        self.reader.lock().await.take();
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.close().await {
                #[cfg(feature = "tracing")]
                tracing::debug!(error = %e, "Error closing transport");
                #[cfg(not(feature = "tracing"))]
                let _ = &e;
            }
        }
    }
}

/// Non-owning handle into a live session.
///
/// Passed to every dispatcher hook so hook code can call back into the
/// session (typically to send a subscription message from `on_connect`)
/// without holding an owning reference.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<SessionShared>,
}

impl SessionHandle {
    /// Send a message over the live connection.
    ///
    /// Fails with [`WsError::NotConnected`] before a successful connect or
    /// after disconnect; the message is never silently dropped.
    pub async fn send(&self, message: Message) -> Result<(), WsError> {
        let mut writer = self.shared.writer.lock().await;
        match writer.as_mut() {
            Some(w) => w.send(message).await,
            None => Err(WsError::NotConnected),
        }
    }

    /// Whether the session is in the `Running` state.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Request a graceful stop of the whole client. Idempotent.
    pub fn stop(&self) {
        self.shared.stop.cancel();
    }

    /// Current observable state.
    #[must_use]
    pub fn state(&self) -> RunState {
        self.shared.state()
    }
}

/// Manages one connection attempt's lifecycle from connect to terminal close,
/// firing dispatcher hooks in a fixed order.
///
/// At most one live connection exists per session at any time; a new attempt
/// may not begin until the previous connection is fully closed and its
/// disconnect hooks have completed ([`Self::run_once`] enforces this).
pub struct ConnectionSession<T, D>
where
    T: Transport,
    D: Dispatcher,
{
    endpoint: String,
    transport: Arc<T>,
    dispatcher: Arc<D>,
    shared: Arc<SessionShared>,
}

impl<T, D> ConnectionSession<T, D>
where
    T: Transport,
    D: Dispatcher,
{
    /// Create a standalone session (single attempt, no retry driver).
    pub fn new<S: Into<String>>(endpoint: S, transport: T, dispatcher: D) -> Self {
        Self::from_parts(
            endpoint.into(),
            Arc::new(transport),
            Arc::new(dispatcher),
            Arc::new(SessionShared::new(
                CancellationToken::new(),
                CancellationToken::new(),
            )),
        )
    }

    pub(crate) fn from_parts(
        endpoint: String,
        transport: Arc<T>,
        dispatcher: Arc<D>,
        shared: Arc<SessionShared>,
    ) -> Self {
        Self {
            endpoint,
            transport,
            dispatcher,
            shared,
        }
    }

    /// Handle for sending and stopping; the same handle hooks receive.
    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub(crate) fn shared(&self) -> &Arc<SessionShared> {
        &self.shared
    }

    pub(crate) fn dispatcher(&self) -> &Arc<D> {
        &self.dispatcher
    }

    /// Open the connection and bring the session into the `Running` state.
    ///
    /// Hook order: `before_connect`, transport handshake, `on_connect`.
    /// A failure in `before_connect` or the handshake propagates before
    /// `on_connect` fires. A failure in `on_connect` closes the half-open
    /// transport without firing disconnect hooks, since the attempt never
    /// reached `Running`.
    pub async fn connect(&self) -> Result<(), WsError> {
        let handle = self.handle();
        self.shared.set_state(RunState::Connecting);

        if let Err(e) = self.dispatcher.before_connect(&handle).await {
            self.shared.set_state(RunState::Idle);
            return Err(WsError::Dispatcher(e));
        }

        let connection = match self.transport.connect(&self.endpoint).await {
            Ok(connection) => connection,
            Err(e) => {
                self.shared.set_state(RunState::Idle);
                return Err(e);
            }
        };
        let (writer, reader) = connection.split();
        self.shared.install(Box::new(writer), Box::new(reader)).await;

        if let Err(e) = self.dispatcher.on_connect(&handle).await {
            self.shared.close_transport().await;
            self.shared.set_state(RunState::Idle);
            return Err(WsError::Dispatcher(e));
        }

        self.shared.running.store(true, Ordering::SeqCst);
        self.shared.set_state(RunState::Running);

        #[cfg(feature = "tracing")]
        tracing::debug!(endpoint = %self.endpoint, "WebSocket connected");

        Ok(())
    }

    /// Tear the session down: clear the running flag, fire
    /// `before_disconnect`, close the transport, fire `on_disconnect`.
    ///
    /// The running flag flips before the close so a concurrently observing
    /// receive loop exits cleanly instead of racing the close. The transport
    /// is closed even when `before_disconnect` faults. Calling this when
    /// nothing is connected is a no-op, so repeated stops never fire
    /// duplicate disconnect hooks.
    pub async fn disconnect(&self) -> Result<(), WsError> {
        let was_running = self.shared.running.swap(false, Ordering::SeqCst);
        if !was_running && !self.shared.has_connection().await {
            return Ok(());
        }

        self.shared.set_state(RunState::Disconnecting);
        let handle = self.handle();
        let before = self.dispatcher.before_disconnect(&handle).await;
        self.shared.close_transport().await;

        let result = match before {
            Err(e) => Err(WsError::Dispatcher(e)),
            Ok(()) => self
                .dispatcher
                .on_disconnect(&handle)
                .await
                .map_err(WsError::Dispatcher),
        };
        self.shared.set_state(RunState::Idle);

        #[cfg(feature = "tracing")]
        tracing::debug!(endpoint = %self.endpoint, "WebSocket disconnected");

        result
    }

    /// Send a message over the live connection.
    pub async fn send(&self, message: Message) -> Result<(), WsError> {
        self.handle().send(message).await
    }

    /// Attempt to read one message, waiting at most `duration`.
    ///
    /// `Ok(None)` means no message arrived in time; that is a liveness probe
    /// result, not a failure, and the next call proceeds normally.
    pub async fn receive_with_timeout(
        &self,
        duration: Duration,
    ) -> Result<Option<Message>, WsError> {
        let mut guard = self.shared.reader.lock().await;
        let Some(reader) = guard.as_mut() else {
            return Err(WsError::NotConnected);
        };
        match tokio::time::timeout(duration, reader.receive()).await {
            Ok(received) => received.map(Some),
            Err(_elapsed) => Ok(None),
        }
    }

    /// Block on receive and dispatch each message synchronously, in arrival
    /// order, until stopped, cancelled, or the connection fails.
    ///
    /// No receive timeout is applied: idle connections are intentionally not
    /// torn down.
    async fn receive_loop(&self) -> Result<SessionEnd, WsError> {
        let handle = self.handle();
        let mut guard = self.shared.reader.lock().await;
        loop {
            if !self.shared.is_running() {
                return Ok(SessionEnd::Stopped);
            }
            let Some(reader) = guard.as_mut() else {
                return Err(WsError::NotConnected);
            };
            tokio::select! {
                () = self.shared.stop.cancelled() => return Ok(SessionEnd::Stopped),
                () = self.shared.cancel.cancelled() => return Ok(SessionEnd::Cancelled),
                received = reader.receive() => {
                    let message = received?;
                    self.dispatcher
                        .on_message(&handle, message)
                        .await
                        .map_err(WsError::Dispatcher)?;
                }
            }
        }
    }

    /// Run one full attempt: connect, pump the receive loop, and disconnect
    /// exactly once on every path that reached `Running`.
    ///
    /// The terminating condition (closure, transport failure, dispatcher
    /// fault) is surfaced to the caller for classification after cleanup has
    /// completed. A hook fault during cleanup outranks the recoverable
    /// failure that ended the loop: the fault is a bug and must not be
    /// retried away.
    pub async fn run_once(&self) -> Result<SessionEnd, WsError> {
        tokio::select! {
            () = self.shared.stop.cancelled() => {
                self.shared.close_transport().await;
                return Ok(SessionEnd::Stopped);
            }
            () = self.shared.cancel.cancelled() => {
                self.shared.close_transport().await;
                return Ok(SessionEnd::Cancelled);
            }
            connected = self.connect() => connected?,
        }

        let outcome = self.receive_loop().await;
        let cleanup = self.disconnect().await;
        match (outcome, cleanup) {
            (Ok(end), Ok(())) => Ok(end),
            (Ok(_), Err(cleanup_error)) => Err(cleanup_error),
            (Err(error), Ok(())) => Err(error),
            (Err(error), Err(cleanup_error)) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %error, "Connection failure superseded by disconnect hook fault");
                #[cfg(not(feature = "tracing"))]
                let _ = &error;
                Err(cleanup_error)
            }
        }
    }
}
