//! Transport capability consumed by the session.
//!
//! The session treats the transport as opaque: open a connection to a URL,
//! split it into one reader and one writer half, receive and send whole
//! messages, close idempotently. The default implementation is backed by
//! tokio-tungstenite; framing, TLS, and ping/pong stay behind this boundary.

use async_trait::async_trait;
use futures::StreamExt as _;
use futures::stream::{SplitSink, SplitStream};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Error as TungsteniteError;
use tokio_tungstenite::tungstenite::Message as WireMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::error::WsError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opaque message payload exchanged with the remote endpoint.
///
/// Encoding and application-level semantics are the caller's concern.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Binary(Vec<u8>),
}

impl Message {
    #[must_use]
    pub fn text<S: Into<String>>(value: S) -> Self {
        Self::Text(value.into())
    }
}

/// Capability to open a connection to an endpoint URL.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Conn: Connection;

    /// Open a connection, completing the handshake.
    async fn connect(&self, url: &str) -> Result<Self::Conn, WsError>;
}

/// A live duplex connection, split into its reader and writer halves.
///
/// The split enforces the concurrency discipline: one reader (the receive
/// loop), one writer (serialized behind the session's lock), and close only
/// from the owning flow.
pub trait Connection: Send + 'static {
    type Reader: ConnectionReader;
    type Writer: ConnectionWriter;

    fn split(self) -> (Self::Writer, Self::Reader);
}

/// Reading half of a connection.
#[async_trait]
pub trait ConnectionReader: Send + 'static {
    /// Wait for the next message.
    ///
    /// Returns [`WsError::ConnectionClosed`] when the peer or the transport
    /// closes the stream.
    async fn receive(&mut self) -> Result<Message, WsError>;
}

/// Writing half of a connection.
#[async_trait]
pub trait ConnectionWriter: Send + 'static {
    async fn send(&mut self, message: Message) -> Result<(), WsError>;

    /// Close the connection. Closing an already-closed connection is a no-op.
    async fn close(&mut self) -> Result<(), WsError>;
}

fn map_wire_error(error: TungsteniteError) -> WsError {
    match error {
        TungsteniteError::ConnectionClosed | TungsteniteError::AlreadyClosed => {
            WsError::ConnectionClosed
        }
        other => WsError::transport(other),
    }
}

/// Default WebSocket transport backed by tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    type Conn = WsConnection;

    async fn connect(&self, url: &str) -> Result<WsConnection, WsError> {
        let (stream, _response) = connect_async(url).await.map_err(WsError::transport)?;
        Ok(WsConnection { inner: stream })
    }
}

/// A live tungstenite connection, hidden behind the [`Connection`] capability.
pub struct WsConnection {
    inner: WsStream,
}

impl Connection for WsConnection {
    type Reader = WsReader;
    type Writer = WsWriter;

    fn split(self) -> (WsWriter, WsReader) {
        let (sink, stream) = self.inner.split();
        (WsWriter { sink }, WsReader { stream })
    }
}

pub struct WsReader {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl ConnectionReader for WsReader {
    async fn receive(&mut self) -> Result<Message, WsError> {
        loop {
            match self.stream.next().await {
                None => return Err(WsError::ConnectionClosed),
                Some(Ok(WireMessage::Text(text))) => {
                    return Ok(Message::Text(text.as_str().to_owned()));
                }
                Some(Ok(WireMessage::Binary(bytes))) => {
                    return Ok(Message::Binary(bytes.to_vec()));
                }
                Some(Ok(WireMessage::Close(_))) => return Err(WsError::ConnectionClosed),
                // Ping/pong replies are handled by tungstenite itself.
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(map_wire_error(e)),
            }
        }
    }
}

pub struct WsWriter {
    sink: SplitSink<WsStream, WireMessage>,
}

#[async_trait]
impl ConnectionWriter for WsWriter {
    async fn send(&mut self, message: Message) -> Result<(), WsError> {
        use futures::SinkExt as _;

        let wire = match message {
            Message::Text(text) => WireMessage::Text(text.into()),
            Message::Binary(bytes) => WireMessage::Binary(bytes.into()),
        };
        self.sink.send(wire).await.map_err(map_wire_error)
    }

    async fn close(&mut self) -> Result<(), WsError> {
        use futures::SinkExt as _;

        match self.sink.close().await {
            Ok(())
            | Err(TungsteniteError::ConnectionClosed | TungsteniteError::AlreadyClosed) => Ok(()),
            Err(e) => Err(WsError::transport(e)),
        }
    }
}

/// Channel-backed transport for exercising the lifecycle without a socket.
#[cfg(test)]
pub(crate) mod mock {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};

    use tokio::sync::mpsc;

    use super::*;

    type Event = Result<Message, WsError>;

    enum Script {
        Accept {
            events: mpsc::UnboundedReceiver<Event>,
            sent: Arc<Mutex<Vec<Message>>>,
            closed: Arc<AtomicBool>,
        },
        Refuse,
    }

    /// Test-side handle to one scripted connection.
    pub(crate) struct MockRemote {
        events: mpsc::UnboundedSender<Event>,
        sent: Arc<Mutex<Vec<Message>>>,
        closed: Arc<AtomicBool>,
    }

    impl MockRemote {
        pub(crate) fn push_text(&self, text: &str) {
            let _ = self.events.send(Ok(Message::text(text)));
        }

        pub(crate) fn push_close(&self) {
            let _ = self.events.send(Err(WsError::ConnectionClosed));
        }

        pub(crate) fn sent(&self) -> Vec<Message> {
            self.sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        pub(crate) fn was_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    pub(crate) struct MockTransport {
        scripts: Mutex<VecDeque<Script>>,
        connects: AtomicU32,
    }

    impl MockTransport {
        pub(crate) fn new() -> Self {
            Self {
                scripts: Mutex::new(VecDeque::new()),
                connects: AtomicU32::new(0),
            }
        }

        /// Queue a connection attempt that succeeds; returns the remote end.
        pub(crate) fn accept(&self) -> MockRemote {
            let (events_tx, events_rx) = mpsc::unbounded_channel();
            let sent = Arc::new(Mutex::new(Vec::new()));
            let closed = Arc::new(AtomicBool::new(false));
            self.scripts
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_back(Script::Accept {
                    events: events_rx,
                    sent: Arc::clone(&sent),
                    closed: Arc::clone(&closed),
                });
            MockRemote {
                events: events_tx,
                sent,
                closed,
            }
        }

        /// Queue a connection attempt that fails at the handshake.
        pub(crate) fn refuse(&self) {
            self.scripts
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_back(Script::Refuse);
        }

        pub(crate) fn connect_count(&self) -> u32 {
            self.connects.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        type Conn = MockConnection;

        async fn connect(&self, _url: &str) -> Result<MockConnection, WsError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let script = self
                .scripts
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            match script {
                Some(Script::Accept {
                    events,
                    sent,
                    closed,
                }) => Ok(MockConnection {
                    reader: MockReader { events },
                    writer: MockWriter { sent, closed },
                }),
                Some(Script::Refuse) | None => Err(WsError::transport(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "mock refused connection",
                ))),
            }
        }
    }

    pub(crate) struct MockConnection {
        reader: MockReader,
        writer: MockWriter,
    }

    impl Connection for MockConnection {
        type Reader = MockReader;
        type Writer = MockWriter;

        fn split(self) -> (MockWriter, MockReader) {
            (self.writer, self.reader)
        }
    }

    pub(crate) struct MockReader {
        events: mpsc::UnboundedReceiver<Event>,
    }

    #[async_trait]
    impl ConnectionReader for MockReader {
        async fn receive(&mut self) -> Result<Message, WsError> {
            match self.events.recv().await {
                Some(event) => event,
                None => Err(WsError::ConnectionClosed),
            }
        }
    }

    pub(crate) struct MockWriter {
        sent: Arc<Mutex<Vec<Message>>>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl ConnectionWriter for MockWriter {
        async fn send(&mut self, message: Message) -> Result<(), WsError> {
            if self.closed.load(Ordering::SeqCst) {
                return Err(WsError::ConnectionClosed);
            }
            self.sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(message);
            Ok(())
        }

        async fn close(&mut self) -> Result<(), WsError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }
}
