use std::error::Error as StdError;
use std::fmt;

/// Boxed error produced by dispatcher hooks or wrapped transport failures.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// WebSocket client error variants.
///
/// Transport-layer failures ([`Transport`](Self::Transport) and
/// [`ConnectionClosed`](Self::ConnectionClosed)) are recoverable: the retry
/// policy decides whether another attempt is made. Everything else is fatal and
/// bypasses the retry policy entirely.
#[non_exhaustive]
#[derive(Debug)]
pub enum WsError {
    /// Error connecting to or communicating with the WebSocket server
    Transport(BoxError),
    /// WebSocket connection was closed by the peer or the transport
    ConnectionClosed,
    /// Operation requires a live connection but none is established
    NotConnected,
    /// A dispatcher hook failed
    Dispatcher(BoxError),
}

impl WsError {
    /// Wrap a transport-layer failure.
    pub fn transport<E>(source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Transport(Box::new(source))
    }

    /// Whether this failure should be offered to the retry policy.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::ConnectionClosed)
    }
}

impl fmt::Display for WsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "WebSocket transport error: {e}"),
            Self::ConnectionClosed => write!(f, "WebSocket connection closed"),
            Self::NotConnected => write!(f, "WebSocket is not connected"),
            Self::Dispatcher(e) => write!(f, "Dispatcher hook failed: {e}"),
        }
    }
}

impl StdError for WsError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Transport(e) | Self::Dispatcher(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_and_closed_are_recoverable() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(WsError::transport(io).is_recoverable());
        assert!(WsError::ConnectionClosed.is_recoverable());
    }

    #[test]
    fn dispatcher_and_not_connected_are_fatal() {
        let hook: BoxError = "hook blew up".into();
        assert!(!WsError::Dispatcher(hook).is_recoverable());
        assert!(!WsError::NotConnected.is_recoverable());
    }

    #[test]
    fn display_includes_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let error = WsError::transport(io);
        assert!(error.to_string().contains("refused"));
    }
}
