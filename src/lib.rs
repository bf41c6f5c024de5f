#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod policy;
pub mod runner;
pub mod session;
pub mod transport;

pub use client::Client;
pub use config::{ReconnectConfig, RetryConfig};
pub use dispatcher::{Dispatcher, HookResult, NoopDispatcher};
pub use error::{BoxError, WsError};
pub use policy::{ExponentialRetry, RetryDecision, RetryInfo, RetryPolicy, SawtoothBackoff};
pub use runner::{RetryingRunner, TerminalStatus};
pub use session::{ConnectionSession, RunState, SessionEnd, SessionHandle};
pub use transport::{
    Connection, ConnectionReader, ConnectionWriter, Message, Transport, WsTransport,
};

pub type Result<T> = std::result::Result<T, WsError>;
