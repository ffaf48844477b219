//! Typed public event surface (spec §4.7/§6).
//!
//! The teacher funnels every connection's activity through one
//! `Event::{NewClient,NewMessage,Disconnect,Error}` enum keyed by a generated
//! UUID. That shape doesn't separate per-connection notifications from
//! per-server notifications, and needs an ID because connections are handed
//! out by reference through a channel. Once the server hands ownership of
//! each `Connection` to the caller directly (`next_pending_connection`, see
//! `server.rs`), the per-connection events can live on the connection itself
//! and no ID is needed; this module keeps only the split into
//! `ConnectionEvent` / `ServerEvent` spec §6 calls for.

use crate::close::CloseCode;
use crate::error::Error;
use crate::message::Message;
use std::time::Duration;

/// Events a single connection's read loop can raise.
#[derive(Debug)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
    TextMessageReceived(String),
    BinaryMessageReceived(Vec<u8>),
    /// A single text fragment, as it arrives, before the message is complete.
    TextFrameReceived { payload: String, is_last_frame: bool },
    /// A single binary fragment, as it arrives, before the message is complete.
    BinaryFrameReceived { payload: Vec<u8>, is_last_frame: bool },
    Ping(Vec<u8>),
    /// A Pong was received; `elapsed` is the round-trip time since the
    /// matching `ping()` call, if one is tracked (SPEC_FULL §B).
    Pong { payload: Vec<u8>, elapsed: Option<Duration> },
    BytesWritten(usize),
    Error(Error),
    SslErrors(String),
    ProxyAuthenticationRequired,
    /// The connection was closed; carries the close code/reason if the peer
    /// sent one.
    Closed { code: Option<CloseCode>, reason: String },
}

impl ConnectionEvent {
    pub fn from_message(message: Message) -> Self {
        match message {
            Message::Text(text) => ConnectionEvent::TextMessageReceived(text),
            Message::Binary(data) => ConnectionEvent::BinaryMessageReceived(data),
        }
    }
}

/// Events the listener raises, independent of any one connection.
#[derive(Debug)]
pub enum ServerEvent {
    /// A handshake completed and a connection is now available via
    /// `Server::next_pending_connection`.
    NewConnection,
    Closed,
    /// An accept-loop level failure; `None` close code means no peer was
    /// involved (e.g. the listening socket itself failed).
    ServerError(Option<CloseCode>),
    AcceptError(Error),
    OriginAuthenticationRequired { origin: String },
    PeerVerifyError(String),
    SslErrors(String),
    PreSharedKeyAuthenticationRequired,
}
