use crate::close::CloseCode;
use httparse::Error as HttpParseError;
use std::io;
use std::string::FromUtf8Error;
use thiserror::Error;
use tokio::sync::mpsc::error::SendError;
use tokio::time::error::Elapsed;
use url::ParseError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{source}")]
    IOError {
        #[from]
        source: io::Error,
    },

    #[error("{source}")]
    Timeout {
        #[from]
        source: Elapsed,
    },

    #[error("channel communication error")]
    CommunicationError,

    #[error("{source}")]
    FromUtf8Error {
        #[from]
        source: FromUtf8Error,
    },

    #[error("invalid UTF-8 in text message")]
    InvalidUtf8,

    // Handshake errors
    #[error("invalid HTTP handshake request line")]
    InvalidHTTPHandshake,

    #[error("Connection: Upgrade header missing in the request")]
    NoConnectionHeaderPresent,

    #[error("Upgrade: websocket header missing in the request")]
    NoUpgradeHeaderPresent,

    #[error("Host header missing in the request")]
    NoHostHeaderPresent,

    #[error("Sec-WebSocket-Key header missing in the request")]
    NoSecWebsocketKey,

    #[error("server didn't upgrade the connection")]
    NoUpgrade,

    #[error("server sent an invalid Sec-WebSocket-Accept value")]
    InvalidAcceptKey,

    #[error("server rejected handshake with unsupported version, supported: {supported:?}")]
    UnsupportedVersion { supported: Vec<u8> },

    #[error("handshake failed with HTTP status {0}")]
    HandshakeFailed(u16),

    #[error("handshake did not complete within the configured timeout")]
    HandshakeTimeout,

    #[error("origin rejected by server authentication hook")]
    OriginRejected,

    // Framing errors
    #[error("RSV bit set without a negotiated extension")]
    RSVNotZero,

    #[error("control frames must not be fragmented")]
    ControlFramesFragmented,

    #[error("control frame payload exceeds 125 bytes")]
    ControlFramePayloadSize,

    #[error("fragment_size: `{0}` can't be greater than max_frame_size: `{1}`")]
    CustomFragmentSizeExceeded(usize, usize),

    #[error("max frame size exceeded")]
    MaxFrameSize,

    #[error("max message size exceeded")]
    MaxMessageSize,

    #[error("invalid frame while a fragmented message is in progress")]
    InvalidFrameFragmentation,

    #[error("fragmented message already in progress")]
    FragmentedInProgress,

    #[error("invalid continuation frame: no fragmented message to continue")]
    InvalidContinuationFrame,

    #[error("invalid opcode")]
    InvalidOpcode,

    #[error("invalid close code: {0}")]
    InvalidCloseCode(u16),

    // HTTP / URL errors
    #[error("{source}")]
    URLParseError {
        #[from]
        source: ParseError,
    },

    #[error("invalid scheme in WebSocket URL")]
    InvalidSchemeURL,

    #[error("URL has no host")]
    URLNoHost,

    #[error("{source}")]
    HttpParseError {
        #[from]
        source: HttpParseError,
    },

    #[error("incomplete HTTP request")]
    IncompleteHTTPRequest,

    #[error("invalid HTTP request line")]
    InvalidHTTPRequestLine,

    #[error("missing HTTP method")]
    MissingHTTPMethod,

    #[error("method must be GET")]
    InvalidHTTPMethod,

    #[error("use_tls = `{0}` argument does not match the passed URL scheme: `{1}`")]
    SchemeAgainstTlsConfig(bool, String),

    #[error("TLS error: {0}")]
    TlsError(String),

    #[error("connection closed with code {0:?}: {1}")]
    Closed(CloseCode, String),

    #[error("{source}")]
    SendError {
        #[from]
        source: SendError<crate::message::Message>,
    },
}
