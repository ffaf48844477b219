//! Close-status codes, ported from `original_source/source/websocketprotocol.h`'s
//! `WebSocketProtocol::CloseCode` enum and `isCloseCodeValid` predicate.

/// A WebSocket close status code (RFC 6455 §7.4).
///
/// `Known` covers the constants the RFC defines; `Other` carries any other
/// code in the valid-on-the-wire range (including the application-defined
/// `3000..=4999` range). Values outside the valid range never reach this
/// type — `CloseCode::try_from` rejects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    Normal,
    GoingAway,
    ProtocolError,
    UnsupportedData,
    BadPayload,
    PolicyViolation,
    MessageTooBig,
    MissingExtension,
    InternalError,
    TlsHandshakeFailed,
    /// Never sent on the wire — synthesized locally when a connection drops
    /// without a close handshake (spec §7). Code 1006.
    AbnormalDisconnection,
    Other(u16),
}

impl CloseCode {
    pub const NORMAL: u16 = 1000;
    pub const GOING_AWAY: u16 = 1001;
    pub const PROTOCOL_ERROR: u16 = 1002;
    pub const UNSUPPORTED_DATA: u16 = 1003;
    pub const RESERVED_1004: u16 = 1004;
    pub const MISSING_STATUS: u16 = 1005;
    pub const ABNORMAL_DISCONNECTION: u16 = 1006;
    pub const BAD_PAYLOAD: u16 = 1007;
    pub const POLICY_VIOLATION: u16 = 1008;
    pub const MESSAGE_TOO_BIG: u16 = 1009;
    pub const MISSING_EXTENSION: u16 = 1010;
    pub const INTERNAL_ERROR: u16 = 1011;
    pub const TLS_HANDSHAKE_FAILED: u16 = 1015;

    pub fn as_u16(self) -> u16 {
        match self {
            CloseCode::Normal => Self::NORMAL,
            CloseCode::GoingAway => Self::GOING_AWAY,
            CloseCode::ProtocolError => Self::PROTOCOL_ERROR,
            CloseCode::UnsupportedData => Self::UNSUPPORTED_DATA,
            CloseCode::BadPayload => Self::BAD_PAYLOAD,
            CloseCode::PolicyViolation => Self::POLICY_VIOLATION,
            CloseCode::MessageTooBig => Self::MESSAGE_TOO_BIG,
            CloseCode::MissingExtension => Self::MISSING_EXTENSION,
            CloseCode::InternalError => Self::INTERNAL_ERROR,
            CloseCode::TlsHandshakeFailed => Self::TLS_HANDSHAKE_FAILED,
            CloseCode::AbnormalDisconnection => Self::ABNORMAL_DISCONNECTION,
            CloseCode::Other(code) => code,
        }
    }

    pub fn from_u16(code: u16) -> Self {
        match code {
            Self::NORMAL => CloseCode::Normal,
            Self::GOING_AWAY => CloseCode::GoingAway,
            Self::PROTOCOL_ERROR => CloseCode::ProtocolError,
            Self::UNSUPPORTED_DATA => CloseCode::UnsupportedData,
            Self::BAD_PAYLOAD => CloseCode::BadPayload,
            Self::POLICY_VIOLATION => CloseCode::PolicyViolation,
            Self::MESSAGE_TOO_BIG => CloseCode::MessageTooBig,
            Self::MISSING_EXTENSION => CloseCode::MissingExtension,
            Self::INTERNAL_ERROR => CloseCode::InternalError,
            Self::TLS_HANDSHAKE_FAILED => CloseCode::TlsHandshakeFailed,
            Self::ABNORMAL_DISCONNECTION => CloseCode::AbnormalDisconnection,
            other => CloseCode::Other(other),
        }
    }

    /// True for codes that may legally appear on the wire, per RFC 6455 §7.4.1.
    /// 1004, 1005, 1006 are reserved for local use and must never be sent;
    /// everything in `1000..=4999` other than those three, and excluding the
    /// unassigned `1011..=2999` gap above the defined constants, is valid.
    pub fn is_valid_on_wire(code: u16) -> bool {
        (1000..5000).contains(&code)
            && code != Self::RESERVED_1004
            && code != Self::MISSING_STATUS
            && code != Self::ABNORMAL_DISCONNECTION
            && (code >= 3000 || code < 1012)
    }
}
