//! Configuration types (spec §3/§4.6, SPEC_FULL §A/§B).
//!
//! Extends the teacher's `ServerConfig`/`ClientConfig`/`WebSocketConfig` with
//! the pending-connection queue depth, handshake timeout, subprotocol list,
//! origin hook, and client-side proxy placeholder the full engine needs.

use rustls::ServerConfig as RustlsConfig;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Frame/message size limits shared by client and server connections.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    pub max_frame_size: usize,
    pub max_message_size: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        WebSocketConfig {
            max_message_size: 64 << 20,
            max_frame_size: 64 << 10,
        }
    }
}

/// Opaque proxy description a caller's transport layer can act on. The
/// library never dials a proxy itself (see SPEC_FULL §B); this only carries
/// the information through to wherever the `TcpStream` gets constructed.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Clone, Default)]
pub struct ClientConfig {
    pub web_socket_config: WebSocketConfig,
    pub ca_file: Option<String>,
    pub proxy: Option<ProxyConfig>,
    pub handshake_timeout: Option<Duration>,
    /// Subprotocols offered to the server, in preference order (spec §4.3 /
    /// S4: the server picks its most preferred match from this list).
    pub subprotocols: Vec<String>,
    /// Value sent as the `Origin` header on the client's upgrade request
    /// (spec §4.3's client-request template; §3's data model lists "the
    /// request URL / Origin" as state the `Connection` carries). `None`
    /// omits the header.
    pub origin: Option<String>,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("web_socket_config", &self.web_socket_config)
            .field("ca_file", &self.ca_file)
            .field("proxy", &self.proxy)
            .field("subprotocols", &self.subprotocols)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("origin", &self.origin)
            .finish()
    }
}

/// Hook called with the value of the `Origin` header (empty string if the
/// header was absent). Returning `false` rejects the handshake with HTTP 403
/// and emits `ServerEvent::OriginAuthenticationRequired` (SPEC_FULL §B).
pub type OriginFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct ServerConfig {
    pub web_socket_config: WebSocketConfig,
    pub tls_config: Option<Arc<RustlsConfig>>,
    pub max_pending_connections: usize,
    pub handshake_timeout: Duration,
    pub supported_subprotocols: Vec<String>,
    pub origin_filter: Option<OriginFilter>,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("web_socket_config", &self.web_socket_config)
            .field("tls_config", &self.tls_config.is_some())
            .field("max_pending_connections", &self.max_pending_connections)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("supported_subprotocols", &self.supported_subprotocols)
            .field("origin_filter", &self.origin_filter.is_some())
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            web_socket_config: WebSocketConfig::default(),
            tls_config: None,
            max_pending_connections: 30,
            handshake_timeout: Duration::from_secs(5),
            supported_subprotocols: Vec::new(),
            origin_filter: None,
        }
    }
}
