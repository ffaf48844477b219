//! Client and server handshake (spec §4.3).
//!
//! Grounded on the teacher's `handshake.rs` (`perform_handshake`,
//! `generate_websocket_accept_value`) and `request.rs`
//! (`construct_http_request`), rebuilt around `request.rs`'s `httparse`-based
//! reader instead of the teacher's raw string search for
//! `"Sec-WebSocket-Key:"`. `connect_async`/`accept_async` are the two public
//! entry points every example and fuzz target in the teacher repo already
//! names (`socket_flow::handshake::{connect_async, accept_async}`).

use crate::config::{ClientConfig, ServerConfig};
use crate::connection::{Connection, Role};
use crate::error::Error;
use crate::request::{construct_http_request, read_http_headers, write_all_flushed};
use crate::stream::SocketFlowStream;
use crate::utils::{generate_websocket_accept_value, generate_websocket_key};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig as RustlsClientConfig, RootCertStore};
use std::io::BufReader as StdBufReader;
use std::sync::Arc;
use tokio::io::{split, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::Duration;
use tokio_rustls::{TlsConnector, TlsStream};

const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens a plain `ws://` or TLS `wss://` connection and performs the client
/// handshake, using default configuration.
pub async fn connect_async(ws_url: &str) -> Result<Connection, Error> {
    connect_async_with_config(ws_url, ClientConfig::default()).await
}

pub async fn connect_async_with_config(
    ws_url: &str,
    config: ClientConfig,
) -> Result<Connection, Error> {
    let key = generate_websocket_key();
    let (request, host_with_port, host, use_tls) =
        construct_http_request(ws_url, &key, &config.subprotocols, config.origin.as_deref())?;

    if config.proxy.is_some() {
        log::debug!("proxy configured; connection dialing is left to the caller's transport");
    }

    let tcp = TcpStream::connect(&host_with_port).await?;
    let stream = if use_tls {
        SocketFlowStream::Secure(TlsStream::Client(wrap_client_tls(tcp, &host, &config).await?))
    } else {
        SocketFlowStream::Plain(tcp)
    };

    let timeout_dur = config.handshake_timeout.unwrap_or(DEFAULT_HANDSHAKE_TIMEOUT);
    let (read_half, mut write_half) = split(stream);
    let mut buf_reader = BufReader::new(read_half);
    write_all_flushed(&mut write_half, request.as_bytes()).await?;

    let headers = read_http_headers(&mut buf_reader, timeout_dur, false).await?;

    match headers.status {
        Some(101) => {}
        Some(other) => {
            if let Some(versions) = headers.header("sec-websocket-version") {
                let supported = versions
                    .split(',')
                    .filter_map(|v| v.trim().parse().ok())
                    .collect();
                return Err(Error::UnsupportedVersion { supported });
            }
            return Err(Error::HandshakeFailed(other));
        }
        None => return Err(Error::NoUpgrade),
    }

    let accept = headers
        .header("sec-websocket-accept")
        .ok_or(Error::InvalidAcceptKey)?;
    let expected = generate_websocket_accept_value(key);
    if accept != expected {
        return Err(Error::InvalidAcceptKey);
    }

    let negotiated_subprotocol = headers.header("sec-websocket-protocol").map(str::to_string);
    let origin = config.origin.clone();

    let stream = read_half_unsplit(buf_reader, write_half);
    Connection::spawn(
        stream,
        Role::Client,
        config.web_socket_config,
        negotiated_subprotocol,
        origin,
        Some(ws_url.to_string()),
    )
}

/// Reassembles a transport split across a `BufReader` and a `WriteHalf` back
/// into a single stream, the way `tokio::io::ReadHalf::unsplit` expects.
fn read_half_unsplit<T: tokio::io::AsyncRead + tokio::io::AsyncWrite>(
    buf_reader: BufReader<tokio::io::ReadHalf<T>>,
    write_half: tokio::io::WriteHalf<T>,
) -> T {
    buf_reader.into_inner().unsplit(write_half)
}

async fn wrap_client_tls(
    tcp: TcpStream,
    host: &str,
    config: &ClientConfig,
) -> Result<tokio_rustls::client::TlsStream<TcpStream>, Error> {
    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if let Some(ca_file) = &config.ca_file {
        let file = std::fs::File::open(ca_file).map_err(Error::from)?;
        let mut reader = StdBufReader::new(file);
        for cert in rustls_pemfile::certs(&mut reader) {
            let cert = cert.map_err(|e| Error::TlsError(e.to_string()))?;
            root_store
                .add(cert)
                .map_err(|e| Error::TlsError(e.to_string()))?;
        }
    }

    let tls_config = RustlsClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    let connector = TlsConnector::from(Arc::new(tls_config));
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| Error::TlsError(format!("invalid DNS name: {host}")))?;

    connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| Error::TlsError(e.to_string()))
}

/// Accepts a plain TCP connection and performs the server handshake with
/// default configuration. This is the entry point the teacher's examples
/// and fuzz target call directly.
pub async fn accept_async(stream: TcpStream) -> Result<Connection, Error> {
    accept_async_with_config(SocketFlowStream::Plain(stream), &ServerConfig::default()).await
}

/// Wraps `tcp` in TLS if `config.tls_config` is set, then performs the
/// server handshake. Grounded on the teacher's `server.rs` accept-loop TLS
/// wiring (`TlsAcceptor::from(config)` / `acceptor.accept(stream)`).
pub async fn accept_async_tls(
    tcp: TcpStream,
    config: &ServerConfig,
) -> Result<Connection, Error> {
    let stream = match &config.tls_config {
        Some(tls_config) => {
            let acceptor = tokio_rustls::TlsAcceptor::from(tls_config.clone());
            let tls_stream = acceptor
                .accept(tcp)
                .await
                .map_err(|e| Error::TlsError(e.to_string()))?;
            SocketFlowStream::Secure(TlsStream::Server(tls_stream))
        }
        None => SocketFlowStream::Plain(tcp),
    };
    accept_async_with_config(stream, config).await
}

pub async fn accept_async_with_config(
    stream: SocketFlowStream,
    config: &ServerConfig,
) -> Result<Connection, Error> {
    let (read_half, mut write_half) = split(stream);
    let mut buf_reader = BufReader::new(read_half);
    let headers = read_http_headers(&mut buf_reader, config.handshake_timeout, true).await?;

    if headers.method.as_deref() != Some("GET") {
        let _ = write_half.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n").await;
        return Err(Error::InvalidHTTPMethod);
    }

    let upgrade = headers.header("upgrade").map(str::to_ascii_lowercase);
    if upgrade.as_deref() != Some("websocket") {
        let _ = write_half.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n").await;
        return Err(Error::NoUpgradeHeaderPresent);
    }

    let connection_hdr = headers.header("connection").map(str::to_ascii_lowercase);
    if !connection_hdr.map(|v| v.contains("upgrade")).unwrap_or(false) {
        let _ = write_half.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n").await;
        return Err(Error::NoConnectionHeaderPresent);
    }

    let key = headers
        .header("sec-websocket-key")
        .ok_or(Error::NoSecWebsocketKey)?
        .to_string();

    let version = headers.header("sec-websocket-version").unwrap_or("");
    if version != "13" {
        let _ = write_half
            .write_all(b"HTTP/1.1 426 Upgrade Required\r\nSec-WebSocket-Version: 13\r\n\r\n")
            .await;
        return Err(Error::UnsupportedVersion { supported: vec![13] });
    }

    let origin = headers.header("origin").unwrap_or("").to_string();
    if let Some(filter) = &config.origin_filter {
        if !filter(&origin) {
            let _ = write_half.write_all(b"HTTP/1.1 403 Forbidden\r\n\r\n").await;
            return Err(Error::OriginRejected);
        }
    }

    let requested_subprotocols: Vec<String> = headers
        .header("sec-websocket-protocol")
        .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_default();
    let negotiated = requested_subprotocols
        .iter()
        .find(|p| config.supported_subprotocols.contains(p))
        .cloned();

    let accept_value = generate_websocket_accept_value(key);
    let mut response = format!(
        "HTTP/1.1 101 Switching Protocols\r\nConnection: Upgrade\r\nUpgrade: websocket\r\nSec-WebSocket-Accept: {}\r\n",
        accept_value
    );
    if let Some(ref proto) = negotiated {
        response.push_str(&format!("Sec-WebSocket-Protocol: {}\r\n", proto));
    }
    response.push_str("\r\n");
    write_all_flushed(&mut write_half, response.as_bytes()).await?;

    let request_path = headers.path.clone();
    let stream = read_half_unsplit(buf_reader, write_half);
    Connection::spawn(
        stream,
        Role::Server,
        config.web_socket_config.clone(),
        negotiated,
        Some(origin),
        request_path,
    )
}
