//! URL parsing and raw HTTP parsing for the opening handshake.
//!
//! `construct_http_request` builds the client's upgrade request line and
//! headers; no compression-extension headers are added since no extension
//! is negotiated. Server-side parsing runs on `httparse` rather than a
//! hand-rolled line scanner.

use crate::error::Error;
use std::collections::HashMap;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::time::{timeout, Duration};
use url::Url;

/// Parses a `ws://`/`wss://` URL into the pieces needed to open a TCP
/// connection and build the handshake request line: the request text
/// itself, `host:port` for dialing, the bare host (for the TLS SNI / cert
/// verification), and whether TLS is required.
pub fn construct_http_request(
    ws_url: &str,
    key: &str,
    subprotocols: &[String],
    origin: Option<&str>,
) -> Result<(String, String, String, bool), Error> {
    let parsed_url = Url::parse(ws_url)?;
    let mut use_tls = false;

    let http_port: u16 = match parsed_url.scheme() {
        "ws" => 80,
        "wss" => {
            use_tls = true;
            443
        }
        _ => return Err(Error::InvalidSchemeURL),
    };

    let host = parsed_url.host_str().ok_or(Error::URLNoHost)?;
    let port = parsed_url.port().unwrap_or(http_port);

    let request_host_field = match parsed_url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => String::from(host),
    };

    let host_with_port = format!("{}:{}", host, port);

    let request_path = match parsed_url.query() {
        Some(query) => format!("{}?{}", parsed_url.path(), query),
        None => {
            let path = parsed_url.path();
            if path.is_empty() {
                "/".to_string()
            } else {
                path.to_string()
            }
        }
    };

    let mut request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: Upgrade\r\nUpgrade: websocket\r\nSec-WebSocket-Key: {}\r\n",
        request_path,
        request_host_field,
        key,
    );

    if let Some(origin) = origin {
        request.push_str(&format!("Origin: {}\r\n", origin));
    }

    request.push_str("Sec-WebSocket-Version: 13\r\n");

    if !subprotocols.is_empty() {
        request.push_str(&format!(
            "Sec-WebSocket-Protocol: {}\r\n",
            subprotocols.join(", ")
        ));
    }

    request.push_str("\r\n");

    Ok((request, host_with_port, String::from(host), use_tls))
}

/// A parsed HTTP request or response's header block, case-insensitively
/// keyed.
#[derive(Debug)]
pub struct HttpHeaders {
    pub method: Option<String>,
    pub path: Option<String>,
    pub status: Option<u16>,
    pub headers: HashMap<String, String>,
}

impl HttpHeaders {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(|s| s.as_str())
    }
}

const MAX_HEADER_BYTES: usize = 16 * 1024;

/// Reads bytes from `reader` until a full HTTP header block (terminated by
/// `\r\n\r\n`) has arrived, then parses it with `httparse`. Used for both the
/// server parsing a client's upgrade request and the client parsing a
/// server's upgrade response.
pub async fn read_http_headers<R: AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
    read_timeout: Duration,
    is_request: bool,
) -> Result<HttpHeaders, Error> {
    let mut raw = Vec::with_capacity(1024);
    let mut byte = [0u8; 1];

    timeout(read_timeout, async {
        loop {
            let n = reader.read(&mut byte).await?;
            if n == 0 {
                return Err(Error::IncompleteHTTPRequest);
            }
            raw.push(byte[0]);
            if raw.len() > MAX_HEADER_BYTES {
                return Err(Error::InvalidHTTPHandshake);
            }
            if raw.ends_with(b"\r\n\r\n") {
                return Ok(());
            }
        }
    })
    .await??;

    parse_header_block(&raw, is_request)
}

/// Parses a complete `\r\n\r\n`-terminated header block directly, without
/// waiting on a reader. Exposed mainly so the header parser can be fuzzed as
/// a pure function, independent of any socket.
pub fn parse_header_block(raw: &[u8], is_request: bool) -> Result<HttpHeaders, Error> {
    let mut header_storage = [httparse::EMPTY_HEADER; 64];

    if is_request {
        let mut req = httparse::Request::new(&mut header_storage);
        match req.parse(raw)? {
            httparse::Status::Complete(_) => {}
            httparse::Status::Partial => return Err(Error::IncompleteHTTPRequest),
        }
        let method = req.method.map(|m| m.to_string());
        let path = req.path.map(|p| p.to_string());
        let headers = collect_headers(req.headers);
        Ok(HttpHeaders {
            method,
            path,
            status: None,
            headers,
        })
    } else {
        let mut resp = httparse::Response::new(&mut header_storage);
        match resp.parse(raw)? {
            httparse::Status::Complete(_) => {}
            httparse::Status::Partial => return Err(Error::IncompleteHTTPRequest),
        }
        let headers = collect_headers(resp.headers);
        Ok(HttpHeaders {
            method: None,
            path: None,
            status: resp.code,
            headers,
        })
    }
}

fn collect_headers(raw_headers: &[httparse::Header]) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    for header in raw_headers {
        if header.name.is_empty() {
            continue;
        }
        let value = String::from_utf8_lossy(header.value).to_string();
        headers.insert(header.name.to_ascii_lowercase(), value);
    }
    headers
}

/// Writes `bytes` to `writer` and flushes. Small helper shared by client and
/// server handshake code.
pub async fn write_all_flushed<W: tokio::io::AsyncWrite + Unpin>(
    writer: &mut W,
    bytes: &[u8],
) -> Result<(), Error> {
    writer.write_all(bytes).await?;
    writer.flush().await?;
    Ok(())
}
