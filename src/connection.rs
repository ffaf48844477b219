//! Connection state machine.
//!
//! Responsibilities are split across this module, `read.rs`, `write.rs`,
//! and `split.rs`: a `Writer` behind an `Arc<Mutex<_>>` serializes outbound
//! frames, and a spawned task drives the inbound pump. `ConnectionState`
//! tracks the connection's lifecycle explicitly (`Unconnected → HostLookup
//! → Connecting → Connected → Closing → Closed`), the way a socket wrapper
//! would mirror an underlying OS socket's own state transitions.

use crate::config::WebSocketConfig;
use crate::error::Error;
use crate::event::ConnectionEvent;
use crate::frame::OpCode;
use crate::message::{message_to_frames, Message};
use crate::read::ReadPump;
use crate::stream::SocketFlowStream;
use crate::write::Writer;
pub use crate::write::Role;
use futures::Stream;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::io::split;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    HostLookup,
    Connecting,
    Connected,
    Closing,
    Closed,
}

const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Builds a Close frame payload: 2-byte big-endian code followed by a
/// UTF-8 reason, truncated so the total stays within the control-frame
/// payload limit of 125 bytes (spec §4.5). Truncation never splits a
/// multi-byte UTF-8 character.
fn close_payload(code: crate::close::CloseCode, reason: &str) -> Vec<u8> {
    const MAX_REASON_BYTES: usize = 123; // 125 - 2 byte code
    let mut payload = code.as_u16().to_be_bytes().to_vec();
    let reason_bytes = reason.as_bytes();
    let truncated = if reason_bytes.len() <= MAX_REASON_BYTES {
        reason_bytes
    } else {
        let mut end = MAX_REASON_BYTES;
        while end > 0 && !reason.is_char_boundary(end) {
            end -= 1;
        }
        &reason_bytes[..end]
    };
    payload.extend_from_slice(truncated);
    payload
}

/// A live WebSocket connection, either accepted by a `Server` or opened by
/// `handshake::connect_async`. Implements `Stream<Item = ConnectionEvent>`
/// so callers drain it in a loop the way they would any other tokio stream.
pub struct Connection {
    writer: Arc<Mutex<Writer>>,
    events: ReceiverStream<ConnectionEvent>,
    state: Arc<StdMutex<ConnectionState>>,
    peer_addr: Option<SocketAddr>,
    local_addr: Option<SocketAddr>,
    subprotocol: Option<String>,
    origin: Option<String>,
    request_url: Option<String>,
    config: WebSocketConfig,
    last_ping_sent_at: Arc<Mutex<Option<Instant>>>,
    /// Set once this side has written a Close frame, by either `close()` or
    /// the read pump echoing a peer-initiated Close. Close is a barrier
    /// (spec §5): once set, no further data frames are written, and the read
    /// pump won't send a second Close frame in reply to the peer's own.
    close_sent: Arc<AtomicBool>,
    read_task: JoinHandle<()>,
}

impl Connection {
    pub(crate) fn spawn(
        stream: SocketFlowStream,
        role: Role,
        config: WebSocketConfig,
        subprotocol: Option<String>,
        origin: Option<String>,
        request_url: Option<String>,
    ) -> Result<Self, Error> {
        let peer_addr = stream.peer_addr().ok();
        let local_addr = stream.local_addr().ok();

        let (read_half, write_half) = split(stream);
        let writer = Arc::new(Mutex::new(Writer::new(write_half, role)));
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let last_ping_sent_at = Arc::new(Mutex::new(None));
        let close_sent = Arc::new(AtomicBool::new(false));
        let state = Arc::new(StdMutex::new(ConnectionState::Connected));

        let pump = ReadPump::new(
            read_half,
            tx.clone(),
            writer.clone(),
            config.clone(),
            last_ping_sent_at.clone(),
            close_sent.clone(),
            state.clone(),
        );
        let _ = tx.try_send(ConnectionEvent::Connected);
        let read_task = tokio::spawn(pump.run());

        Ok(Self {
            writer,
            events: ReceiverStream::new(rx),
            state,
            peer_addr,
            local_addr,
            subprotocol,
            origin,
            request_url,
            config,
            last_ping_sent_at,
            close_sent,
            read_task,
        })
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().expect("state mutex poisoned")
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn subprotocol(&self) -> Option<&str> {
        self.subprotocol.as_deref()
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub fn request_url(&self) -> Option<&str> {
        self.request_url.as_deref()
    }

    /// Sends a complete message, fragmenting it into `max_frame_size`-sized
    /// frames if necessary. Close is a barrier (spec §5): once a Close frame
    /// has gone out, no further data frames are sent.
    pub async fn send_message(&self, message: Message) -> Result<(), Error> {
        if self.close_sent.load(Ordering::SeqCst) {
            return Err(Error::Closed(crate::close::CloseCode::Normal, String::new()));
        }
        let frames = message_to_frames(message, self.config.max_frame_size);
        let mut writer = self.writer.lock().await;
        for (opcode, payload, fin) in frames {
            writer.write_frame(opcode, &payload, fin).await?;
        }
        Ok(())
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), Error> {
        self.send_message(Message::Text(text.into())).await
    }

    pub async fn send_binary(&self, data: Vec<u8>) -> Result<(), Error> {
        self.send_message(Message::Binary(data)).await
    }

    /// Sends a Ping and records the send time so the matching Pong's
    /// round-trip time can be reported via `ConnectionEvent::Pong`.
    pub async fn ping(&self, payload: Vec<u8>) -> Result<(), Error> {
        *self.last_ping_sent_at.lock().await = Some(Instant::now());
        self.writer.lock().await.write_frame(OpCode::Ping, &payload, true).await
    }

    /// Initiates the close handshake: sends a Close frame and transitions to
    /// `Closing`. The connection finishes closing once the peer's
    /// corresponding Close frame is processed by the read loop. Idempotent
    /// per spec §5: a call while already `Closing`/`Closed` is a no-op.
    pub async fn close(&self, code: crate::close::CloseCode, reason: &str) -> Result<(), Error> {
        if self.close_sent.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        *self.state.lock().expect("state mutex poisoned") = ConnectionState::Closing;
        let payload = close_payload(code, reason);
        self.writer.lock().await.write_frame(OpCode::Close, &payload, true).await
    }

    /// Ends the connection immediately without a close handshake.
    pub fn abort(&self) {
        self.read_task.abort();
        *self.state.lock().expect("state mutex poisoned") = ConnectionState::Closed;
    }
}

impl Stream for Connection {
    type Item = ConnectionEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.events).poll_next(cx)
    }
}

impl Connection {
    /// Splits the connection into an independent read half and write half,
    /// for callers that want to hand the writer to one task (e.g. an event
    /// loop relaying outbound messages) while another task drains incoming
    /// events.
    pub fn split(self) -> (crate::split::WSReader, crate::split::WSWriter) {
        let Connection {
            writer,
            events,
            state,
            config,
            close_sent,
            read_task,
            ..
        } = self;
        let reader = crate::split::WSReader::new(events, read_task);
        let writer = crate::split::WSWriter::new(writer, config, state, close_sent);
        (reader, writer)
    }
}
