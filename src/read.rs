//! Inbound pump: one loop per connection that reads off the socket and
//! turns wire bytes into application events.
//!
//! Reads whatever is available into a growing `BytesMut` and feeds it to
//! `FrameDecoder::decode`, which reports `NeedMore` instead of blocking on a
//! fixed-size read — no frame boundary ever stalls the loop waiting on a
//! `read_exact` for a field that hasn't arrived yet.

use crate::close::CloseCode;
use crate::config::WebSocketConfig;
use crate::connection::ConnectionState;
use crate::error::Error;
use crate::event::ConnectionEvent;
use crate::frame::{DecodeOutcome, Frame, FrameDecoder, OpCode};
use crate::message::{AssemblerEvent, MessageAssembler};
use crate::stream::SocketFlowStream;
use crate::write::Writer;
use bytes::BytesMut;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;
use tokio::io::{AsyncReadExt, ReadHalf};
use tokio::sync::mpsc::Sender;
use tokio::sync::Mutex;

const READ_CHUNK: usize = 8 * 1024;

/// Drives one connection's inbound half until the socket closes or a
/// protocol error ends the connection. Runs inside the task
/// `Connection::spawn` starts.
pub struct ReadPump {
    read_half: ReadHalf<SocketFlowStream>,
    buffer: BytesMut,
    decoder: FrameDecoder,
    assembler: MessageAssembler,
    events: Sender<ConnectionEvent>,
    writer: Arc<Mutex<Writer>>,
    config: WebSocketConfig,
    last_ping_sent_at: Arc<Mutex<Option<Instant>>>,
    /// Shared with `Connection`/`WSWriter`: true once this side has written
    /// a Close frame, so the read pump doesn't send a second one in reply
    /// to the peer's Close when this side initiated the handshake.
    close_sent: Arc<AtomicBool>,
    /// Shared with `Connection`/`WSReader`: updated directly here, at the
    /// point a `Closed`/`Disconnected` event is produced, rather than by the
    /// `Stream` consumer inspecting each event as it's polled.
    state: Arc<StdMutex<ConnectionState>>,
}

impl ReadPump {
    pub fn new(
        read_half: ReadHalf<SocketFlowStream>,
        events: Sender<ConnectionEvent>,
        writer: Arc<Mutex<Writer>>,
        config: WebSocketConfig,
        last_ping_sent_at: Arc<Mutex<Option<Instant>>>,
        close_sent: Arc<AtomicBool>,
        state: Arc<StdMutex<ConnectionState>>,
    ) -> Self {
        Self {
            read_half,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            decoder: FrameDecoder::new(),
            assembler: MessageAssembler::new(config.max_message_size),
            events,
            writer,
            config,
            last_ping_sent_at,
            close_sent,
            state,
        }
    }

    /// Runs until the connection ends. Always returns `Ok(())`; failures are
    /// reported through the event channel rather than as a return value, so
    /// the caller's spawned task has nothing left to propagate.
    pub async fn run(mut self) {
        loop {
            match self.pump_one().await {
                Ok(true) => continue,
                Ok(false) => break,
                Err(err) => {
                    if let Some(code) = protocol_violation_close_code(&err) {
                        if !self.close_sent.swap(true, Ordering::SeqCst) {
                            let mut close_payload = code.as_u16().to_be_bytes().to_vec();
                            close_payload.extend_from_slice(err.to_string().as_bytes());
                            let _ = self
                                .writer
                                .lock()
                                .await
                                .write_frame(OpCode::Close, &close_payload, true)
                                .await;
                        }
                        *self.state.lock().expect("state mutex poisoned") = ConnectionState::Closed;
                        let _ = self
                            .events
                            .send(ConnectionEvent::Closed {
                                code: Some(code),
                                reason: err.to_string(),
                            })
                            .await;
                    }
                    let _ = self.events.send(ConnectionEvent::Error(err)).await;
                    break;
                }
            }
        }
        *self.state.lock().expect("state mutex poisoned") = ConnectionState::Closed;
        let _ = self.events.send(ConnectionEvent::Disconnected).await;
    }

    /// Processes at most one frame's worth of protocol activity. Returns
    /// `Ok(false)` once the connection should stop (peer closed or socket
    /// EOF).
    async fn pump_one(&mut self) -> Result<bool, Error> {
        loop {
            match self.decoder.decode(&mut self.buffer)? {
                DecodeOutcome::Frame(frame) => {
                    let keep_going = self.handle_frame(frame).await?;
                    return Ok(keep_going);
                }
                DecodeOutcome::NeedMore(_hint) => {
                    let mut chunk = [0u8; READ_CHUNK];
                    let n = self.read_half.read(&mut chunk).await?;
                    if n == 0 {
                        return Ok(false);
                    }
                    self.buffer.extend_from_slice(&chunk[..n]);
                }
            }
        }
    }

    async fn handle_frame(&mut self, frame: Frame) -> Result<bool, Error> {
        if frame.payload.len() > self.config.max_frame_size {
            return Err(Error::MaxFrameSize);
        }

        let event = self.assembler.accept(frame)?;
        match event {
            AssemblerEvent::DataFragment { .. } => Ok(true),
            AssemblerEvent::MessageComplete(message) => {
                let _ = self.events.send(ConnectionEvent::from_message(message)).await;
                Ok(true)
            }
            AssemblerEvent::Ping(payload) => {
                let _ = self.events.send(ConnectionEvent::Ping(payload.clone())).await;
                self.writer
                    .lock()
                    .await
                    .write_frame(OpCode::Pong, &payload, true)
                    .await?;
                Ok(true)
            }
            AssemblerEvent::Pong(payload) => {
                let elapsed = self
                    .last_ping_sent_at
                    .lock()
                    .await
                    .take()
                    .map(|started| started.elapsed());
                let _ = self
                    .events
                    .send(ConnectionEvent::Pong { payload, elapsed })
                    .await;
                Ok(true)
            }
            AssemblerEvent::Close(info) => {
                let (code, reason) = match info {
                    Some((code, reason)) => (Some(code), reason),
                    None => (None, String::new()),
                };
                // Close is a barrier (spec §5): if this side already sent a
                // Close (e.g. `Connection::close()` raced the peer's own),
                // the peer's frame completes the handshake without a second
                // reply going out.
                if !self.close_sent.swap(true, Ordering::SeqCst) {
                    let echo = code.unwrap_or(CloseCode::Normal).as_u16();
                    let mut close_payload = echo.to_be_bytes().to_vec();
                    close_payload.extend_from_slice(reason.as_bytes());
                    let _ = self
                        .writer
                        .lock()
                        .await
                        .write_frame(OpCode::Close, &close_payload, true)
                        .await;
                }
                *self.state.lock().expect("state mutex poisoned") = ConnectionState::Closed;
                let _ = self.events.send(ConnectionEvent::Closed { code, reason }).await;
                Ok(false)
            }
        }
    }
}

/// Maps a protocol violation to the close code the connection should send
/// to the peer before tearing down (RFC 6455 §7.4: 1002 for framing
/// violations, 1007 for invalid UTF-8, 1009 for size overruns). Returns
/// `None` for errors that aren't protocol violations (I/O failures, etc.),
/// where there's no socket left to write a close frame to.
fn protocol_violation_close_code(err: &Error) -> Option<CloseCode> {
    match err {
        Error::RSVNotZero
        | Error::ControlFramesFragmented
        | Error::ControlFramePayloadSize
        | Error::InvalidOpcode
        | Error::InvalidContinuationFrame
        | Error::InvalidFrameFragmentation
        | Error::FragmentedInProgress
        | Error::InvalidCloseCode(_) => Some(CloseCode::ProtocolError),
        Error::InvalidUtf8 => Some(CloseCode::BadPayload),
        Error::MaxMessageSize | Error::MaxFrameSize => Some(CloseCode::MessageTooBig),
        _ => None,
    }
}
