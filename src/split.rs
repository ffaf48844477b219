//! Reader/writer halves of a connection.
//!
//! `WSReader` wraps the event channel and implements `Stream`; `WSWriter`
//! wraps the shared `Arc<Mutex<Writer>>` so it can be handed to whichever
//! task needs to send independently of the one draining events. Lets one
//! task relay inbound events while another owns outbound sends, the way
//! `server.rs`'s connection handling splits a connection.

use crate::config::WebSocketConfig;
use crate::connection::ConnectionState;
use crate::error::Error;
use crate::event::ConnectionEvent;
use crate::frame::OpCode;
use crate::message::{message_to_frames, Message};
use crate::write::Writer;
use futures::Stream;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::task::{Context, Poll};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

pub struct WSReader {
    events: ReceiverStream<ConnectionEvent>,
    read_task: JoinHandle<()>,
}

impl WSReader {
    pub(crate) fn new(events: ReceiverStream<ConnectionEvent>, read_task: JoinHandle<()>) -> Self {
        Self { events, read_task }
    }
}

impl Stream for WSReader {
    type Item = ConnectionEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.events).poll_next(cx)
    }
}

impl Drop for WSReader {
    fn drop(&mut self) {
        self.read_task.abort();
    }
}

pub struct WSWriter {
    writer: Arc<Mutex<Writer>>,
    config: WebSocketConfig,
    state: Arc<StdMutex<ConnectionState>>,
    close_sent: Arc<AtomicBool>,
}

impl WSWriter {
    pub(crate) fn new(
        writer: Arc<Mutex<Writer>>,
        config: WebSocketConfig,
        state: Arc<StdMutex<ConnectionState>>,
        close_sent: Arc<AtomicBool>,
    ) -> Self {
        Self {
            writer,
            config,
            state,
            close_sent,
        }
    }

    /// Close is a barrier (spec §5): once a Close frame has gone out, no
    /// further data frames are sent.
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

    pub async fn send_as_text(&self, data: String) -> Result<(), Error> {
        self.send_message(Message::Text(data)).await
    }

    pub async fn send_as_binary(&self, data: Vec<u8>) -> Result<(), Error> {
        self.send_message(Message::Binary(data)).await
    }

    pub async fn send_ping(&self, payload: Vec<u8>) -> Result<(), Error> {
        self.writer.lock().await.write_frame(OpCode::Ping, &payload, true).await
    }

    /// Sends a large payload split into fragments no larger than
    /// `fragment_size`, rejecting the call up front if that exceeds the
    /// connection's configured `max_frame_size`.
    pub async fn send_large_data_fragmented(
        &self,
        data: Vec<u8>,
        fragment_size: usize,
    ) -> Result<(), Error> {
        if self.close_sent.load(Ordering::SeqCst) {
            return Err(Error::Closed(crate::close::CloseCode::Normal, String::new()));
        }
        if fragment_size > self.config.max_frame_size {
            return Err(Error::CustomFragmentSizeExceeded(
                fragment_size,
                self.config.max_frame_size,
            ));
        }
        if data.len() > self.config.max_message_size {
            return Err(Error::MaxMessageSize);
        }

        if data.is_empty() {
            return self.writer.lock().await.write_frame(OpCode::Binary, &[], true).await;
        }

        let total_chunks = data.chunks(fragment_size.max(1)).count();
        let mut writer = self.writer.lock().await;
        for (i, chunk) in data.chunks(fragment_size.max(1)).enumerate() {
            let is_final = i == total_chunks - 1;
            let opcode = if i == 0 { OpCode::Binary } else { OpCode::Continuation };
            writer.write_frame(opcode, chunk, is_final).await?;
        }
        Ok(())
    }

    pub async fn close_connection(&self) -> Result<(), Error> {
        if self.close_sent.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        *self.state.lock().expect("state mutex poisoned") = ConnectionState::Closing;
        self.writer.lock().await.write_frame(OpCode::Close, &[], true).await
    }
}
