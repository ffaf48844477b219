//! Async WebSocket protocol engine for the Tokio stack (RFC 6455).
//!
//! Performs the opening handshake, frames and unframes messages, validates
//! fragmentation and masking, and tracks per-connection state, so callers can
//! wrap a `TcpStream` (or a TLS stream) into a WebSocket client or server
//! with a handful of calls — `handshake::connect_async` /
//! `handshake::accept_async` on the client and server sides respectively,
//! `server::Server` for a full listener with a bounded pending-connection
//! queue.

pub mod close;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod frame;
pub mod handshake;
pub mod mask;
pub mod message;
mod read;
pub mod request;
pub mod server;
pub mod split;
pub mod stream;
mod utils;
mod write;
