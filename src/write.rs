//! Outbound frame writer.
//!
//! One `Writer` per connection, held behind an `Arc<Mutex<_>>` so the
//! public send methods and the read loop's auto-pong/auto-close replies
//! never interleave partial frames on the wire. Masking is keyed off
//! `Role` and delegated to the shared `encode_frame` in `frame.rs`, which
//! already knows how to mask when given a key and leave the frame bare
//! otherwise.

use crate::error::Error;
use crate::frame::{encode_frame, OpCode};
use crate::stream::SocketFlowStream;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::io::{AsyncWriteExt, WriteHalf};

/// Which side of the connection this writer serves. Clients must mask every
/// frame with a fresh random key (RFC 6455 §5.3); servers must not mask at
/// all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

pub struct Writer {
    write_half: WriteHalf<SocketFlowStream>,
    role: Role,
}

impl Writer {
    pub fn new(write_half: WriteHalf<SocketFlowStream>, role: Role) -> Self {
        Self { write_half, role }
    }

    pub async fn write_frame(
        &mut self,
        opcode: OpCode,
        payload: &[u8],
        fin: bool,
    ) -> Result<(), Error> {
        let mask_key = match self.role {
            Role::Client => Some(Self::random_mask_key()),
            Role::Server => None,
        };
        let encoded = encode_frame(opcode, payload, mask_key, fin);
        self.write_half.write_all(&encoded).await?;
        self.write_half.flush().await?;
        Ok(())
    }

    fn random_mask_key() -> [u8; 4] {
        let mut rng = StdRng::from_rng(rand::thread_rng());
        rng.random()
    }
}
