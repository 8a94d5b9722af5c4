use crate::codec;
use crate::error::Error;
use crate::frame::{Frame, OpCode};
use crate::mask::generate_masking_key;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Owns the write half of a connection. Every outbound frame is masked
/// with a fresh random key, as the RFC requires from clients.
pub struct Writer<W> {
    write_half: W,
    closed: bool,
}

impl<W: AsyncWrite + Unpin> Writer<W> {
    pub fn new(write_half: W) -> Self {
        Self {
            write_half,
            closed: false,
        }
    }

    /// Encodes and sends one frame. The whole frame is assembled first so
    /// the transport sees a single write per frame, which keeps two-worker
    /// setups (reader echoing control frames while the consumer writes)
    /// from interleaving partial frames.
    pub async fn write_frame(&mut self, frame: Frame) -> Result<(), Error> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        let bytes = codec::encode(&frame, Some(generate_masking_key()));
        self.write_half.write_all(&bytes).await?;
        Ok(())
    }

    /// Sends a close frame and latches the writer shut. Idempotent: once a
    /// close went out, further close calls are no-ops, so the reader's
    /// close echo and a user-initiated shutdown can't race each other into
    /// an error. All other writes after this return `ConnectionClosed`.
    pub async fn write_close(&mut self, payload: Vec<u8>) -> Result<(), Error> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let bytes = codec::encode(&Frame::new(true, OpCode::Close, payload), Some(generate_masking_key()));
        self.write_half.write_all(&bytes).await?;
        self.write_half.shutdown().await?;
        Ok(())
    }
}
