use crate::codec::{extended_len_bytes, FrameHeader, MAX_HEADER_SIZE};
use crate::config::WebSocketConfig;
use crate::error::Error;
use crate::frame::{Frame, OpCode};
use crate::message::{CloseReason, Message};
use crate::write::Writer;
use log::{debug, warn};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, BufReader};
use tokio::sync::mpsc::Sender;
use tokio::sync::Mutex;
use tokio::time::timeout;

/// The fragment buffer for the one message that may be in flight: frames
/// between a non-final data frame and its closing FIN land here.
struct FragmentedMessage {
    fragments: Vec<u8>,
    op_code: OpCode,
}

/// Pulls frames off the transport, assembles them into messages and feeds
/// the message channel. Control frames are answered here (PONG echo, CLOSE
/// echo) before the consumer ever sees them.
pub struct ReadStream<R, W> {
    buf_reader: BufReader<R>,
    fragmented_message: Option<FragmentedMessage>,
    pub(crate) read_tx: Sender<Result<Message, Error>>,
    writer: Arc<Mutex<Writer<W>>>,
    config: WebSocketConfig,
}

impl<R, W> ReadStream<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(
        read: BufReader<R>,
        read_tx: Sender<Result<Message, Error>>,
        writer: Arc<Mutex<Writer<W>>>,
        config: WebSocketConfig,
    ) -> Self {
        Self {
            buf_reader: read,
            fragmented_message: None,
            read_tx,
            writer,
            config,
        }
    }

    /// Runs until the peer closes, the consumer goes away or the
    /// connection errors. Returns Ok after a clean close handshake.
    pub async fn poll_messages(&mut self) -> Result<(), Error> {
        loop {
            let frame = self.read_frame().await?;
            match frame.opcode {
                // Reserved opcodes only get this far in permissive mode;
                // there is nothing meaningful to deliver, but the payload
                // was already consumed so the stream stays in sync
                OpCode::Reserved(value) => {
                    warn!("dropping frame with reserved opcode {:#x}", value);
                }
                // A fragmented message opens with a Text or Binary frame
                // whose FIN bit is clear
                OpCode::Text | OpCode::Binary if !frame.final_fragment => {
                    if self.fragmented_message.is_none() {
                        self.fragmented_message = Some(FragmentedMessage {
                            op_code: frame.opcode,
                            fragments: frame.payload,
                        });
                    } else {
                        Err(Error::FragmentedInProgress)?
                    }
                }
                // From the second fragment onward the opcode must be
                // Continue; the frame carrying FIN completes the message
                OpCode::Continue => {
                    let fragmented_message = self
                        .fragmented_message
                        .as_mut()
                        .ok_or(Error::InvalidContinuationFrame)?;
                    fragmented_message
                        .fragments
                        .extend_from_slice(&frame.payload);

                    if let Some(max) = self.config.max_message_size {
                        if fragmented_message.fragments.len() > max {
                            Err(Error::MaxMessageSize)?
                        }
                    }

                    if frame.final_fragment {
                        // The message type is the opcode of the frame that
                        // opened the sequence
                        let completed = self.fragmented_message.take().unwrap();
                        self.transmit_message(Frame::new(
                            true,
                            completed.op_code,
                            completed.fragments,
                        ))
                        .await?;
                    }
                }
                OpCode::Text | OpCode::Binary => {
                    // A new data frame while a fragmented message is in
                    // progress fails the connection
                    if self.fragmented_message.is_some() {
                        Err(Error::InvalidFrameFragmentation)?
                    }
                    self.transmit_message(frame).await?;
                }
                OpCode::Close => {
                    let reason = CloseReason::from_payload(&frame.payload)?;
                    debug!("close received: {:?}", reason);
                    // Echo the close with the peer's own payload, then
                    // surface it and stop reading. If the close originated
                    // locally the writer is already latched and the echo
                    // is a no-op.
                    self.writer.lock().await.write_close(frame.payload).await?;
                    self.read_tx
                        .send(Ok(Message::Close(reason)))
                        .await
                        .map_err(|_| Error::CommunicationError)?;
                    break;
                }
                OpCode::Ping => {
                    self.send_pong_frame(frame.payload.clone()).await?;
                    self.read_tx
                        .send(Ok(Message::Ping(frame.payload)))
                        .await
                        .map_err(|_| Error::CommunicationError)?;
                }
                OpCode::Pong => {
                    self.read_tx
                        .send(Ok(Message::Pong(frame.payload)))
                        .await
                        .map_err(|_| Error::CommunicationError)?;
                }
            }
        }
        Ok(())
    }

    async fn send_pong_frame(&mut self, payload: Vec<u8>) -> Result<(), Error> {
        let pong_frame = Frame::new(true, OpCode::Pong, payload);
        self.writer.lock().await.write_frame(pong_frame).await
    }

    /// Reads exactly one frame. The header is read in stages (2 fixed
    /// bytes, then the extended length its 7-bit field announces) so the
    /// full frame length is known before the body read is issued and frame
    /// boundaries never straddle a read.
    async fn read_frame(&mut self) -> Result<Frame, Error> {
        let mut header_buf = [0u8; MAX_HEADER_SIZE];
        self.buf_reader.read_exact(&mut header_buf[..2]).await?;

        // Frames travel unmasked from server to client; a masked frame
        // here means the peer is broken
        if header_buf[1] & 0b1000_0000 != 0 {
            return Err(Error::MaskedFrameFromServer);
        }

        let ext_bytes = extended_len_bytes(header_buf[1] & 0b0111_1111);
        if ext_bytes > 0 {
            self.buf_reader
                .read_exact(&mut header_buf[2..2 + ext_bytes])
                .await?;
        }

        let header = FrameHeader::parse(&header_buf[..2 + ext_bytes])?;
        header.validate(self.config.strict_opcodes)?;

        if let Some(max) = self.config.max_frame_size {
            if header.payload_len > max as u64 {
                Err(Error::MaxFrameSize)?
            }
        }

        let mut payload = vec![0u8; header.payload_len as usize];

        // The payload read runs under a deadline when one is configured:
        // a peer that advertised a length and then stalls should not be
        // able to park the connection mid-frame. Waiting for the next
        // header above is unbounded on purpose, idle connections are fine.
        match self.config.read_timeout {
            Some(limit) => {
                let read_result = timeout(limit, self.buf_reader.read_exact(&mut payload)).await;
                match read_result {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => Err(e)?,
                    Err(elapsed) => Err(elapsed)?,
                }
            }
            None => {
                self.buf_reader.read_exact(&mut payload).await?;
            }
        }

        Ok(Frame::new(header.final_fragment, header.opcode, payload))
    }

    async fn transmit_message(&mut self, frame: Frame) -> Result<(), Error> {
        // Text payloads must be valid UTF-8, checked once the full message
        // is assembled
        self.read_tx
            .send(Ok(Message::from_data_frame(frame)?))
            .await
            .map_err(|_| Error::CommunicationError)
    }
}
