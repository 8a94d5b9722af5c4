use crate::config::WebSocketConfig;
use crate::error::Error;
use crate::message::{CloseReason, Message};
use crate::stream::WsStream;
use crate::write::Writer;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::WriteHalf;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio_stream::wrappers::ReceiverStream;

// How long a locally initiated close waits for the peer's echo before the
// call returns
const CLOSE_GRACE_PERIOD: Duration = Duration::from_millis(500);

/// The receiving half of a connection: a stream of completed messages.
/// Ends with `None` once the connection closed cleanly; transport and
/// protocol failures come through as `Err` items first.
pub struct WsReader {
    read_rx: ReceiverStream<Result<Message, Error>>,
}

impl WsReader {
    pub(crate) fn new(read_rx: ReceiverStream<Result<Message, Error>>) -> Self {
        Self { read_rx }
    }
}

impl Stream for WsReader {
    type Item = Result<Message, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.read_rx).poll_next(cx)
    }
}

/// The sending half of a connection. Clone-free by design: concurrent
/// writers should share one `WsWriter` behind their own synchronization,
/// the library serializes whole frames but not send call order.
pub struct WsWriter {
    writer: Arc<Mutex<Writer<WriteHalf<WsStream>>>>,
    config: WebSocketConfig,
}

impl WsWriter {
    pub(crate) fn new(
        writer: Arc<Mutex<Writer<WriteHalf<WsStream>>>>,
        config: WebSocketConfig,
    ) -> Self {
        Self { writer, config }
    }

    /// Closes the connection from this side: sends a close frame, then
    /// waits a grace period for the peer's echo to arrive and drive the
    /// reader loop to completion. Calling it twice is a no-op.
    pub async fn close_connection(&mut self) -> Result<(), Error> {
        self.close_with_payload(Vec::new()).await
    }

    /// Like [`close_connection`](Self::close_connection) but carries a
    /// status code and reason to the peer.
    pub async fn close_with_reason(&mut self, code: u16, reason: &str) -> Result<(), Error> {
        let close_reason = CloseReason {
            code,
            reason: reason.to_string(),
        };
        self.close_with_payload(close_reason.into_payload()).await
    }

    async fn close_with_payload(&mut self, payload: Vec<u8>) -> Result<(), Error> {
        self.writer.lock().await.write_close(payload).await?;
        sleep(CLOSE_GRACE_PERIOD).await;
        Ok(())
    }

    // This function will be used to send general data as a vector of
    // bytes, delivered to the peer as a text message
    pub async fn send(&mut self, data: Vec<u8>) -> Result<(), Error> {
        self.send_message(Message::Text(String::from_utf8(data)?))
            .await
    }

    pub async fn send_as_text(&mut self, data: String) -> Result<(), Error> {
        self.send_message(Message::Text(data)).await
    }

    pub async fn send_as_binary(&mut self, data: Vec<u8>) -> Result<(), Error> {
        self.send_message(Message::Binary(data)).await
    }

    pub async fn send_ping(&mut self, payload: Vec<u8>) -> Result<(), Error> {
        self.send_message(Message::Ping(payload)).await
    }

    pub async fn send_pong(&mut self, payload: Vec<u8>) -> Result<(), Error> {
        self.send_message(Message::Pong(payload)).await
    }

    /// Sends any message. Data messages larger than `max_frame_size` are
    /// fragmented automatically; a close message goes through the closing
    /// path and latches the writer.
    pub async fn send_message(&mut self, message: Message) -> Result<(), Error> {
        if let Message::Close(reason) = message {
            let payload = reason.map(CloseReason::into_payload).unwrap_or_default();
            return self.close_with_payload(payload).await;
        }

        if let Some(max) = self.config.max_message_size {
            if message.as_binary().len() > max {
                return Err(Error::MaxMessageSize);
            }
        }

        let max_frame_size = self.config.max_frame_size.unwrap_or(usize::MAX);
        let frames = message.to_frames(max_frame_size);

        let mut writer = self.writer.lock().await;
        for frame in frames {
            writer.write_frame(frame).await?;
        }
        Ok(())
    }

    /// Sends a large payload split into fragments of the caller's chosen
    /// size, using a Continue-opcode sequence.
    pub async fn send_large_data_fragmented(
        &mut self,
        data: Vec<u8>,
        fragment_size: usize,
    ) -> Result<(), Error> {
        if let Some(max) = self.config.max_frame_size {
            if fragment_size > max {
                return Err(Error::CustomFragmentSizeExceeded(fragment_size, max));
            }
        }

        if let Some(max) = self.config.max_message_size {
            if data.len() > max {
                return Err(Error::MaxMessageSize);
            }
        }

        let message = Message::Binary(data);
        let frames = message.to_frames(fragment_size);

        let mut writer = self.writer.lock().await;
        for frame in frames {
            writer.write_frame(frame).await?;
        }
        Ok(())
    }
}
