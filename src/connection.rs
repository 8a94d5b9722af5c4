use crate::error::Error;
use crate::message::Message;
use crate::split::{WsReader, WsWriter};
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

/// An established client connection.
///
/// Implements [`Stream`] over incoming messages; awaiting `next()` is the
/// blocking "give me the next message" surface, and the stream ending with
/// `None` means the connection finished cleanly. For a dedicated reader
/// worker next to a writer worker, [`split`](Self::split) hands out the
/// two halves separately.
pub struct WSConnection {
    reader: WsReader,
    writer: WsWriter,
}

impl WSConnection {
    pub(crate) fn new(reader: WsReader, writer: WsWriter) -> Self {
        Self { reader, writer }
    }

    /// Splits the connection so reading and writing can live on different
    /// tasks.
    pub fn split(self) -> (WsReader, WsWriter) {
        (self.reader, self.writer)
    }

    pub async fn close_connection(&mut self) -> Result<(), Error> {
        self.writer.close_connection().await
    }

    pub async fn close_with_reason(&mut self, code: u16, reason: &str) -> Result<(), Error> {
        self.writer.close_with_reason(code, reason).await
    }

    pub async fn send_message(&mut self, message: Message) -> Result<(), Error> {
        self.writer.send_message(message).await
    }

    pub async fn send(&mut self, data: Vec<u8>) -> Result<(), Error> {
        self.writer.send(data).await
    }

    pub async fn send_as_text(&mut self, data: String) -> Result<(), Error> {
        self.writer.send_as_text(data).await
    }

    pub async fn send_as_binary(&mut self, data: Vec<u8>) -> Result<(), Error> {
        self.writer.send_as_binary(data).await
    }

    pub async fn send_ping(&mut self, payload: Vec<u8>) -> Result<(), Error> {
        self.writer.send_ping(payload).await
    }

    pub async fn send_pong(&mut self, payload: Vec<u8>) -> Result<(), Error> {
        self.writer.send_pong(payload).await
    }

    pub async fn send_large_data_fragmented(
        &mut self,
        data: Vec<u8>,
        fragment_size: usize,
    ) -> Result<(), Error> {
        self.writer
            .send_large_data_fragmented(data, fragment_size)
            .await
    }
}

impl Stream for WSConnection {
    type Item = Result<Message, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.reader).poll_next(cx)
    }
}
