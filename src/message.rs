use crate::error::Error;
use crate::frame::{Frame, OpCode};

/// The status code and reason text carried by a close frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
}

impl CloseReason {
    /// Parses a close-frame payload. An empty payload means the peer sent
    /// no status code; a single-byte payload is malformed per RFC 6455.
    pub fn from_payload(payload: &[u8]) -> Result<Option<CloseReason>, Error> {
        match payload.len() {
            0 => Ok(None),
            1 => Err(Error::InvalidCloseFrame),
            _ => {
                let code = u16::from_be_bytes([payload[0], payload[1]]);
                let reason = String::from_utf8(payload[2..].to_vec())?;
                Ok(Some(CloseReason { code, reason }))
            }
        }
    }

    pub fn into_payload(self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(2 + self.reason.len());
        payload.extend_from_slice(&self.code.to_be_bytes());
        payload.extend_from_slice(self.reason.as_bytes());
        payload
    }
}

/// The logical unit delivered to the consumer. Data messages carry the
/// concatenated payload of one fragmentation sequence; control frames
/// arrive as independent messages even when they interleave a sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close(Option<CloseReason>),
}

impl Message {
    /// Converts a completed data frame into a message, enforcing that text
    /// payloads are valid UTF-8.
    pub fn from_data_frame(frame: Frame) -> Result<Self, Error> {
        match frame.opcode {
            OpCode::Text => Ok(Message::Text(String::from_utf8(frame.payload)?)),
            OpCode::Binary => Ok(Message::Binary(frame.payload)),
            _ => Err(Error::InvalidOpcode),
        }
    }

    pub fn is_control(&self) -> bool {
        matches!(
            self,
            Message::Ping(_) | Message::Pong(_) | Message::Close(_)
        )
    }

    // Function to get the payload as binary (Vec<u8>)
    pub fn as_binary(&self) -> Vec<u8> {
        match self {
            Message::Text(text) => text.as_bytes().to_vec(),
            Message::Binary(data) | Message::Ping(data) | Message::Pong(data) => data.clone(),
            Message::Close(reason) => reason
                .clone()
                .map(CloseReason::into_payload)
                .unwrap_or_default(),
        }
    }

    // Function to get the payload as a String
    pub fn as_text(&self) -> Result<String, Error> {
        match self {
            Message::Text(text) => Ok(text.clone()),
            other => Ok(String::from_utf8(other.as_binary())?),
        }
    }

    /// Splits a data message into one or more frames, fragmenting when the
    /// payload exceeds `max_frame_size`. Control messages never fragment
    /// and always come back as a single final frame.
    pub fn to_frames(self, max_frame_size: usize) -> Vec<Frame> {
        let (opcode, payload) = match self {
            Message::Text(text) => (OpCode::Text, text.into_bytes()),
            Message::Binary(data) => (OpCode::Binary, data),
            Message::Ping(data) => (OpCode::Ping, data),
            Message::Pong(data) => (OpCode::Pong, data),
            Message::Close(reason) => (
                OpCode::Close,
                reason.map(CloseReason::into_payload).unwrap_or_default(),
            ),
        };

        if opcode.is_control() || payload.is_empty() {
            return vec![Frame {
                final_fragment: true,
                opcode,
                payload,
            }];
        }

        // chunks() refuses a zero size, and a zero frame limit makes no sense
        let chunk_size = max_frame_size.max(1);

        let mut frames = Vec::new();
        for chunk in payload.chunks(chunk_size) {
            frames.push(Frame {
                final_fragment: false,
                opcode: if frames.is_empty() {
                    opcode
                } else {
                    OpCode::Continue
                },
                payload: chunk.to_vec(),
            });
        }

        if let Some(last_frame) = frames.last_mut() {
            last_frame.final_fragment = true;
        }

        frames
    }
}
