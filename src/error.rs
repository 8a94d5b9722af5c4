use crate::message::Message;
use httparse::Error as HttpParseError;
use pki_types::InvalidDnsNameError;
use std::io;
use std::string::FromUtf8Error;
use thiserror::Error;
use tokio::sync::mpsc::error::SendError;
use tokio::time::error::Elapsed;
use url::ParseError;

#[derive(Error, Debug)]
pub enum Error {
    // Sender / Receiver Errors
    #[error("{source}")]
    SendError {
        #[from]
        source: SendError<Message>,
    },

    #[error("channel communication error")]
    CommunicationError,

    // General Errors
    #[error("{source}")]
    Timeout {
        #[from]
        source: Elapsed,
    },

    #[error("IO Error happened: {source}")]
    IOError {
        #[from]
        source: io::Error,
    },

    #[error("{source}")]
    FromUtf8Error {
        #[from]
        source: FromUtf8Error,
    },

    // URL Errors
    #[error("{source}")]
    URLParseError {
        #[from]
        source: ParseError,
    },

    #[error("Invalid scheme in WebSocket URL")]
    InvalidSchemeURL,

    #[error("URL has no host")]
    URLNoHost,

    #[error("Unsupported WebSocket version: `{0}`, only 13 is supported")]
    UnsupportedVersion(u16),

    // Transport Errors
    #[error("none of the resolved addresses accepted a connection")]
    NoValidAddress,

    #[error("{source}")]
    DomainError {
        #[from]
        source: InvalidDnsNameError,
    },

    // Handshake Errors
    #[error("{source}")]
    HttpParseError {
        #[from]
        source: HttpParseError,
    },

    #[error("Incomplete HTTP response")]
    IncompleteHTTPResponse,

    #[error("Server answered the upgrade with status `{0}` instead of 101")]
    HandshakeStatusCode(u16),

    #[error("Upgrade: websocket header missing or invalid in the response")]
    MissingUpgradeHeader,

    #[error("Connection: Upgrade header missing or invalid in the response")]
    MissingConnectionHeader,

    #[error("Server didn't send a valid Sec-WebSocket-Accept key")]
    InvalidAcceptKey,

    // Framing Errors
    #[error("truncated frame, buffer shorter than the advertised length")]
    TruncatedFrame,

    #[error("RSV not zero")]
    RSVNotZero,

    #[error("reserved opcode `{0:#x}` received")]
    ReservedOpcode(u8),

    #[error("Control frames must not be fragmented")]
    ControlFramesFragmented,

    #[error("Control frame with invalid payload size, can't be greater than 125")]
    ControlFramePayloadSize,

    #[error("Max frame size reached")]
    MaxFrameSize,

    #[error("Max message size reached")]
    MaxMessageSize,

    #[error("received a masked frame from the server")]
    MaskedFrameFromServer,

    #[error("fragment_size: `{0}` can't be greater than max_frame_size: `{1}`")]
    CustomFragmentSizeExceeded(usize, usize),

    // Fragmentation Errors
    #[error("Invalid frame while there is a fragmented message in progress")]
    InvalidFrameFragmentation,

    #[error("Incoming fragmented message but there is one already in progress")]
    FragmentedInProgress,

    #[error("Invalid continuation frame: no fragmented message to continue")]
    InvalidContinuationFrame,

    // Message Errors
    #[error("Invalid Opcode")]
    InvalidOpcode,

    #[error("close frame payload must be empty or carry a 2-byte status code")]
    InvalidCloseFrame,

    // Lifecycle
    #[error("operation on an already closed connection")]
    ConnectionClosed,
}
