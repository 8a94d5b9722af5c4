//! Async client-side WebSockets for the Tokio stack.
//!
//! This library implements the client half of the
//! [WebSocket Protocol RFC](https://datatracker.ietf.org/doc/html/rfc6455):
//! it dials a `ws://` or `wss://` URL, performs the HTTP upgrade handshake,
//! and then exchanges framed messages until either side closes. Frames are
//! masked with a fresh random key each (XOR'd with 128-bit SIMD on payloads
//! of 16 bytes and up), fragmented messages are reassembled transparently,
//! and ping/close frames are answered automatically.
//!
//! The entry point is [`handshake::connect_async`], which yields a
//! [`connection::WSConnection`]: a `Stream` of incoming
//! [`message::Message`]s with a send API on the side, splittable into
//! independent read and write halves for two-worker setups.

pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod mask;
pub mod message;
pub mod split;
pub mod stream;

mod read;
mod request;
mod write;

#[cfg(test)]
mod tests;
