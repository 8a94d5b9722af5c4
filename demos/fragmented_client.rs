//! Exercises outbound fragmentation against an echo server: the frame
//! limit is lowered so ordinary sends split into Continue sequences, and
//! every echo is checked byte-for-byte against what went out.

use framelink::config::{ClientConfig, WebSocketConfig};
use framelink::error::Error;
use framelink::handshake::connect_async_with_config;
use framelink::message::Message;
use futures::StreamExt;
use log::info;

// Small on purpose, so even the mid-sized payloads below fragment
const FRAME_LIMIT: usize = 8 * 1024;

async fn echo_roundtrip(addr: &str) -> Result<(), Error> {
    let client_config = ClientConfig {
        web_socket_config: WebSocketConfig {
            max_frame_size: Some(FRAME_LIMIT),
            ..Default::default()
        },
        ..Default::default()
    };

    let mut ws_connection = connect_async_with_config(addr, Some(client_config)).await?;

    // One payload under the frame limit, one right at the boundary, one
    // that splits into several Continue frames
    for size in [1024usize, FRAME_LIMIT, 5 * FRAME_LIMIT] {
        let payload: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        ws_connection.send_as_binary(payload.clone()).await?;

        let echoed = await_binary_echo(&mut ws_connection).await?;
        assert_eq!(echoed, payload, "echo mismatch for {} bytes", size);
        info!("{} bytes went out fragmented and came back intact", size);
    }

    // The explicit surface picks its own fragment size instead of relying
    // on the configured limit
    let payload = vec![0x5A; 3 * FRAME_LIMIT];
    ws_connection
        .send_large_data_fragmented(payload.clone(), FRAME_LIMIT / 4)
        .await?;
    let echoed = await_binary_echo(&mut ws_connection).await?;
    assert_eq!(echoed, payload);
    info!("caller-sized fragments round-tripped as well");

    ws_connection.close_with_reason(1000, "done").await
}

// Echo servers may interleave pings with the data they send back; skip
// anything that is not the binary echo we are waiting for.
async fn await_binary_echo(
    ws_connection: &mut framelink::connection::WSConnection,
) -> Result<Vec<u8>, Error> {
    while let Some(result) = ws_connection.next().await {
        match result? {
            Message::Binary(body) => return Ok(body),
            Message::Close(reason) => {
                info!("server closed mid-exchange: {:?}", reason);
                break;
            }
            other => info!("skipping interleaved message: {:?}", other),
        }
    }
    Err(Error::ConnectionClosed)
}

#[tokio::main]
async fn main() {
    env_logger::init();
    if let Err(err) = echo_roundtrip("ws://127.0.0.1:9002").await {
        eprintln!("fragmented exchange failed: {}", err);
    }
}
