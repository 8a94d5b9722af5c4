use crate::codec::{self, FrameHeader};
use crate::config::{ClientConfig, WebSocketConfig};
use crate::error::Error;
use crate::frame::{Frame, OpCode};
use crate::handshake::{
    connect_async, derive_accept_key, generate_websocket_key, validate_server_response,
};
use crate::mask::apply_mask;
use crate::message::{CloseReason, Message};
use crate::read::ReadStream;
use crate::request::{parse_to_http_request, HttpResponse};
use crate::write::Writer;
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use futures::StreamExt;
use std::sync::Arc;
use tokio::io::{
    duplex, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc::{channel, Receiver};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

#[test]
fn test_opcode() {
    assert_eq!(OpCode::from(0x0), OpCode::Continue);
    assert_eq!(OpCode::from(0x1), OpCode::Text);
    assert_eq!(OpCode::from(0x2), OpCode::Binary);
    assert_eq!(OpCode::from(0x8), OpCode::Close);
    assert_eq!(OpCode::from(0x9), OpCode::Ping);
    assert_eq!(OpCode::from(0xA), OpCode::Pong);
    assert_eq!(OpCode::from(0x3), OpCode::Reserved(0x3));
    assert_eq!(OpCode::from(0xF), OpCode::Reserved(0xF));

    assert_eq!(OpCode::Text.as_u8(), 0x1);
    assert_eq!(OpCode::Reserved(0xB).as_u8(), 0xB);

    assert!(OpCode::Close.is_control());
    assert!(OpCode::Reserved(0xB).is_control());
    assert!(!OpCode::Reserved(0x3).is_control());
    assert!(!OpCode::Text.is_control());
}

#[test]
fn test_frame() {
    let frame = Frame::new(false, OpCode::Text, Vec::new());
    assert!(!frame.final_fragment);
    assert_eq!(frame.opcode, OpCode::Text);
    assert!(frame.payload.is_empty());
}

// --- codec ---

#[test]
fn encoded_len_uses_smallest_length_form() {
    // 7-bit lengths
    for n in [0usize, 1, 125] {
        assert_eq!(codec::encoded_len(n, false), 2 + n);
        assert_eq!(codec::encoded_len(n, true), 2 + 4 + n);
    }
    // 16-bit lengths
    for n in [126usize, 65_535] {
        assert_eq!(codec::encoded_len(n, false), 2 + 2 + n);
        assert_eq!(codec::encoded_len(n, true), 2 + 2 + 4 + n);
    }
    // 64-bit lengths
    assert_eq!(codec::encoded_len(65_536, true), 2 + 8 + 4 + 65_536);
}

#[test]
fn frame_roundtrips_through_the_codec() {
    for n in [0usize, 1, 125, 126, 127, 65_535, 65_536] {
        let payload: Vec<u8> = (0..n).map(|i| (i % 251) as u8).collect();
        let frame = Frame::new(true, OpCode::Binary, payload);

        let unmasked = codec::encode(&frame, None);
        assert_eq!(unmasked.len(), codec::encoded_len(n, false));
        assert_eq!(codec::decode(&unmasked, true).unwrap(), frame);

        let masked = codec::encode(&frame, Some([0x12, 0x34, 0x56, 0x78]));
        assert_eq!(masked.len(), codec::encoded_len(n, true));
        assert_eq!(codec::decode(&masked, true).unwrap(), frame);
    }
}

#[test]
fn masked_encode_sets_mask_bit_and_key() {
    let frame = Frame::new(true, OpCode::Text, b"Hello".to_vec());
    let key = [0xA1, 0xB2, 0xC3, 0xD4];
    let bytes = codec::encode(&frame, Some(key));

    assert_eq!(bytes[0], 0x81);
    assert_eq!(bytes[1], 0x85);
    assert_eq!(&bytes[2..6], &key);
    for (i, byte) in bytes[6..].iter().enumerate() {
        assert_eq!(*byte, b"Hello"[i] ^ key[i % 4]);
    }
}

#[test]
fn header_parse_handles_a_2_gib_announcement() {
    let mut header = vec![0x82, 127];
    header.extend_from_slice(&(1u64 << 31).to_be_bytes());

    let parsed = FrameHeader::parse(&header).unwrap();
    assert_eq!(parsed.payload_len, 1 << 31);
    assert_eq!(parsed.header_len, 10);
    assert_eq!(parsed.frame_len(), 10 + (1u64 << 31));
}

#[test]
fn truncated_buffers_are_rejected() {
    assert!(matches!(codec::decode(&[], true), Err(Error::TruncatedFrame)));
    assert!(matches!(
        codec::decode(&[0x81], true),
        Err(Error::TruncatedFrame)
    ));
    // announced 5 payload bytes, delivered 1
    assert!(matches!(
        codec::decode(&[0x81, 0x05, b'H'], true),
        Err(Error::TruncatedFrame)
    ));
    // 16-bit length field cut short
    assert!(matches!(
        codec::decode(&[0x81, 126, 0x00], true),
        Err(Error::TruncatedFrame)
    ));
}

#[test]
fn reserved_bits_require_an_extension() {
    for first_byte in [0xC1u8, 0xA1, 0x91] {
        assert!(matches!(
            codec::decode(&[first_byte, 0x01, b'x'], true),
            Err(Error::RSVNotZero)
        ));
    }
}

#[test]
fn control_frame_rules_are_enforced() {
    // ping with FIN clear
    assert!(matches!(
        codec::decode(&[0x09, 0x00], true),
        Err(Error::ControlFramesFragmented)
    ));

    // ping announcing a 200-byte payload
    let mut oversized = vec![0x89, 126, 0x00, 200];
    oversized.extend_from_slice(&[0u8; 200]);
    assert!(matches!(
        codec::decode(&oversized, true),
        Err(Error::ControlFramePayloadSize)
    ));
}

#[test]
fn reserved_opcodes_fail_in_strict_mode_only() {
    let raw = [0x83, 0x01, 0xAA];
    assert!(matches!(
        codec::decode(&raw, true),
        Err(Error::ReservedOpcode(0x3))
    ));

    let frame = codec::decode(&raw, false).unwrap();
    assert_eq!(frame.opcode, OpCode::Reserved(0x3));
    assert_eq!(frame.payload, vec![0xAA]);
}

// --- messages ---

#[test]
fn close_reason_payload_roundtrip() {
    assert_eq!(CloseReason::from_payload(&[]).unwrap(), None);
    assert!(matches!(
        CloseReason::from_payload(&[0x03]),
        Err(Error::InvalidCloseFrame)
    ));

    let reason = CloseReason {
        code: 1000,
        reason: String::from("done"),
    };
    let payload = reason.clone().into_payload();
    assert_eq!(&payload[..2], &[0x03, 0xE8]);
    assert_eq!(CloseReason::from_payload(&payload).unwrap(), Some(reason));
}

#[test]
fn text_messages_must_be_utf8() {
    let frame = Frame::new(true, OpCode::Text, vec![0xFF, 0xFE]);
    assert!(matches!(
        Message::from_data_frame(frame),
        Err(Error::FromUtf8Error { .. })
    ));
}

#[test]
fn large_messages_fragment_into_continue_frames() {
    let message = Message::Binary((0..10u8).collect());
    let frames = message.to_frames(4);

    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0].opcode, OpCode::Binary);
    assert!(!frames[0].final_fragment);
    assert_eq!(frames[1].opcode, OpCode::Continue);
    assert!(!frames[1].final_fragment);
    assert_eq!(frames[2].opcode, OpCode::Continue);
    assert!(frames[2].final_fragment);

    let reassembled: Vec<u8> = frames.into_iter().flat_map(|f| f.payload).collect();
    assert_eq!(reassembled, (0..10u8).collect::<Vec<u8>>());
}

// --- request building and response parsing ---

#[test]
fn test_parse_to_http_request_valid() {
    let config = ClientConfig::default();
    let (request, host_with_port, host, use_tls) =
        parse_to_http_request("ws://localhost:8080", "dGhlIHNhbXBsZSBub25jZQ==", &config)
            .unwrap();
    assert_eq!(host_with_port, "localhost:8080");
    assert_eq!(host, "localhost");
    assert!(!use_tls);
    assert!(request.starts_with("GET / HTTP/1.1"));
    assert!(request.contains("Host: localhost:8080"));
    assert!(request.contains("Upgrade: websocket"));
    assert!(request.contains("Connection: Upgrade"));
    assert!(request.contains("Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ=="));
    assert!(request.contains("Sec-WebSocket-Version: 13"));
    assert!(request.ends_with("\r\n\r\n"));
}

#[test]
fn test_parse_to_http_request_defaults() {
    let config = ClientConfig::default();
    let (request, host_with_port, _, _) =
        parse_to_http_request("ws://localhost", "a2V5", &config).unwrap();
    // scheme default port for the connect, bare hostname in the Host header
    assert_eq!(host_with_port, "localhost:80");
    assert!(request.contains("Host: localhost\r\n"));

    let (request, host_with_port, _, use_tls) =
        parse_to_http_request("wss://example.com", "a2V5", &config).unwrap();
    assert!(use_tls);
    assert_eq!(host_with_port, "example.com:443");
    assert!(request.starts_with("GET / HTTP/1.1"));
}

#[test]
fn test_parse_to_http_request_path_and_query() {
    let config = ClientConfig::default();
    let (request, _, _, _) =
        parse_to_http_request("ws://localhost:9001/chat?room=42", "a2V5", &config).unwrap();
    assert!(request.starts_with("GET /chat?room=42 HTTP/1.1"));
}

#[test]
fn test_parse_to_http_request_port_fallback() {
    let config = ClientConfig {
        port: Some(9001),
        ..Default::default()
    };
    // config port fills in when the URL has none, an explicit URL port wins
    let (_, host_with_port, _, _) =
        parse_to_http_request("ws://localhost", "a2V5", &config).unwrap();
    assert_eq!(host_with_port, "localhost:9001");

    let (_, host_with_port, _, _) =
        parse_to_http_request("ws://localhost:8080", "a2V5", &config).unwrap();
    assert_eq!(host_with_port, "localhost:8080");
}

#[test]
fn test_parse_to_http_request_invalid_scheme() {
    let config = ClientConfig::default();
    let result = parse_to_http_request("ftp://localhost:8080", "a2V5", &config);
    assert!(matches!(result, Err(Error::InvalidSchemeURL)));
}

#[test]
fn test_parse_to_http_request_no_host() {
    let config = ClientConfig::default();
    assert!(parse_to_http_request("ws://:8080", "a2V5", &config).is_err());
}

#[test]
fn test_parse_to_http_request_unsupported_version() {
    let config = ClientConfig {
        version: 12,
        ..Default::default()
    };
    assert!(matches!(
        parse_to_http_request("ws://localhost", "a2V5", &config),
        Err(Error::UnsupportedVersion(12))
    ));
}

fn upgrade_response(accept: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {}\r\n\r\n",
        accept
    )
    .into_bytes()
}

#[test]
fn response_headers_are_case_insensitive() {
    let raw = b"HTTP/1.1 101 Switching Protocols\r\nUPGRADE: WebSocket\r\nconnection: keep-alive, Upgrade\r\nSec-WebSocket-Accept: abc\r\n\r\n";
    let response = HttpResponse::from_bytes(raw).unwrap();

    assert_eq!(response.status_code, 101);
    assert_eq!(response.status_text, "Switching Protocols");
    assert_eq!(response.get_header_value("Upgrade"), Some("WebSocket"));
    assert_eq!(
        response.get_header_value("CONNECTION"),
        Some("keep-alive, Upgrade")
    );
}

#[test]
fn partial_response_is_rejected() {
    let raw = b"HTTP/1.1 101 Switching Proto";
    assert!(matches!(
        HttpResponse::from_bytes(raw),
        Err(Error::IncompleteHTTPResponse)
    ));
}

// RFC 6455 section 1.3 worked example
#[test]
fn accept_key_matches_the_rfc_vector() {
    assert_eq!(
        derive_accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
        "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
    );
}

#[test]
fn websocket_key_is_16_random_bytes() {
    let key = generate_websocket_key();
    let decoded = BASE64_STANDARD.decode(&key).unwrap();
    assert_eq!(decoded.len(), 16);
    assert_ne!(key, generate_websocket_key());
}

#[test]
fn server_response_validation() {
    let key = "dGhlIHNhbXBsZSBub25jZQ==";

    let good = HttpResponse::from_bytes(&upgrade_response(&derive_accept_key(key))).unwrap();
    assert!(validate_server_response(&good, key).is_ok());

    let tampered = HttpResponse::from_bytes(&upgrade_response("bm90IHRoZSByaWdodCBrZXk=")).unwrap();
    assert!(matches!(
        validate_server_response(&tampered, key),
        Err(Error::InvalidAcceptKey)
    ));

    let refused =
        HttpResponse::from_bytes(b"HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\n\r\n").unwrap();
    assert!(matches!(
        validate_server_response(&refused, key),
        Err(Error::HandshakeStatusCode(403))
    ));

    let no_upgrade = HttpResponse::from_bytes(
        b"HTTP/1.1 101 Switching Protocols\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: abc\r\n\r\n",
    )
    .unwrap();
    assert!(matches!(
        validate_server_response(&no_upgrade, key),
        Err(Error::MissingUpgradeHeader)
    ));
}

// --- reader scenarios over an in-memory transport ---

fn spawn_read_stream(
    client_end: DuplexStream,
    config: WebSocketConfig,
) -> (
    Receiver<Result<Message, Error>>,
    JoinHandle<Result<(), Error>>,
) {
    let (read_half, write_half) = tokio::io::split(client_end);
    let writer = Arc::new(Mutex::new(Writer::new(write_half)));
    let (read_tx, read_rx) = channel(16);
    let mut read_stream = ReadStream::new(BufReader::new(read_half), read_tx, writer, config);
    let handle = tokio::spawn(async move { read_stream.poll_messages().await });
    (read_rx, handle)
}

// Reads one frame the way a server would, unmasking the client payload
async fn read_client_frame<S: AsyncRead + Unpin>(stream: &mut S) -> (u8, Vec<u8>) {
    let mut head = [0u8; 2];
    stream.read_exact(&mut head).await.unwrap();
    let opcode = head[0] & 0x0F;
    let masked = head[1] & 0x80 != 0;
    let mut len = (head[1] & 0x7F) as usize;
    if len == 126 {
        let mut ext = [0u8; 2];
        stream.read_exact(&mut ext).await.unwrap();
        len = u16::from_be_bytes(ext) as usize;
    } else if len == 127 {
        let mut ext = [0u8; 8];
        stream.read_exact(&mut ext).await.unwrap();
        len = u64::from_be_bytes(ext) as usize;
    }
    let mut key = [0u8; 4];
    if masked {
        stream.read_exact(&mut key).await.unwrap();
    }
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await.unwrap();
    if masked {
        apply_mask(key, &mut payload);
    }
    (opcode, payload)
}

#[tokio::test]
async fn single_text_frame_becomes_a_message() {
    let (client_end, mut server_end) = duplex(4096);
    let (mut rx, _handle) = spawn_read_stream(client_end, WebSocketConfig::default());

    server_end
        .write_all(&[0x81, 0x05, b'H', b'e', b'l', b'l', b'o'])
        .await
        .unwrap();

    match rx.recv().await.unwrap().unwrap() {
        Message::Text(text) => assert_eq!(text, "Hello"),
        other => panic!("expected text message, got {:?}", other),
    }
}

#[tokio::test]
async fn fragmented_binary_reassembles() {
    let (client_end, mut server_end) = duplex(4096);
    let (mut rx, _handle) = spawn_read_stream(client_end, WebSocketConfig::default());

    server_end
        .write_all(&[0x02, 0x03, 0xA0, 0xA1, 0xA2])
        .await
        .unwrap();
    server_end.write_all(&[0x80, 0x02, 0xA3, 0xA4]).await.unwrap();

    match rx.recv().await.unwrap().unwrap() {
        Message::Binary(body) => assert_eq!(body, vec![0xA0, 0xA1, 0xA2, 0xA3, 0xA4]),
        other => panic!("expected binary message, got {:?}", other),
    }
}

#[tokio::test]
async fn ping_between_fragments_is_answered_and_surfaced() {
    let (client_end, mut server_end) = duplex(4096);
    let (mut rx, _handle) = spawn_read_stream(client_end, WebSocketConfig::default());

    server_end
        .write_all(&[0x02, 0x03, 0xA0, 0xA1, 0xA2])
        .await
        .unwrap();
    server_end
        .write_all(&[0x89, 0x04, b'p', b'i', b'n', b'g'])
        .await
        .unwrap();
    server_end.write_all(&[0x80, 0x02, 0xA3, 0xA4]).await.unwrap();

    // the control frame does not disturb the fragment sequence
    match rx.recv().await.unwrap().unwrap() {
        Message::Ping(payload) => assert_eq!(payload, b"ping"),
        other => panic!("expected ping first, got {:?}", other),
    }
    match rx.recv().await.unwrap().unwrap() {
        Message::Binary(body) => assert_eq!(body, vec![0xA0, 0xA1, 0xA2, 0xA3, 0xA4]),
        other => panic!("expected binary message, got {:?}", other),
    }

    // and the client answered with a masked pong echoing the payload
    let (opcode, payload) = read_client_frame(&mut server_end).await;
    assert_eq!(opcode, 0xA);
    assert_eq!(payload, b"ping");
}

#[tokio::test]
async fn close_frame_is_echoed_with_the_peers_payload() {
    let (client_end, mut server_end) = duplex(4096);
    let (mut rx, handle) = spawn_read_stream(client_end, WebSocketConfig::default());

    // close, status 1000
    server_end.write_all(&[0x88, 0x02, 0x03, 0xE8]).await.unwrap();

    match rx.recv().await.unwrap().unwrap() {
        Message::Close(Some(reason)) => {
            assert_eq!(reason.code, 1000);
            assert!(reason.reason.is_empty());
        }
        other => panic!("expected close message, got {:?}", other),
    }

    let (opcode, payload) = read_client_frame(&mut server_end).await;
    assert_eq!(opcode, 0x8);
    assert_eq!(payload, vec![0x03, 0xE8]);

    // a clean close handshake ends the loop without an error
    assert!(handle.await.unwrap().is_ok());
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn client_frames_are_masked_on_the_wire() {
    let (client_end, mut server_end) = duplex(4096);
    let (_read_half, write_half) = tokio::io::split(client_end);
    let mut writer = Writer::new(write_half);

    writer
        .write_frame(Frame::new(true, OpCode::Text, b"Hello".to_vec()))
        .await
        .unwrap();

    let mut head = [0u8; 2];
    server_end.read_exact(&mut head).await.unwrap();
    assert_eq!(head, [0x81, 0x85]);

    let mut key = [0u8; 4];
    server_end.read_exact(&mut key).await.unwrap();
    let mut masked = [0u8; 5];
    server_end.read_exact(&mut masked).await.unwrap();

    for (i, byte) in masked.iter().enumerate() {
        assert_eq!(*byte, b"Hello"[i] ^ key[i % 4]);
    }
}

#[tokio::test]
async fn writer_refuses_frames_after_close() {
    let (client_end, _server_end) = duplex(4096);
    let (_read_half, write_half) = tokio::io::split(client_end);
    let mut writer = Writer::new(write_half);

    writer.write_close(Vec::new()).await.unwrap();
    // close is idempotent, data is not
    assert!(writer.write_close(Vec::new()).await.is_ok());
    assert!(matches!(
        writer
            .write_frame(Frame::new(true, OpCode::Text, Vec::new()))
            .await,
        Err(Error::ConnectionClosed)
    ));
}

#[tokio::test]
async fn masked_server_frames_are_a_protocol_error() {
    let (client_end, mut server_end) = duplex(4096);
    let (_rx, handle) = spawn_read_stream(client_end, WebSocketConfig::default());

    server_end
        .write_all(&[0x81, 0x85, 1, 2, 3, 4, b'H' ^ 1, b'e' ^ 2, b'l' ^ 3, b'l' ^ 4, b'o' ^ 1])
        .await
        .unwrap();

    assert!(matches!(
        handle.await.unwrap(),
        Err(Error::MaskedFrameFromServer)
    ));
}

#[tokio::test]
async fn data_frame_during_fragmentation_fails_the_connection() {
    let (client_end, mut server_end) = duplex(4096);
    let (_rx, handle) = spawn_read_stream(client_end, WebSocketConfig::default());

    server_end.write_all(&[0x01, 0x01, b'a']).await.unwrap();
    server_end.write_all(&[0x81, 0x01, b'b']).await.unwrap();

    assert!(matches!(
        handle.await.unwrap(),
        Err(Error::InvalidFrameFragmentation)
    ));
}

#[tokio::test]
async fn second_fragmented_start_fails_the_connection() {
    let (client_end, mut server_end) = duplex(4096);
    let (_rx, handle) = spawn_read_stream(client_end, WebSocketConfig::default());

    server_end.write_all(&[0x01, 0x01, b'a']).await.unwrap();
    server_end.write_all(&[0x02, 0x01, b'b']).await.unwrap();

    assert!(matches!(
        handle.await.unwrap(),
        Err(Error::FragmentedInProgress)
    ));
}

#[tokio::test]
async fn stray_continuation_frame_fails_the_connection() {
    let (client_end, mut server_end) = duplex(4096);
    let (_rx, handle) = spawn_read_stream(client_end, WebSocketConfig::default());

    server_end.write_all(&[0x80, 0x00]).await.unwrap();

    assert!(matches!(
        handle.await.unwrap(),
        Err(Error::InvalidContinuationFrame)
    ));
}

#[tokio::test]
async fn frames_above_the_size_limit_are_rejected() {
    let config = WebSocketConfig {
        max_frame_size: Some(4),
        ..Default::default()
    };
    let (client_end, mut server_end) = duplex(4096);
    let (_rx, handle) = spawn_read_stream(client_end, config);

    server_end
        .write_all(&[0x81, 0x05, b'H', b'e', b'l', b'l', b'o'])
        .await
        .unwrap();

    assert!(matches!(handle.await.unwrap(), Err(Error::MaxFrameSize)));
}

#[tokio::test]
async fn permissive_mode_drops_reserved_opcode_frames() {
    let config = WebSocketConfig {
        strict_opcodes: false,
        ..Default::default()
    };
    let (client_end, mut server_end) = duplex(4096);
    let (mut rx, _handle) = spawn_read_stream(client_end, config);

    server_end.write_all(&[0x83, 0x01, 0xAA]).await.unwrap();
    server_end.write_all(&[0x81, 0x02, b'o', b'k']).await.unwrap();

    // the reserved frame is consumed silently, the next frame still parses
    match rx.recv().await.unwrap().unwrap() {
        Message::Text(text) => assert_eq!(text, "ok"),
        other => panic!("expected text message, got {:?}", other),
    }
}

#[tokio::test]
async fn strict_mode_fails_on_reserved_opcodes() {
    let (client_end, mut server_end) = duplex(4096);
    let (_rx, handle) = spawn_read_stream(client_end, WebSocketConfig::default());

    server_end.write_all(&[0x83, 0x01, 0xAA]).await.unwrap();

    assert!(matches!(
        handle.await.unwrap(),
        Err(Error::ReservedOpcode(0x3))
    ));
}

// --- full connect against a loopback upgrade server ---

async fn read_request_head<S: AsyncRead + Unpin>(socket: &mut S) -> String {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 1024];
    loop {
        let n = socket.read(&mut tmp).await.unwrap();
        buf.extend_from_slice(&tmp[..n]);
        if n == 0 || buf.windows(4).any(|window| window == b"\r\n\r\n") {
            break;
        }
    }
    String::from_utf8(buf).unwrap()
}

fn request_websocket_key(head: &str) -> String {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("sec-websocket-key"))
        .map(|(_, value)| value.trim().to_string())
        .expect("request carries no Sec-WebSocket-Key")
}

async fn answer_upgrade<S: AsyncRead + AsyncWrite + Unpin>(socket: &mut S) {
    let head = read_request_head(socket).await;
    assert!(head.starts_with("GET / HTTP/1.1"));
    let accept = derive_accept_key(&request_websocket_key(&head));
    socket
        .write_all(upgrade_response(&accept).as_slice())
        .await
        .unwrap();
}

#[tokio::test]
async fn connect_echo_and_close_roundtrip() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        answer_upgrade(&mut socket).await;

        // echo one text frame back unmasked, server style
        let (opcode, payload) = read_client_frame(&mut socket).await;
        assert_eq!(opcode, 0x1);
        let mut echo = vec![0x81, payload.len() as u8];
        echo.extend_from_slice(&payload);
        socket.write_all(&echo).await.unwrap();

        // then answer the client's close
        let (opcode, payload) = read_client_frame(&mut socket).await;
        assert_eq!(opcode, 0x8);
        let mut close = vec![0x88, payload.len() as u8];
        close.extend_from_slice(&payload);
        socket.write_all(&close).await.unwrap();
    });

    let mut connection = connect_async(&format!("ws://127.0.0.1:{}", addr.port()))
        .await
        .unwrap();

    connection.send_as_text(String::from("Hello")).await.unwrap();
    match connection.next().await {
        Some(Ok(Message::Text(text))) => assert_eq!(text, "Hello"),
        other => panic!("expected echoed text, got {:?}", other),
    }

    connection.close_connection().await.unwrap();
    match connection.next().await {
        Some(Ok(Message::Close(None))) => {}
        other => panic!("expected close echo, got {:?}", other),
    }
    assert!(connection.next().await.is_none());

    server.await.unwrap();
}

#[tokio::test]
async fn connect_rejects_a_bad_accept_key() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let _ = read_request_head(&mut socket).await;
        socket
            .write_all(upgrade_response("bm90IHRoZSByaWdodCBrZXk=").as_slice())
            .await
            .unwrap();
    });

    let result = connect_async(&format!("ws://127.0.0.1:{}", addr.port())).await;
    assert!(matches!(result, Err(Error::InvalidAcceptKey)));
}

#[tokio::test]
async fn connect_rejects_a_refused_upgrade() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let _ = read_request_head(&mut socket).await;
        socket
            .write_all(b"HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\n\r\n")
            .await
            .unwrap();
    });

    let result = connect_async(&format!("ws://127.0.0.1:{}", addr.port())).await;
    assert!(matches!(result, Err(Error::HandshakeStatusCode(403))));
}
