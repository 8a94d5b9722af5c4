use crate::config::ClientConfig;
use crate::connection::WSConnection;
use crate::error::Error;
use crate::read::ReadStream;
use crate::request::{parse_to_http_request, HttpResponse};
use crate::split::{WsReader, WsWriter};
use crate::stream::WsStream;
use crate::write::Writer;
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use log::{debug, warn};
use pki_types::ServerName;
use rustls::RootCertStore;
use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::BufReader as StdBufReader;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{split, AsyncWriteExt, BufReader};
use tokio::net::{lookup_host, TcpStream};
use tokio::sync::mpsc::channel;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tokio_stream::wrappers::ReceiverStream;

// Value comes from the RFC page 19 bullet number 4.
// https://datatracker.ietf.org/doc/html/rfc6455#page-19
const WS_KEY_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

const MESSAGE_CHANNEL_SIZE: usize = 100;

/// The base64 nonce sent as `Sec-WebSocket-Key`: 16 random bytes per
/// connection attempt.
pub fn generate_websocket_key() -> String {
    let random_bytes: [u8; 16] = rand::random();
    BASE64_STANDARD.encode(random_bytes)
}

/// Derives the `Sec-WebSocket-Accept` value the server must answer with:
/// SHA-1 over the exact key string concatenated with the RFC GUID,
/// base64-encoded.
pub fn derive_accept_key(key: &str) -> String {
    let mut sha1 = Sha1::new();
    sha1.update(key.as_bytes());
    sha1.update(WS_KEY_GUID.as_bytes());
    BASE64_STANDARD.encode(sha1.finalize())
}

/// Connects to a `ws://` or `wss://` URL with default configuration and
/// performs the upgrade handshake.
pub async fn connect_async(addr: &str) -> Result<WSConnection, Error> {
    connect_async_with_config(addr, None).await
}

/// Connects with explicit [`ClientConfig`]: TCP (iterating every resolved
/// address until one accepts), TLS with SNI for `wss://`, the HTTP upgrade
/// exchange, and finally the reader task that feeds the returned
/// connection's message stream.
pub async fn connect_async_with_config(
    addr: &str,
    config: Option<ClientConfig>,
) -> Result<WSConnection, Error> {
    let config = config.unwrap_or_default();
    let key = generate_websocket_key();

    let (request, host_with_port, host, use_tls) = parse_to_http_request(addr, &key, &config)?;

    let stream = open_transport(&host_with_port, &host, use_tls, &config).await?;

    // Split before the upgrade: the response is read through the same
    // buffered reader the frame loop inherits, so a server that sends its
    // first frame on the heels of the 101 loses nothing
    let (read_half, mut write_half) = split(stream);
    let mut buf_reader = BufReader::new(read_half);

    write_half.write_all(request.as_bytes()).await?;

    let response = HttpResponse::parse(&mut buf_reader).await?;
    // Dropping both halves on a failed validation tears the TCP/TLS
    // session down with them
    validate_server_response(&response, &key)?;

    let writer = Arc::new(Mutex::new(Writer::new(write_half)));

    let (read_tx, read_rx) = channel(MESSAGE_CHANNEL_SIZE);
    let mut read_stream = ReadStream::new(
        buf_reader,
        read_tx,
        writer.clone(),
        config.web_socket_config.clone(),
    );

    // The reader owns its half of the connection for as long as the
    // connection lives; when this task finishes, the channel closes and
    // the consumer's stream ends
    tokio::spawn(async move {
        if let Err(error) = read_stream.poll_messages().await {
            let _ = read_stream.read_tx.send(Err(error)).await;
        }
    });

    Ok(WSConnection::new(
        WsReader::new(ReceiverStream::new(read_rx)),
        WsWriter::new(writer, config.web_socket_config),
    ))
}

/// Opens the byte stream the connection will run over: resolve, try each
/// address in turn, then wrap in TLS when the scheme asked for it.
async fn open_transport(
    host_with_port: &str,
    host: &str,
    use_tls: bool,
    config: &ClientConfig,
) -> Result<WsStream, Error> {
    let addrs: Vec<_> = lookup_host(host_with_port).await?.collect();

    let mut tcp_stream = None;
    for addr in addrs {
        let attempt = match config.connect_timeout {
            Some(limit) => match timeout(limit, TcpStream::connect(addr)).await {
                Ok(result) => result,
                Err(elapsed) => Err(elapsed.into()),
            },
            None => TcpStream::connect(addr).await,
        };
        match attempt {
            Ok(stream) => {
                tcp_stream = Some(stream);
                break;
            }
            Err(err) => debug!("connect to {} failed: {}", addr, err),
        }
    }
    let tcp_stream = tcp_stream.ok_or(Error::NoValidAddress)?;

    if !use_tls {
        return Ok(WsStream::Plain(tcp_stream));
    }

    let connector = build_tls_connector(config)?;
    // SNI carries the hostname from the URL, owned because the connection
    // outlives this call
    let server_name = ServerName::try_from(host.to_string())?;
    let tls_stream = connector.connect(server_name, tcp_stream).await?;
    Ok(WsStream::Secure(Box::new(tls_stream)))
}

fn build_tls_connector(config: &ClientConfig) -> Result<TlsConnector, Error> {
    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if let Some(ca_file) = &config.ca_file {
        add_pem_trust_anchors(Path::new(ca_file), &mut root_store)?;
    }
    if let Some(ca_dir) = &config.ca_dir {
        for entry in std::fs::read_dir(ca_dir)? {
            let path = entry?.path();
            let is_pem = path
                .extension()
                .map(|ext| ext == "pem" || ext == "crt")
                .unwrap_or(false);
            if is_pem {
                add_pem_trust_anchors(&path, &mut root_store)?;
            }
        }
    }

    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(tls_config)))
}

fn add_pem_trust_anchors(path: &Path, root_store: &mut RootCertStore) -> Result<(), Error> {
    let mut pem_reader = StdBufReader::new(File::open(path)?);
    for cert in rustls_pemfile::certs(&mut pem_reader) {
        if let Err(err) = root_store.add(cert?) {
            warn!("skipping trust anchor from {}: {}", path.display(), err);
        }
    }
    Ok(())
}

/// Checks the server's answer against RFC 6455 section 4.1: the status
/// must be 101, the upgrade and connection headers must commit to the
/// websocket upgrade, and the accept key must prove the server saw our
/// exact nonce.
pub(crate) fn validate_server_response(
    response: &HttpResponse,
    sent_key: &str,
) -> Result<(), Error> {
    if response.status_code != 101 {
        return Err(Error::HandshakeStatusCode(response.status_code));
    }

    let upgrade = response
        .get_header_value("upgrade")
        .ok_or(Error::MissingUpgradeHeader)?;
    if upgrade.to_lowercase() != "websocket" {
        return Err(Error::MissingUpgradeHeader);
    }

    let connection = response
        .get_header_value("connection")
        .ok_or(Error::MissingConnectionHeader)?;
    if !connection.to_lowercase().contains("upgrade") {
        return Err(Error::MissingConnectionHeader);
    }

    let accept = response
        .get_header_value("sec-websocket-accept")
        .ok_or(Error::InvalidAcceptKey)?;
    if accept != derive_accept_key(sent_key) {
        return Err(Error::InvalidAcceptKey);
    }

    Ok(())
}
