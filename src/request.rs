use crate::config::ClientConfig;
use crate::error::Error;
use bytes::BytesMut;
use std::collections::HashMap;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::{timeout, Duration};
use url::Url;

const HTTP_RESPONSE_DELIMITER: &[u8] = b"\r\n\r\n";
const MAX_RESPONSE_SIZE: usize = 1024 * 16;
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

// Function used for client connections, parsing the ws/wss URL into the
// upgrade request, which includes the Sec-WebSocket-Key, the URL path and
// another relevant info. It also returns the endpoint for the TCP connect,
// the bare hostname (needed later for SNI) and whether TLS is in play.
pub fn parse_to_http_request(
    ws_url: &str,
    key: &str,
    config: &ClientConfig,
) -> Result<(String, String, String, bool), Error> {
    if config.version != 13 {
        return Err(Error::UnsupportedVersion(config.version));
    }

    let parsed_url = Url::parse(ws_url)?;
    let mut use_tls = false;

    // Clause just to validate the user has passed the proper URL scheme,
    // and to pick the default port for when the URL carries none
    let scheme_port: u16 = match parsed_url.scheme() {
        "ws" => 80,
        "wss" => {
            use_tls = true;
            443
        }
        _ => return Err(Error::InvalidSchemeURL),
    };

    let host = parsed_url.host_str().ok_or(Error::URLNoHost)?;
    // An explicit URL port wins, then the configured fallback, then the
    // scheme default
    let port = parsed_url
        .port()
        .or(config.port)
        .unwrap_or(scheme_port);

    // The Host header only carries the port when the URL spelled one out
    let request_host_field = match parsed_url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => String::from(host),
    };

    // We need the port together with the host for establishing the TCP
    // connection regardless of how the URL was written
    let host_with_port = format!("{}:{}", host, port);

    let request_path = match parsed_url.query() {
        Some(query) => format!("{}?{}", parsed_url.path(), query),
        None => parsed_url.path().to_string(),
    };

    // Since we already have all the info, it isn't worth converting
    // everything to an HTTP request type; the request is assembled as a
    // string and turned into bytes at send time
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: Upgrade\r\nUpgrade: websocket\r\nSec-WebSocket-Key: {}\r\nSec-WebSocket-Version: {}\r\n\r\n",
        request_path,
        request_host_field,
        key,
        config.version,
    );

    Ok((request, host_with_port, String::from(host), use_tls))
}

/// The server's answer to the upgrade request. Header keys are normalized
/// to lowercase, so lookups are case-insensitive the way HTTP wants them.
#[derive(Debug)]
pub struct HttpResponse {
    pub status_code: u16,
    pub status_text: String,
    pub headers: HashMap<String, String>,
}

impl HttpResponse {
    /// Reads one HTTP response head off the stream and parses it.
    ///
    /// Consumes the stream only up to the `\r\n\r\n` terminator: a server
    /// that pushes its first frame right behind the 101 leaves those bytes
    /// buffered for the frame reader. The read is capped and bounded by a
    /// timeout so a peer that accepted the TCP connection but never
    /// answers the upgrade cannot park us here forever.
    pub async fn parse<T: AsyncBufRead + Unpin>(reader: &mut T) -> Result<HttpResponse, Error> {
        let mut response_buf = BytesMut::with_capacity(1024);

        timeout(RESPONSE_TIMEOUT, async {
            loop {
                let available = reader.fill_buf().await?;
                if available.is_empty() {
                    // EOF before the head ended
                    return Err(Error::IncompleteHTTPResponse);
                }
                let chunk_len = available.len();

                // The terminator may straddle two reads, so the scan
                // re-covers the last 3 bytes of what came before
                let scan_start = response_buf.len().saturating_sub(HTTP_RESPONSE_DELIMITER.len() - 1);
                response_buf.extend_from_slice(available);

                if let Some(position) = response_buf[scan_start..]
                    .windows(HTTP_RESPONSE_DELIMITER.len())
                    .position(|window| window == HTTP_RESPONSE_DELIMITER)
                {
                    let head_end = scan_start + position + HTTP_RESPONSE_DELIMITER.len();
                    let overshoot = response_buf.len() - head_end;
                    reader.consume(chunk_len - overshoot);
                    response_buf.truncate(head_end);
                    return Ok(());
                }

                reader.consume(chunk_len);
                if response_buf.len() > MAX_RESPONSE_SIZE {
                    return Err(Error::IncompleteHTTPResponse);
                }
            }
        })
        .await??;

        Self::from_bytes(&response_buf)
    }

    pub fn from_bytes(raw: &[u8]) -> Result<HttpResponse, Error> {
        let mut headers = [httparse::EMPTY_HEADER; 64];
        let mut response = httparse::Response::new(&mut headers);

        // httparse validates the status line for us, digits included
        match response.parse(raw)? {
            httparse::Status::Partial => Err(Error::IncompleteHTTPResponse),
            httparse::Status::Complete(_) => {
                let status_code = response.code.ok_or(Error::IncompleteHTTPResponse)?;
                let status_text = response.reason.unwrap_or_default().to_string();

                let mut header_map = HashMap::new();
                for header in response.headers.iter() {
                    let value = String::from_utf8_lossy(header.value).trim().to_string();
                    header_map.insert(header.name.to_lowercase(), value);
                }

                Ok(HttpResponse {
                    status_code,
                    status_text,
                    headers: header_map,
                })
            }
        }
    }

    pub fn get_header_value(&self, key: &str) -> Option<&str> {
        self.headers.get(&key.to_lowercase()).map(String::as_str)
    }
}
