use std::time::Duration;

/// Connection-level options for [`connect_async_with_config`].
///
/// [`connect_async_with_config`]: crate::handshake::connect_async_with_config
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub web_socket_config: WebSocketConfig,
    /// WebSocket protocol version sent in the handshake. Only 13 exists.
    pub version: u16,
    /// Extra PEM CA bundle trusted for `wss://` in addition to the
    /// built-in webpki roots.
    pub ca_file: Option<String>,
    /// Directory of PEM files, all loaded as additional trust anchors.
    pub ca_dir: Option<String>,
    /// Fallback port when the URL carries none; an explicit URL port wins,
    /// then this, then the scheme default (80/443).
    pub port: Option<u16>,
    /// Deadline for each TCP connect attempt. None blocks until the OS
    /// gives up.
    pub connect_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            web_socket_config: WebSocketConfig::default(),
            version: 13,
            ca_file: None,
            ca_dir: None,
            port: None,
            connect_timeout: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    pub max_frame_size: Option<usize>,
    pub max_message_size: Option<usize>,
    /// Applied to payload reads only, so idle connections stay up while a
    /// peer that stalls mid-frame gets dropped.
    pub read_timeout: Option<Duration>,
    /// When true (the default, and what RFC 6455 requires) a reserved
    /// opcode fails the connection; when false the frame is logged and
    /// dropped, which some test servers need.
    pub strict_opcodes: bool,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        WebSocketConfig {
            max_message_size: Some(64 << 20),
            max_frame_size: Some(16 << 20),
            read_timeout: Some(Duration::from_secs(5)),
            strict_opcodes: true,
        }
    }
}
