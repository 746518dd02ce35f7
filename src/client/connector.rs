//! HTTP connection setup for the reader
//!
//! Opens the TCP connection, sends the GET request and validates the
//! response head. The body is left positioned at the first multipart part.

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::config::{ClientConfig, MjpegUrl};
use crate::error::{Error, Result};
use crate::protocol::constants::MAX_HTTP_HEAD_SIZE;
use crate::protocol::http::{build_get_request, read_head, StatusLine};
use crate::protocol::multipart::header_value;

/// An open MJPEG HTTP response
pub struct MjpegConnector {
    stream: BufReader<TcpStream>,
    url: MjpegUrl,
    content_type: Option<String>,
}

impl MjpegConnector {
    /// Connect to the configured URL.
    ///
    /// The whole exchange (TCP connect, request, response head) is bounded by
    /// `connect_timeout`.
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let url = config.parse_url()?;
        let authorization = match config.effective_credentials(&url) {
            Some(creds) => Some(creds.authorization()?),
            None => None,
        };

        timeout(config.connect_timeout, Self::open(config, url, authorization))
            .await
            .map_err(|_| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "connect timed out",
                ))
            })?
    }

    async fn open(config: &ClientConfig, url: MjpegUrl, authorization: Option<String>) -> Result<Self> {
        tracing::debug!(target = %url.socket_target(), path = %url.path, "Connecting");

        let socket = TcpStream::connect(url.socket_target()).await?;
        socket.set_nodelay(true)?;
        let mut stream = BufReader::new(socket);

        let request = build_get_request(
            &url.host_header(),
            url.port,
            &url.path,
            authorization.as_deref(),
            &config.user_agent,
        );
        stream.get_mut().write_all(&request).await?;
        stream.get_mut().flush().await?;

        let head = read_head(&mut stream, MAX_HTTP_HEAD_SIZE).await?;
        let status = StatusLine::parse(&head)?;
        status.check()?;

        let content_type = header_value(&head, "content-type");
        tracing::debug!(
            code = status.code,
            content_type = content_type.as_deref().unwrap_or("-"),
            "Response head received"
        );

        Ok(Self {
            stream,
            url,
            content_type,
        })
    }

    /// Parsed target of this connection
    pub fn url(&self) -> &MjpegUrl {
        &self.url
    }

    /// `Content-Type` of the response, if the server sent one
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Hand over the buffered body stream
    pub fn into_reader(self) -> BufReader<TcpStream> {
        self.stream
    }
}
