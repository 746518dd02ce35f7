//! Per-client connection handling
//!
//! One task per accepted socket:
//!
//! 1. Read the request head (bounded by `request_timeout`); 400 / 405 on
//!    anything but a well-formed GET.
//! 2. Wait for the buffer to hold a frame, or for shutdown.
//! 3. Single-frame mode: one `image/jpeg` response, then close.
//!    Continuous mode: a multipart response, one part per new frame, until
//!    the buffer is cleared, the client goes away or the server stops.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::timeout;

use crate::buffer::{Frame, FrameWatcher};
use crate::error::{Error, Result};
use crate::protocol::constants::MAX_HTTP_HEAD_SIZE;
use crate::protocol::http::{
    empty_response, image_response_head, read_head, stream_response_head, RequestLine,
};
use crate::protocol::multipart::encode_part;
use crate::server::config::ServerConfig;
use crate::stats::ServerCounters;

/// One HTTP client of the frame server
pub struct Connection {
    session_id: u64,
    stream: BufReader<TcpStream>,
    peer_addr: SocketAddr,
    config: Arc<ServerConfig>,
    watcher: FrameWatcher,
    shutdown: watch::Receiver<bool>,
    counters: Arc<ServerCounters>,
}

impl Connection {
    pub fn new(
        session_id: u64,
        socket: TcpStream,
        peer_addr: SocketAddr,
        config: Arc<ServerConfig>,
        watcher: FrameWatcher,
        shutdown: watch::Receiver<bool>,
        counters: Arc<ServerCounters>,
    ) -> Self {
        Self {
            session_id,
            stream: BufReader::new(socket),
            peer_addr,
            config,
            watcher,
            shutdown,
            counters,
        }
    }

    /// Serve this client until it is done
    pub async fn run(&mut self) -> Result<()> {
        let head = match timeout(
            self.config.request_timeout,
            read_head(&mut self.stream, MAX_HTTP_HEAD_SIZE),
        )
        .await
        {
            Err(_) => return Err(Error::Timeout),
            Ok(Err(Error::Io(e))) => return Err(Error::Io(e)),
            Ok(Err(e)) => {
                self.write(&empty_response(400, "Bad Request")).await?;
                return Err(e);
            }
            Ok(Ok(head)) => head,
        };

        let request = match RequestLine::parse(&head) {
            Some(request) => request,
            None => {
                tracing::debug!(session_id = self.session_id, "Malformed request line");
                self.write(&empty_response(400, "Bad Request")).await?;
                return Ok(());
            }
        };
        if request.method != "GET" {
            tracing::debug!(
                session_id = self.session_id,
                method = %request.method,
                "Method not allowed"
            );
            self.write(&empty_response(405, "Method Not Allowed")).await?;
            return Ok(());
        }

        tracing::debug!(
            session_id = self.session_id,
            peer = %self.peer_addr,
            target = %request.target,
            single_frame = self.config.single_frame,
            "Request accepted"
        );

        let frame = tokio::select! {
            frame = self.watcher.wait_for_frame() => frame,
            _ = shutdown_signalled(&mut self.shutdown) => {
                tracing::debug!(session_id = self.session_id, "Server stopped before first frame");
                return Ok(());
            }
        };

        if self.config.single_frame {
            self.serve_image(frame).await
        } else {
            self.serve_stream(frame).await
        }
    }

    async fn serve_image(&mut self, frame: Frame) -> Result<()> {
        let head = image_response_head(frame.len(), Utc::now());
        self.write(&head).await?;
        self.write(frame.data()).await?;
        self.counters.on_bytes_sent(head.len());
        self.counters.on_frame_sent(frame.len());

        let _ = self.stream.get_mut().shutdown().await;
        Ok(())
    }

    async fn serve_stream(&mut self, first: Frame) -> Result<()> {
        let head = stream_response_head();
        self.write(&head).await?;
        self.counters.on_bytes_sent(head.len());

        let mut current = first;
        loop {
            let part = encode_part(current.data());
            self.write(&part).await?;
            self.counters.on_frame_sent(current.len());
            self.counters.on_bytes_sent(part.len() - current.len());

            let next = tokio::select! {
                next = self.watcher.next_frame(&current) => next,
                _ = shutdown_signalled(&mut self.shutdown) => None,
            };
            match next {
                Some(frame) => current = frame,
                None => break,
            }
        }

        tracing::debug!(session_id = self.session_id, "Frame buffer cleared, ending stream");
        let _ = self.stream.get_mut().shutdown().await;
        Ok(())
    }

    /// Write and flush, bounded by the write timeout
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let socket = self.stream.get_mut();
        timeout(self.config.write_timeout, async {
            socket.write_all(data).await?;
            socket.flush().await
        })
        .await??;
        Ok(())
    }
}

/// Resolves once shutdown is signalled or the server is gone
pub(crate) async fn shutdown_signalled(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stopped| *stopped).await;
}

/// Reply to a connection over the limit
pub(crate) async fn reject_busy(socket: TcpStream, config: Arc<ServerConfig>) {
    // Consume the request so closing does not reset the connection.
    let mut reader = BufReader::new(socket);
    let _ = timeout(
        config.request_timeout,
        read_head(&mut reader, MAX_HTTP_HEAD_SIZE),
    )
    .await;
    let mut socket = reader.into_inner();

    let response = empty_response(503, "Service Unavailable");
    let _ = timeout(config.write_timeout, async {
        socket.write_all(&response).await?;
        socket.shutdown().await
    })
    .await;
}
