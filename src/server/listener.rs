//! MJPEG server listener
//!
//! Owns the listening socket and the accept loop, and spawns connection
//! handlers into a `JoinSet` so that `stop` can reach all of them.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};

use crate::buffer::FrameBuffer;
use crate::error::{Result, ServerError};
use crate::server::config::ServerConfig;
use crate::server::connection::{reject_busy, shutdown_signalled, Connection};
use crate::stats::{ServerCounters, ServerStats};

/// MJPEG frame server
///
/// Serves the contents of a [`FrameBuffer`] to any number of HTTP clients.
///
/// # Example
/// ```no_run
/// use mjpeg_rs::buffer::FrameBuffer;
/// use mjpeg_rs::server::{MjpegServer, ServerConfig};
///
/// # async fn example() -> mjpeg_rs::error::Result<()> {
/// let buffer = FrameBuffer::new();
/// let mut server = MjpegServer::new(ServerConfig::with_port(8080), buffer.clone());
/// let port = server.start().await?;
///
/// buffer.publish(std::fs::read("frame.jpg")?);
/// // ... clients on http://host:{port}/ now see the frame
///
/// server.stop().await?;
/// # Ok(())
/// # }
/// ```
pub struct MjpegServer {
    config: ServerConfig,
    buffer: FrameBuffer,
    counters: Arc<ServerCounters>,
    running: Option<Running>,
}

/// A listening session
struct Running {
    port: u16,
    shutdown: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

impl MjpegServer {
    /// Create a server that will serve `buffer`
    pub fn new(config: ServerConfig, buffer: FrameBuffer) -> Self {
        Self {
            config,
            buffer,
            counters: Arc::new(ServerCounters::new()),
            running: None,
        }
    }

    /// Bind and start accepting connections.
    ///
    /// Returns the bound port. With a configured port of 0 an ephemeral port
    /// is picked first, so the port is known before the listener exists.
    pub async fn start(&mut self) -> Result<u16> {
        if self.running.is_some() {
            return Err(ServerError::AlreadyListening.into());
        }

        let port = match self.config.port {
            0 => self.probe_port().await?,
            port => port,
        };
        let addr = self.config.socket_addr(port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        tracing::info!(
            addr = %addr,
            single_frame = self.config.single_frame,
            "MJPEG server listening"
        );

        let (shutdown, shutdown_rx) = watch::channel(false);
        self.counters = Arc::new(ServerCounters::new());

        let acceptor = Acceptor {
            config: Arc::new(self.config.clone()),
            buffer: self.buffer.clone(),
            counters: Arc::clone(&self.counters),
            shutdown: shutdown_rx,
            connection_semaphore: if self.config.max_connections > 0 {
                Some(Arc::new(Semaphore::new(self.config.max_connections)))
            } else {
                None
            },
            next_session_id: 1,
            connections: JoinSet::new(),
        };

        self.running = Some(Running {
            port,
            shutdown,
            accept_task: tokio::spawn(acceptor.run(listener)),
        });

        Ok(port)
    }

    /// Stop listening and end all connections.
    ///
    /// The buffer is cleared so streaming clients finish on their own;
    /// whatever is still running after the grace period is closed.
    pub async fn stop(&mut self) -> Result<()> {
        let running = self.running.take().ok_or(ServerError::NotListening)?;

        self.buffer.clear();
        running.shutdown.send_replace(true);

        if let Err(e) = running.accept_task.await {
            if !e.is_cancelled() {
                tracing::error!(error = %e, "Accept task failed");
            }
        }

        tracing::info!(port = running.port, "MJPEG server stopped");
        Ok(())
    }

    /// Change the port. Rejected while listening.
    pub fn set_port(&mut self, port: u16) -> Result<()> {
        if self.running.is_some() {
            tracing::warn!(requested = port, "Cannot change port while listening");
            return Err(ServerError::AlreadyListening.into());
        }
        self.config.port = port;
        Ok(())
    }

    /// Switch between single-image and multipart mode. Rejected while listening.
    pub fn set_single_frame(&mut self, single: bool) -> Result<()> {
        if self.running.is_some() {
            tracing::warn!(requested = single, "Cannot change mode while listening");
            return Err(ServerError::AlreadyListening.into());
        }
        self.config.single_frame = single;
        Ok(())
    }

    /// Bound port while listening, configured port otherwise
    pub fn port(&self) -> u16 {
        match self.running {
            Some(ref running) => running.port,
            None => self.config.port,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.running.is_some()
    }

    pub fn is_single_frame(&self) -> bool {
        self.config.single_frame
    }

    /// The buffer being served
    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    /// Statistics snapshot for the current (or last) session
    pub fn stats(&self) -> ServerStats {
        self.counters.snapshot()
    }

    /// Bind port 0, read back the assigned port and release it
    async fn probe_port(&self) -> Result<u16> {
        let addr = self.config.socket_addr(0);
        let probe = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let port = probe.local_addr()?.port();
        drop(probe);

        tracing::debug!(port, "Ephemeral port selected");
        Ok(port)
    }
}

impl Drop for MjpegServer {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.shutdown.send_replace(true);
            // Dropping the accept task's JoinSet aborts every connection.
            running.accept_task.abort();
        }
    }
}

/// Accept loop state, owned by the accept task
struct Acceptor {
    config: Arc<ServerConfig>,
    buffer: FrameBuffer,
    counters: Arc<ServerCounters>,
    shutdown: watch::Receiver<bool>,
    connection_semaphore: Option<Arc<Semaphore>>,
    next_session_id: u64,
    connections: JoinSet<()>,
}

impl Acceptor {
    async fn run(mut self, listener: TcpListener) {
        loop {
            tokio::select! {
                _ = shutdown_signalled(&mut self.shutdown) => break,
                accepted = listener.accept() => match accepted {
                    Ok((socket, peer_addr)) => self.handle_connection(socket, peer_addr),
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to accept connection");
                    }
                },
                Some(_) = self.connections.join_next(), if !self.connections.is_empty() => {}
            }
        }

        // No new connections from here on.
        drop(listener);
        self.drain().await;
    }

    fn handle_connection(&mut self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    self.counters.on_reject();
                    self.connections
                        .spawn(reject_busy(socket, Arc::clone(&self.config)));
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id;
        self.next_session_id += 1;

        tracing::debug!(
            session_id = session_id,
            peer = %peer_addr,
            "New connection"
        );

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::error!(error = %e, "Failed to configure socket");
                return;
            }
        }

        let mut connection = Connection::new(
            session_id,
            socket,
            peer_addr,
            Arc::clone(&self.config),
            self.buffer.watch(),
            self.shutdown.clone(),
            Arc::clone(&self.counters),
        );
        self.counters.on_accept();
        let active = ActiveGuard(Arc::clone(&self.counters));

        self.connections.spawn(async move {
            let _permit = permit;
            let _active = active;

            if let Err(e) = connection.run().await {
                tracing::debug!(
                    session_id = session_id,
                    error = %e,
                    "Connection error"
                );
            }

            tracing::debug!(session_id = session_id, "Connection closed");
        });
    }

    /// Give connections the grace period, then close the rest
    async fn drain(&mut self) {
        let connections = &mut self.connections;
        let finished = tokio::time::timeout(self.config.shutdown_grace, async {
            while connections.join_next().await.is_some() {}
        })
        .await;

        if finished.is_err() {
            tracing::warn!(
                remaining = self.connections.len(),
                "Closing connections after grace period"
            );
            self.connections.shutdown().await;
        }
    }
}

/// Keeps the active connection count right even when a handler is aborted
struct ActiveGuard(Arc<ServerCounters>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.on_close();
    }
}
