//! Frame streamer
//!
//! Glue between a local JPEG producer (an encoder, a capture pipeline) and
//! an [`MjpegServer`]. A pump task polls the producer and publishes new
//! frames into the server's buffer.
//!
//! ```text
//!   FrameProducer ──poll──► pump task ──publish──► FrameBuffer ──► MjpegServer
//! ```

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::buffer::FrameBuffer;
use crate::error::{Error, Result, ServerError};
use crate::server::connection::shutdown_signalled;
use crate::server::{MjpegServer, ServerConfig};
use crate::stats::ServerStats;

/// Source of locally produced JPEG frames
pub trait FrameProducer: Send + Sync + 'static {
    /// Most recent encoded frame, or `None` if there is nothing yet.
    ///
    /// Returning the same `Bytes` again means "unchanged"; it is not re-sent.
    fn latest_jpeg(&self) -> Option<Bytes>;
}

impl<F> FrameProducer for F
where
    F: Fn() -> Option<Bytes> + Send + Sync + 'static,
{
    fn latest_jpeg(&self) -> Option<Bytes> {
        self()
    }
}

/// Events from the frame streamer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamerEvent {
    /// Server listening and frames flowing
    StreamingStarted,
    /// Server stopped
    StreamingStopped,
}

/// Streamer configuration
#[derive(Debug, Clone)]
pub struct StreamerConfig {
    /// Frame server settings
    pub server: ServerConfig,

    /// How often the producer is polled
    pub poll_interval: Duration,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            poll_interval: Duration::from_millis(33), // ~30 fps
        }
    }
}

impl StreamerConfig {
    /// Set the server configuration
    pub fn server(mut self, server: ServerConfig) -> Self {
        self.server = server;
        self
    }

    /// Set the producer poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Serves frames from a [`FrameProducer`] over MJPEG
pub struct FrameStreamer {
    server: MjpegServer,
    buffer: FrameBuffer,
    producer: Arc<dyn FrameProducer>,
    poll_interval: Duration,
    pump: Option<Pump>,
    event_tx: mpsc::Sender<StreamerEvent>,
}

/// A running pump task
struct Pump {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl FrameStreamer {
    /// Create a new streamer.
    ///
    /// Returns the streamer and a receiver for events.
    pub fn new(
        config: StreamerConfig,
        producer: impl FrameProducer,
    ) -> (Self, mpsc::Receiver<StreamerEvent>) {
        let (event_tx, event_rx) = mpsc::channel(16);
        let buffer = FrameBuffer::new();

        let streamer = Self {
            server: MjpegServer::new(config.server, buffer.clone()),
            buffer,
            producer: Arc::new(producer),
            poll_interval: config.poll_interval,
            pump: None,
            event_tx,
        };

        (streamer, event_rx)
    }

    /// Start the server, then start streaming. Returns the bound port.
    pub async fn start_server(&mut self) -> Result<u16> {
        let port = self.server.start().await?;
        self.start_streaming();
        self.emit(StreamerEvent::StreamingStarted);
        Ok(port)
    }

    /// Start or resume polling the producer. No-op unless the server is listening.
    pub fn start_streaming(&mut self) {
        if self.pump.is_some() || !self.server.is_listening() {
            return;
        }

        let (stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(pump(
            Arc::clone(&self.producer),
            self.buffer.clone(),
            self.poll_interval,
            stop_rx,
        ));
        self.pump = Some(Pump { stop, task });
        tracing::debug!("Streaming started");
    }

    /// Stop polling the producer. Connected clients see the buffer cleared.
    pub async fn pause_streaming(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.stop.send_replace(true);
            if let Err(e) = pump.task.await {
                tracing::error!(error = %e, "Pump task failed");
            }
            tracing::debug!("Streaming paused");
        }
    }

    /// Stop streaming and the server
    pub async fn stop_server(&mut self) -> Result<()> {
        self.pause_streaming().await;
        self.buffer.clear();

        match self.server.stop().await {
            Ok(()) | Err(Error::Server(ServerError::NotListening)) => {}
            Err(e) => return Err(e),
        }

        self.emit(StreamerEvent::StreamingStopped);
        Ok(())
    }

    pub fn is_streaming(&self) -> bool {
        self.pump.is_some()
    }

    pub fn is_listening(&self) -> bool {
        self.server.is_listening()
    }

    /// Bound port while listening, configured port otherwise
    pub fn port(&self) -> u16 {
        self.server.port()
    }

    /// Buffer the server reads from
    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    /// Underlying server, for port and mode changes while stopped
    pub fn server_mut(&mut self) -> &mut MjpegServer {
        &mut self.server
    }

    pub fn server_stats(&self) -> ServerStats {
        self.server.stats()
    }

    fn emit(&self, event: StreamerEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            tracing::trace!(error = %e, "Event dropped");
        }
    }
}

impl Drop for FrameStreamer {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.task.abort();
        }
    }
}

/// Poll the producer until told to stop, then clear the buffer
async fn pump(
    producer: Arc<dyn FrameProducer>,
    buffer: FrameBuffer,
    poll_interval: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last: Option<Bytes> = None;

    loop {
        tokio::select! {
            _ = shutdown_signalled(&mut stop) => break,
            _ = ticker.tick() => {}
        }

        let Some(jpeg) = producer.latest_jpeg() else {
            continue;
        };
        if last.as_ref().map_or(false, |prev| same_allocation(prev, &jpeg)) {
            continue;
        }
        buffer.publish(jpeg.clone());
        last = Some(jpeg);
    }

    buffer.clear();
    tracing::debug!("End of video streaming");
}

/// Whether two handles view the same bytes of the same allocation
fn same_allocation(a: &Bytes, b: &Bytes) -> bool {
    a.as_ptr() == b.as_ptr() && a.len() == b.len()
}
