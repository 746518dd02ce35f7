//! MJPEG stream puller
//!
//! High-level reader API. A puller owns one background task that connects to
//! the camera, parses frames into a [`FrameSink`] and recovers from lost
//! connections according to [`ClientConfig::restart_on_error`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::AsyncBufRead;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::config::{ClientConfig, Credentials};
use super::connector::MjpegConnector;
use super::reader::{PartOutcome, PartReader};
use crate::buffer::FrameSink;
use crate::error::{Error, HttpError};
use crate::session::ReaderPhase;
use crate::stats::{ReaderCounters, ReaderStats};

/// Events from the MJPEG puller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A frame was delivered; doubles as a liveness signal.
    ///
    /// Skipped while the consumer is behind, so the remaining queue space
    /// stays free for the other events.
    ConnectionSucceeded,

    /// Connecting failed or the stream was lost
    ConnectionFailed(FailureKind),

    /// The camera ended the response cleanly
    ConnectionClosed,

    /// A new connection attempt after the reconnect delay
    Reconnecting { attempt: u64 },
}

/// Why a connection failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Bad URL or unusable credentials; never retried
    InvalidConfig,
    /// Credentials rejected (401/403)
    Unauthorized,
    /// TCP or HTTP level failure while connecting
    Transport,
    /// No frame for longer than the give-up timeout
    StreamExhausted,
    /// Camera is not sending JPEG parts
    Protocol,
    /// Socket failure mid-stream
    Io,
}

impl FailureKind {
    /// Classify an error returned while opening the stream
    pub fn from_connect_error(err: &Error) -> Self {
        match err {
            Error::Url(_) | Error::Auth(_) => FailureKind::InvalidConfig,
            Error::Http(HttpError::Unauthorized(_)) => FailureKind::Unauthorized,
            Error::Protocol(_) => FailureKind::Protocol,
            Error::Http(_) | Error::Io(_) | Error::Timeout | Error::Server(_) => {
                FailureKind::Transport
            }
        }
    }

    /// Classify an error returned while reading parts
    pub fn from_stream_error(err: &Error) -> Self {
        match err {
            Error::Protocol(_) => FailureKind::Protocol,
            _ => FailureKind::Io,
        }
    }

    /// Whether a reconnect could possibly fix this
    pub fn is_retryable(self) -> bool {
        self != FailureKind::InvalidConfig
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureKind::InvalidConfig => "invalid configuration",
            FailureKind::Unauthorized => "unauthorized",
            FailureKind::Transport => "transport failure",
            FailureKind::StreamExhausted => "no data",
            FailureKind::Protocol => "protocol violation",
            FailureKind::Io => "I/O failure",
        };
        f.write_str(name)
    }
}

/// MJPEG stream puller
///
/// Pulls a live MJPEG stream from an HTTP camera and hands every frame to a
/// sink.
///
/// # Example
/// ```no_run
/// use mjpeg_rs::buffer::FrameBuffer;
/// use mjpeg_rs::client::{ClientConfig, MjpegPuller};
///
/// # async fn example() {
/// let buffer = FrameBuffer::new();
/// let config = ClientConfig::new("http://10.2.13.100:8080/video");
/// let (mut puller, mut events) = MjpegPuller::new(config, buffer.clone());
///
/// tokio::spawn(async move {
///     while let Some(event) = events.recv().await {
///         println!("Event: {:?}", event);
///     }
/// });
///
/// puller.start();
/// # }
/// ```
pub struct MjpegPuller {
    config: ClientConfig,
    sink: Arc<dyn FrameSink>,
    event_tx: mpsc::Sender<ClientEvent>,
    phase: Arc<watch::Sender<ReaderPhase>>,
    paused: watch::Sender<bool>,
    generation: Arc<AtomicU64>,
    counters: Arc<ReaderCounters>,
    task: Option<JoinHandle<()>>,
}

impl MjpegPuller {
    /// Create a new puller.
    ///
    /// Returns the puller and a receiver for events. Nothing happens until
    /// [`start`](Self::start) is called. Keep the receiver drained or drop
    /// it: connection state events wait for queue space.
    pub fn new(config: ClientConfig, sink: impl FrameSink) -> (Self, mpsc::Receiver<ClientEvent>) {
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity.max(1));
        let (phase, _) = watch::channel(ReaderPhase::Idle);
        let (paused, _) = watch::channel(false);

        let puller = Self {
            config,
            sink: Arc::new(sink),
            event_tx,
            phase: Arc::new(phase),
            paused,
            generation: Arc::new(AtomicU64::new(0)),
            counters: Arc::new(ReaderCounters::new()),
            task: None,
        };

        (puller, event_rx)
    }

    /// Start pulling. A running puller is stopped and restarted.
    pub fn start(&mut self) {
        if self.task.is_some() {
            self.abort_task();
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.paused.send_replace(false);
        self.phase.send_replace(ReaderPhase::Connecting);

        tracing::info!(url = %self.config.url, "Starting MJPEG puller");

        let task = ReaderTask {
            config: self.config.clone(),
            sink: Arc::clone(&self.sink),
            events: self.event_tx.clone(),
            phase: PhaseReporter {
                tx: Arc::clone(&self.phase),
                generation: Arc::clone(&self.generation),
                mine: generation,
                paused: self.paused.subscribe(),
            },
            counters: Arc::clone(&self.counters),
            liveness_reserve: self.config.event_capacity.max(1) / 4,
            scratch: Vec::new(),
        };
        self.task = Some(tokio::spawn(task.run()));
    }

    /// Keep the connection open but stop delivering frames
    pub fn pause(&self) {
        self.paused.send_replace(true);
        self.phase.send_if_modified(|phase| {
            if *phase == ReaderPhase::Streaming {
                *phase = ReaderPhase::Paused;
                true
            } else {
                false
            }
        });
        tracing::debug!("Puller paused");
    }

    /// Resume delivering frames on the open connection
    pub fn resume(&self) {
        self.paused.send_replace(false);
        self.phase.send_if_modified(|phase| {
            if *phase == ReaderPhase::Paused {
                *phase = ReaderPhase::Streaming;
                true
            } else {
                false
            }
        });
        tracing::debug!("Puller resumed");
    }

    /// Abort the connection immediately
    pub fn stop(&mut self) {
        if self.task.is_none() && !self.phase().is_active() {
            return;
        }
        self.abort_task();
        self.phase.send_replace(ReaderPhase::Closed);
        tracing::info!(url = %self.config.url, "MJPEG puller stopped");
    }

    /// Stop and release everything, including the event channel
    pub fn terminate(mut self) {
        self.stop();
    }

    /// Change the camera address and credentials. `None` removes any
    /// login set before.
    ///
    /// An active puller is stopped, reconfigured and started again.
    pub fn set_target(&mut self, url: impl Into<String>, credentials: Option<Credentials>) {
        let was_active = self.phase().is_active();
        if was_active {
            self.stop();
        }

        self.config.url = url.into();
        self.config.credentials = credentials;

        if was_active {
            self.start();
        }
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> ReaderPhase {
        *self.phase.borrow()
    }

    /// Subscribe to phase changes
    pub fn phase_watch(&self) -> watch::Receiver<ReaderPhase> {
        self.phase.subscribe()
    }

    /// Whether frames are currently being delivered
    pub fn is_streaming(&self) -> bool {
        self.phase() == ReaderPhase::Streaming
    }

    /// Current configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Statistics snapshot
    pub fn stats(&self) -> ReaderStats {
        self.counters.snapshot()
    }

    fn abort_task(&mut self) {
        // Invalidate the old task's phase reports before it dies.
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for MjpegPuller {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Phase updates from a reader task that may already be superseded
struct PhaseReporter {
    tx: Arc<watch::Sender<ReaderPhase>>,
    generation: Arc<AtomicU64>,
    mine: u64,
    paused: watch::Receiver<bool>,
}

impl PhaseReporter {
    fn set(&self, next: ReaderPhase) {
        self.tx.send_if_modified(|phase| {
            if self.generation.load(Ordering::SeqCst) != self.mine || *phase == next {
                return false;
            }
            if !phase.can_transition_to(next) {
                tracing::debug!(from = %phase, to = %next, "Ignoring phase change");
                return false;
            }
            *phase = next;
            true
        });
    }

    /// Streaming or Paused, depending on the pause flag at this moment
    fn set_connected(&self) {
        let next = if self.is_paused() {
            ReaderPhase::Paused
        } else {
            ReaderPhase::Streaming
        };
        self.set(next);
    }

    fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }
}

/// How a connected stream ended
enum StreamEnd {
    Closed,
    Failed(FailureKind),
}

/// State owned by the background task
struct ReaderTask {
    config: ClientConfig,
    sink: Arc<dyn FrameSink>,
    events: mpsc::Sender<ClientEvent>,
    phase: PhaseReporter,
    counters: Arc<ReaderCounters>,
    /// Queue slots liveness events leave free for state events
    liveness_reserve: usize,
    /// Frame scratch space, carried across reconnects
    scratch: Vec<u8>,
}

impl ReaderTask {
    async fn run(mut self) {
        let mut attempt: u64 = 0;

        loop {
            self.counters.on_connect_attempt();

            let connector = match MjpegConnector::connect(&self.config).await {
                Ok(connector) => connector,
                Err(e) => {
                    let kind = FailureKind::from_connect_error(&e);
                    tracing::warn!(url = %self.config.url, error = %e, kind = %kind, "Connection failed");
                    self.counters.on_failure();
                    self.emit(ClientEvent::ConnectionFailed(kind)).await;

                    // A first attempt that fails is left to the caller.
                    if attempt == 0 || !self.config.restart_on_error || !kind.is_retryable() {
                        self.phase.set(ReaderPhase::Idle);
                        return;
                    }
                    self.phase.set(ReaderPhase::ConnectionLost);
                    attempt = self.reconnect_wait(attempt).await;
                    continue;
                }
            };

            tracing::info!(url = %self.config.url, attempt, "Connected to MJPEG stream");
            self.phase.set_connected();

            let reader = PartReader::with_buffer(
                connector.into_reader(),
                &self.config,
                std::mem::take(&mut self.scratch),
            );
            match self.stream(reader).await {
                StreamEnd::Closed => {
                    tracing::info!(url = %self.config.url, "Stream closed by remote");
                    self.emit(ClientEvent::ConnectionClosed).await;
                }
                StreamEnd::Failed(kind) => {
                    self.counters.on_failure();
                    self.emit(ClientEvent::ConnectionFailed(kind)).await;
                }
            }
            self.phase.set(ReaderPhase::ConnectionLost);

            if !self.config.restart_on_error {
                self.phase.set(ReaderPhase::Idle);
                return;
            }
            attempt = self.reconnect_wait(attempt).await;
        }
    }

    /// Frame loop for one connection
    async fn stream<R>(&mut self, mut reader: PartReader<R>) -> StreamEnd
    where
        R: AsyncBufRead + Unpin,
    {
        let end = loop {
            match reader.next_frame().await {
                Ok(PartOutcome::Frame(frame)) => self.deliver(frame),
                Ok(PartOutcome::StreamExhausted(stalled)) => {
                    tracing::warn!(
                        url = %self.config.url,
                        stalled_ms = stalled.as_millis() as u64,
                        "No frames within give-up timeout"
                    );
                    break StreamEnd::Failed(FailureKind::StreamExhausted);
                }
                Ok(PartOutcome::Closed) => break StreamEnd::Closed,
                Err(e) => {
                    let kind = FailureKind::from_stream_error(&e);
                    tracing::warn!(url = %self.config.url, error = %e, kind = %kind, "Stream lost");
                    break StreamEnd::Failed(kind);
                }
            }
        };

        self.scratch = reader.into_buffer();
        end
    }

    fn deliver(&self, frame: Bytes) {
        if self.phase.is_paused() {
            self.counters.on_discard();
            return;
        }
        self.counters.on_frame(frame.len());
        self.sink.deliver(frame);
        self.emit_liveness();
    }

    /// ConnectionLost -> ReconnectWait -> Connecting
    async fn reconnect_wait(&self, attempt: u64) -> u64 {
        self.phase.set(ReaderPhase::ReconnectWait);
        tracing::debug!(delay_ms = self.config.reconnect_delay.as_millis() as u64, "Waiting to reconnect");
        tokio::time::sleep(self.config.reconnect_delay).await;

        let attempt = attempt + 1;
        self.emit(ClientEvent::Reconnecting { attempt }).await;
        self.phase.set(ReaderPhase::Connecting);
        attempt
    }

    /// Queue a state event, waiting for room if the consumer is behind
    async fn emit(&self, event: ClientEvent) {
        if self.events.send(event).await.is_err() {
            tracing::trace!("Event receiver dropped");
        }
    }

    /// Queue a liveness event unless that would eat into the reserve
    fn emit_liveness(&self) {
        if self.events.capacity() <= self.liveness_reserve {
            tracing::trace!("Consumer behind, liveness event skipped");
            return;
        }
        let _ = self.events.try_send(ClientEvent::ConnectionSucceeded);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::buffer::FrameBuffer;
    use crate::error::{AuthError, ProtocolError, UrlError};

    #[test]
    fn test_failure_classification() {
        assert_eq!(
            FailureKind::from_connect_error(&Error::Url(UrlError::MissingScheme)),
            FailureKind::InvalidConfig
        );
        assert_eq!(
            FailureKind::from_connect_error(&Error::Auth(AuthError::UnsupportedScheme("Digest".into()))),
            FailureKind::InvalidConfig
        );
        assert_eq!(
            FailureKind::from_connect_error(&Error::Http(HttpError::Unauthorized(403))),
            FailureKind::Unauthorized
        );
        assert_eq!(
            FailureKind::from_connect_error(&Error::Http(HttpError::Status(404))),
            FailureKind::Transport
        );
        assert_eq!(
            FailureKind::from_stream_error(&Error::Protocol(ProtocolError::UnsupportedContentType(
                "text/html".into()
            ))),
            FailureKind::Protocol
        );
        assert!(!FailureKind::InvalidConfig.is_retryable());
        assert!(FailureKind::StreamExhausted.is_retryable());
    }

    #[tokio::test]
    async fn test_invalid_url_reports_and_goes_idle() {
        let config = ClientConfig::new("ftp://camera/video");
        let (mut puller, mut events) = MjpegPuller::new(config, FrameBuffer::new());
        let mut phase = puller.phase_watch();

        puller.start();
        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap();
        assert_eq!(
            event,
            Some(ClientEvent::ConnectionFailed(FailureKind::InvalidConfig))
        );

        phase.wait_for(|p| *p == ReaderPhase::Idle).await.unwrap();
        assert_eq!(puller.stats().connection_failures, 1);
    }

    #[tokio::test]
    async fn test_stop_closes() {
        // Unroutable address keeps the puller in Connecting
        let config = ClientConfig::new("http://10.255.255.1/")
            .connect_timeout(Duration::from_secs(30));
        let (mut puller, _events) = MjpegPuller::new(config, FrameBuffer::new());

        puller.start();
        assert_eq!(puller.phase(), ReaderPhase::Connecting);

        puller.stop();
        assert_eq!(puller.phase(), ReaderPhase::Closed);
        assert!(!puller.is_streaming());

        // Stopping twice is harmless
        puller.stop();
        assert_eq!(puller.phase(), ReaderPhase::Closed);
    }

    #[tokio::test]
    async fn test_set_target_while_stopped() {
        let (mut puller, _events) = MjpegPuller::new(ClientConfig::new("http://a/"), FrameBuffer::new());

        puller.set_target("http://b:8080/video", Some(Credentials::new("admin", "pw")));
        assert_eq!(puller.config().url, "http://b:8080/video");
        assert_eq!(puller.config().credentials.as_ref().unwrap().login, "admin");
        assert_eq!(puller.phase(), ReaderPhase::Idle);
    }

    #[tokio::test]
    async fn test_set_target_clears_credentials() {
        let config = ClientConfig::new("http://10.255.255.1/")
            .credentials("admin", "pw")
            .connect_timeout(Duration::from_secs(30));
        let (mut puller, _events) = MjpegPuller::new(config, FrameBuffer::new());

        puller.start();
        puller.set_target("http://10.255.255.2/", None);

        assert!(puller.config().credentials.is_none());
        assert_eq!(puller.config().url, "http://10.255.255.2/");
        // Restarted with the new target
        assert_eq!(puller.phase(), ReaderPhase::Connecting);
        puller.stop();
    }

    #[tokio::test]
    async fn test_pause_before_connect_is_remembered() {
        let config = ClientConfig::new("http://10.255.255.1/")
            .connect_timeout(Duration::from_secs(30));
        let (mut puller, _events) = MjpegPuller::new(config, FrameBuffer::new());

        puller.start();
        puller.pause();
        // Not streaming yet, so the phase is untouched
        assert_eq!(puller.phase(), ReaderPhase::Connecting);
        assert!(*puller.paused.borrow());

        puller.resume();
        assert!(!*puller.paused.borrow());
        puller.stop();
    }
}
