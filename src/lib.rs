//! MJPEG over HTTP for Rust
//!
//! Two halves sharing one frame type:
//!
//! - [`client`]: a resilient reader for `multipart/x-mixed-replace` camera
//!   streams. Frames go to any [`FrameSink`]; lost streams are detected and
//!   reconnected.
//! - [`server`]: serves a [`FrameBuffer`] to any number of HTTP clients, as a
//!   continuous MJPEG stream or as one still image per request.
//!
//! [`streamer`] ties a local JPEG producer to a server. Because
//! [`FrameBuffer`] is itself a sink, a puller can feed a server directly:
//!
//! ```no_run
//! use mjpeg_rs::{ClientConfig, FrameBuffer, MjpegPuller, MjpegServer, ServerConfig};
//!
//! # async fn relay() -> mjpeg_rs::error::Result<()> {
//! let buffer = FrameBuffer::new();
//! let (mut puller, events) =
//!     MjpegPuller::new(ClientConfig::new("http://10.2.13.100:8080/video"), buffer.clone());
//! // Not interested in notifications
//! drop(events);
//! let mut server = MjpegServer::new(ServerConfig::with_port(8081), buffer);
//!
//! server.start().await?;
//! puller.start();
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod client;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;
pub mod stats;
pub mod streamer;

pub use buffer::{Frame, FrameBuffer, FrameSink, FrameWatcher};
pub use client::{ClientConfig, ClientEvent, Credentials, FailureKind, MjpegPuller};
pub use error::{Error, Result};
pub use server::{MjpegServer, ServerConfig};
pub use session::ReaderPhase;
pub use streamer::{FrameProducer, FrameStreamer, StreamerConfig, StreamerEvent};
