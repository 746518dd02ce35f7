//! MJPEG client implementation
//!
//! Provides the stream reader for HTTP cameras:
//! - Opening `multipart/x-mixed-replace` responses, with optional credentials
//! - Parsing JPEG parts into frames
//! - Detecting stalled or lost streams and reconnecting

pub mod config;
pub mod connector;
pub mod puller;
pub mod reader;

pub use config::{AuthScheme, ClientConfig, Credentials, MjpegUrl};
pub use connector::MjpegConnector;
pub use puller::{ClientEvent, FailureKind, MjpegPuller};
pub use reader::{PartOutcome, PartReader};
