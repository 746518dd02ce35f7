//! MJPEG frame server
//!
//! Serves a [`FrameBuffer`](crate::buffer::FrameBuffer) over HTTP, either as
//! a continuous `multipart/x-mixed-replace` stream or as one still image per
//! request.

pub mod config;
pub mod connection;
pub mod listener;

pub use config::ServerConfig;
pub use listener::MjpegServer;
