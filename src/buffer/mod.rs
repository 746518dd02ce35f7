//! Frame buffer shared between a producer and the frame server
//!
//! ```text
//!   producer (reader / encoder)
//!         │ publish()
//!         ▼
//!   ┌──────────────────────────┐
//!   │ FrameBuffer              │
//!   │   watch::Sender<Option<  │
//!   │     Frame { id, Bytes }>>│
//!   └────────────┬─────────────┘
//!        ┌───────┼────────┐
//!        ▼       ▼        ▼
//!   [watcher] [watcher] [watcher]   one per server connection
//! ```
//!
//! Frames are `bytes::Bytes`, so every watcher shares one allocation.
//! Watchers always see a whole frame and skip frames they were too slow for.

pub mod frame;
pub mod sink;
pub mod store;

pub use frame::Frame;
pub use sink::{sink_fn, FnSink, FrameSink};
pub use store::{FrameBuffer, FrameWatcher};
