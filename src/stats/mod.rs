//! Statistics for readers and frame servers

pub mod metrics;

pub use metrics::{ReaderCounters, ReaderStats, ServerCounters, ServerStats};
