//! Statistics and metrics for readers and frame servers
//!
//! Counters are atomics updated from the hot path; callers read plain
//! snapshot structs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Reader statistics snapshot
#[derive(Debug, Clone, Default)]
pub struct ReaderStats {
    /// Frames handed to the sink
    pub frames_delivered: u64,
    /// Payload bytes handed to the sink
    pub bytes_delivered: u64,
    /// Frames parsed and dropped while paused
    pub frames_discarded: u64,
    /// Connection attempts (first connect included)
    pub connection_attempts: u64,
    /// Connections that failed or were lost
    pub connection_failures: u64,
    /// Largest frame seen
    pub largest_frame: u64,
}

impl ReaderStats {
    /// Average frame size in bytes
    pub fn average_frame_size(&self) -> u64 {
        if self.frames_delivered > 0 {
            self.bytes_delivered / self.frames_delivered
        } else {
            0
        }
    }
}

/// Live reader counters
#[derive(Debug, Default)]
pub struct ReaderCounters {
    frames_delivered: AtomicU64,
    bytes_delivered: AtomicU64,
    frames_discarded: AtomicU64,
    connection_attempts: AtomicU64,
    connection_failures: AtomicU64,
    largest_frame: AtomicU64,
}

impl ReaderCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_frame(&self, size: usize) {
        self.frames_delivered.fetch_add(1, Ordering::Relaxed);
        self.bytes_delivered.fetch_add(size as u64, Ordering::Relaxed);
        self.largest_frame.fetch_max(size as u64, Ordering::Relaxed);
    }

    pub fn on_discard(&self) {
        self.frames_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_connect_attempt(&self) {
        self.connection_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_failure(&self) {
        self.connection_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ReaderStats {
        ReaderStats {
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            bytes_delivered: self.bytes_delivered.load(Ordering::Relaxed),
            frames_discarded: self.frames_discarded.load(Ordering::Relaxed),
            connection_attempts: self.connection_attempts.load(Ordering::Relaxed),
            connection_failures: self.connection_failures.load(Ordering::Relaxed),
            largest_frame: self.largest_frame.load(Ordering::Relaxed),
        }
    }
}

/// Server-wide statistics snapshot
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    /// Total connections ever accepted
    pub total_connections: u64,
    /// Connections currently being served
    pub active_connections: u64,
    /// Connections refused by the connection limit
    pub rejected_connections: u64,
    /// Images written (multipart parts and single images)
    pub frames_sent: u64,
    /// Image payload bytes written
    pub frame_bytes_sent: u64,
    /// Total bytes written: image payloads plus response heads and part framing
    pub bytes_sent: u64,
    /// Time since the server started listening
    pub uptime: Duration,
}

/// Live server counters
#[derive(Debug)]
pub struct ServerCounters {
    total_connections: AtomicU64,
    active_connections: AtomicU64,
    rejected_connections: AtomicU64,
    frames_sent: AtomicU64,
    frame_bytes_sent: AtomicU64,
    bytes_sent: AtomicU64,
    started_at: Instant,
}

impl ServerCounters {
    pub fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            rejected_connections: AtomicU64::new(0),
            frames_sent: AtomicU64::new(0),
            frame_bytes_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn on_accept(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_close(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn on_reject(&self) {
        self.rejected_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// One image written; `payload` excludes heads and part framing
    pub fn on_frame_sent(&self, payload: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.frame_bytes_sent.fetch_add(payload as u64, Ordering::Relaxed);
        self.bytes_sent.fetch_add(payload as u64, Ordering::Relaxed);
    }

    pub fn on_bytes_sent(&self, bytes: usize) {
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ServerStats {
        ServerStats {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            rejected_connections: self.rejected_connections.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frame_bytes_sent: self.frame_bytes_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

impl Default for ServerCounters {
    fn default() -> Self {
        Self::new()
    }
}
