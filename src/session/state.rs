//! Reader state machine
//!
//! Tracks the lifecycle of a stream reader from start to stop.
//!
//! ```text
//!   Idle ──start──► Connecting ──ok──► Streaming ◄──► Paused
//!    ▲                  │                  │
//!    │     failed (first attempt)          │ timeout / I/O error / bad part
//!    └──────────────────┘                  ▼
//!    ▲                             ConnectionLost ──restart──► ReconnectWait ──► Connecting
//!    └────────────── no restart ───────────┘
//!
//!   any state ──stop/terminate──► Closed
//! ```

use std::time::Instant;

/// Reader lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReaderPhase {
    /// Not running; initial state
    Idle,
    /// Opening the HTTP connection
    Connecting,
    /// Parse loop running, frames delivered
    Streaming,
    /// Connection open, frames discarded
    Paused,
    /// Current connection is unusable
    ConnectionLost,
    /// Waiting out the reconnect delay
    ReconnectWait,
    /// Explicitly stopped
    Closed,
}

impl ReaderPhase {
    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(self, next: ReaderPhase) -> bool {
        use ReaderPhase::*;

        match (self, next) {
            (_, Closed) => true,
            (Idle | Closed, Connecting) => true,
            (Connecting, Streaming | Paused | ConnectionLost | Idle) => true,
            (Streaming, Paused | ConnectionLost | Idle) => true,
            (Paused, Streaming | ConnectionLost | Idle) => true,
            (ConnectionLost, ReconnectWait | Idle) => true,
            (ReconnectWait, Connecting) => true,
            _ => false,
        }
    }

    /// Whether a reader task is alive in this phase
    pub fn is_active(self) -> bool {
        !matches!(self, ReaderPhase::Idle | ReaderPhase::Closed)
    }

    /// Whether the connection is up
    pub fn is_connected(self) -> bool {
        matches!(self, ReaderPhase::Streaming | ReaderPhase::Paused)
    }
}

impl std::fmt::Display for ReaderPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReaderPhase::Idle => "idle",
            ReaderPhase::Connecting => "connecting",
            ReaderPhase::Streaming => "streaming",
            ReaderPhase::Paused => "paused",
            ReaderPhase::ConnectionLost => "connection-lost",
            ReaderPhase::ReconnectWait => "reconnect-wait",
            ReaderPhase::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Give-up tracker for stalled streams
///
/// Started on the first read that makes no progress, reset on the first
/// one that does. Expired once the stall has lasted longer than the limit.
#[derive(Debug, Clone, Copy, Default)]
pub struct StallTimer {
    since: Option<Instant>,
}

impl StallTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a read that made no progress. Returns how long the stall has lasted.
    pub fn stalled(&mut self) -> std::time::Duration {
        let since = *self.since.get_or_insert_with(Instant::now);
        since.elapsed()
    }

    /// Record progress
    pub fn reset(&mut self) {
        self.since = None;
    }

    pub fn is_running(&self) -> bool {
        self.since.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_happy_path_transitions() {
        use ReaderPhase::*;

        assert!(Idle.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Streaming));
        assert!(Streaming.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Streaming));
        assert!(Streaming.can_transition_to(Closed));
    }

    #[test]
    fn test_reconnect_cycle() {
        use ReaderPhase::*;

        assert!(Streaming.can_transition_to(ConnectionLost));
        assert!(ConnectionLost.can_transition_to(ReconnectWait));
        assert!(ReconnectWait.can_transition_to(Connecting));
        assert!(ConnectionLost.can_transition_to(Idle));
    }

    #[test]
    fn test_illegal_transitions() {
        use ReaderPhase::*;

        assert!(!Idle.can_transition_to(Streaming));
        assert!(!Connecting.can_transition_to(ReconnectWait));
        assert!(!ConnectionLost.can_transition_to(Streaming));
        assert!(!ReconnectWait.can_transition_to(Streaming));
    }

    #[test]
    fn test_closed_reachable_from_anywhere() {
        use ReaderPhase::*;

        for phase in [Idle, Connecting, Streaming, Paused, ConnectionLost, ReconnectWait, Closed] {
            assert!(phase.can_transition_to(Closed), "{} -> closed", phase);
        }
        assert!(Closed.can_transition_to(Connecting));
    }

    #[test]
    fn test_activity_flags() {
        assert!(!ReaderPhase::Idle.is_active());
        assert!(!ReaderPhase::Closed.is_active());
        assert!(ReaderPhase::ReconnectWait.is_active());
        assert!(ReaderPhase::Paused.is_connected());
        assert!(!ReaderPhase::Connecting.is_connected());
    }

    #[test]
    fn test_stall_timer() {
        let mut timer = StallTimer::new();
        assert!(!timer.is_running());

        timer.stalled();
        std::thread::sleep(Duration::from_millis(15));
        assert!(timer.stalled() >= Duration::from_millis(15));

        timer.reset();
        assert!(!timer.is_running());
        assert!(timer.stalled() < Duration::from_millis(15));
    }
}
