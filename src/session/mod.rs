//! Reader session state
//!
//! Lifecycle phases and the stall (give-up) timer used by the reader loop.

pub mod state;

pub use state::{ReaderPhase, StallTimer};
