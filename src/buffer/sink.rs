//! Frame sinks
//!
//! The reader hands each parsed frame to a [`FrameSink`]. Sinks must return
//! quickly: they run on the reader's task, between socket reads.

use bytes::Bytes;
use tokio::sync::mpsc;

use super::store::FrameBuffer;

/// Consumer of parsed frames
pub trait FrameSink: Send + Sync + 'static {
    /// Take ownership of one complete frame
    fn deliver(&self, frame: Bytes);
}

/// Pass-through: the reader feeds a frame server directly
impl FrameSink for FrameBuffer {
    fn deliver(&self, frame: Bytes) {
        self.publish(frame);
    }
}

/// Queue hand-off. A full queue drops the frame rather than stalling the reader.
impl FrameSink for mpsc::Sender<Bytes> {
    fn deliver(&self, frame: Bytes) {
        if let Err(e) = self.try_send(frame) {
            tracing::trace!(error = %e, "Frame sink queue unavailable, frame dropped");
        }
    }
}

impl FrameSink for mpsc::UnboundedSender<Bytes> {
    fn deliver(&self, frame: Bytes) {
        let _ = self.send(frame);
    }
}

/// Closure adapter, see [`sink_fn`]
pub struct FnSink<F>(F);

impl<F> FrameSink for FnSink<F>
where
    F: Fn(Bytes) + Send + Sync + 'static,
{
    fn deliver(&self, frame: Bytes) {
        (self.0)(frame)
    }
}

/// Wrap a closure as a [`FrameSink`]
pub fn sink_fn<F>(f: F) -> FnSink<F>
where
    F: Fn(Bytes) + Send + Sync + 'static,
{
    FnSink(f)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_buffer_sink() {
        let buffer = FrameBuffer::new();
        buffer.deliver(Bytes::from_static(b"jpeg"));
        assert_eq!(buffer.latest().unwrap().data().as_ref(), b"jpeg");
    }

    #[test]
    fn test_full_queue_drops() {
        let (tx, mut rx) = mpsc::channel::<Bytes>(1);
        tx.deliver(Bytes::from_static(b"a"));
        tx.deliver(Bytes::from_static(b"b"));

        assert_eq!(rx.try_recv().unwrap().as_ref(), b"a");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_fn_sink() {
        let total = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&total);
        let sink = sink_fn(move |frame: Bytes| {
            counter.fetch_add(frame.len(), Ordering::Relaxed);
        });

        sink.deliver(Bytes::from_static(b"12345"));
        assert_eq!(total.load(Ordering::Relaxed), 5);
    }
}
