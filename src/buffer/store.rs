//! Latest-frame buffer
//!
//! A single-slot cell holding the most recent frame. One producer replaces
//! it, any number of [`FrameWatcher`]s observe it. Built on
//! `tokio::sync::watch`: a publish is an atomic swap under the channel's
//! lock, and watchers are woken by notification instead of polling.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::watch;

use super::frame::Frame;

struct Shared {
    tx: watch::Sender<Option<Frame>>,
    next_id: AtomicU64,
}

/// Shared handle to the latest frame
///
/// Clones refer to the same buffer.
#[derive(Clone)]
pub struct FrameBuffer {
    shared: Arc<Shared>,
}

impl FrameBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                tx,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Replace the current frame.
    ///
    /// Returns the new frame's id, or `None` if `data` was empty (an empty
    /// payload clears the buffer).
    pub fn publish(&self, data: impl Into<Bytes>) -> Option<u64> {
        let data = data.into();
        if data.is_empty() {
            self.clear();
            return None;
        }

        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(frame_id = id, size = data.len(), "Frame published");
        self.shared.tx.send_replace(Some(Frame::new(id, data)));
        Some(id)
    }

    /// Empty the buffer. Streaming responses end when they observe this.
    pub fn clear(&self) {
        let previous = self.shared.tx.send_replace(None);
        if previous.is_some() {
            tracing::debug!("Frame buffer cleared");
        }
    }

    /// Current frame, if any
    pub fn latest(&self) -> Option<Frame> {
        self.shared.tx.borrow().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.tx.borrow().is_none()
    }

    /// Read-only view for a consumer
    pub fn watch(&self) -> FrameWatcher {
        FrameWatcher {
            rx: self.shared.tx.subscribe(),
        }
    }

    /// Number of live watchers
    pub fn watcher_count(&self) -> usize {
        self.shared.tx.receiver_count()
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("latest", &self.latest().map(|fr| (fr.id(), fr.len())))
            .field("watchers", &self.watcher_count())
            .finish()
    }
}

/// Read-only subscription to a [`FrameBuffer`]
///
/// Only ever sees the newest frame: frames replaced before the watcher
/// looked are skipped.
pub struct FrameWatcher {
    rx: watch::Receiver<Option<Frame>>,
}

impl FrameWatcher {
    /// Current frame, if any
    pub fn latest(&self) -> Option<Frame> {
        self.rx.borrow().clone()
    }

    /// Wait until the buffer holds a frame and return it.
    pub async fn wait_for_frame(&mut self) -> Frame {
        loop {
            if let Some(frame) = self.rx.borrow_and_update().clone() {
                return frame;
            }
            if self.rx.changed().await.is_err() {
                // Buffer dropped; nothing will ever arrive.
                std::future::pending::<()>().await;
            }
        }
    }

    /// Wait for a frame different from `last`.
    ///
    /// Returns `None` once the buffer is empty (producer stopped).
    pub async fn next_frame(&mut self, last: &Frame) -> Option<Frame> {
        loop {
            match self.rx.borrow_and_update().as_ref() {
                None => return None,
                Some(current) if !current.same_as(last) => return Some(current.clone()),
                Some(_) => {}
            }
            if self.rx.changed().await.is_err() {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    #[test]
    fn test_publish_and_clear() {
        let buffer = FrameBuffer::new();
        assert!(buffer.is_empty());

        let id = buffer.publish(Bytes::from_static(b"abc")).unwrap();
        let latest = buffer.latest().unwrap();
        assert_eq!(latest.id(), id);
        assert_eq!(latest.data().as_ref(), b"abc");

        buffer.clear();
        assert!(buffer.latest().is_none());
    }

    #[test]
    fn test_empty_publish_clears() {
        let buffer = FrameBuffer::new();
        buffer.publish(vec![1u8, 2, 3]);

        assert_eq!(buffer.publish(Vec::<u8>::new()), None);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_identical_bytes_get_new_identity() {
        let buffer = FrameBuffer::new();
        let a = buffer.publish(Bytes::from_static(b"same")).unwrap();
        let b = buffer.publish(Bytes::from_static(b"same")).unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_wait_for_frame() {
        let buffer = FrameBuffer::new();
        let mut watcher = buffer.watch();

        let waiting = tokio::spawn(async move { watcher.wait_for_frame().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        buffer.publish(Bytes::from_static(b"first"));

        let frame = timeout(Duration::from_secs(1), waiting).await.unwrap().unwrap();
        assert_eq!(frame.data().as_ref(), b"first");
    }

    #[test]
    fn test_watcher_woken_by_publish() {
        let buffer = FrameBuffer::new();
        let mut watcher = buffer.watch();

        let mut waiting = tokio_test::task::spawn(watcher.wait_for_frame());
        tokio_test::assert_pending!(waiting.poll());

        buffer.publish(Bytes::from_static(b"woken"));
        assert!(waiting.is_woken());

        let frame = tokio_test::assert_ready!(waiting.poll());
        assert_eq!(frame.data().as_ref(), b"woken");
    }

    #[tokio::test]
    async fn test_latest_frame_wins() {
        let buffer = FrameBuffer::new();
        let mut watcher = buffer.watch();

        buffer.publish(Bytes::from_static(b"one"));
        let first = watcher.wait_for_frame().await;

        // Two frames arrive before the watcher looks again
        buffer.publish(Bytes::from_static(b"two"));
        buffer.publish(Bytes::from_static(b"three"));

        let next = watcher.next_frame(&first).await.unwrap();
        assert_eq!(next.data().as_ref(), b"three");
    }

    #[tokio::test]
    async fn test_next_frame_ends_on_clear() {
        let buffer = FrameBuffer::new();
        let mut watcher = buffer.watch();

        buffer.publish(Bytes::from_static(b"one"));
        let first = watcher.wait_for_frame().await;

        let producer = buffer.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            producer.clear();
        });

        let next = timeout(Duration::from_secs(1), watcher.next_frame(&first))
            .await
            .unwrap();
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn test_unchanged_frame_blocks() {
        let buffer = FrameBuffer::new();
        let mut watcher = buffer.watch();

        buffer.publish(Bytes::from_static(b"one"));
        let first = watcher.wait_for_frame().await;

        let result = timeout(Duration::from_millis(50), watcher.next_frame(&first)).await;
        assert!(result.is_err());
    }
}
