//! Frame type shared between producers and server connections

use std::time::Instant;

use bytes::Bytes;

/// One complete JPEG-encoded image
///
/// Cheap to clone: the payload is reference counted. Identity is carried by
/// `id`, which the [`FrameBuffer`](super::FrameBuffer) assigns on publish, so
/// two byte-identical frames published separately are still different frames.
#[derive(Debug, Clone)]
pub struct Frame {
    id: u64,
    data: Bytes,
    published_at: Instant,
}

impl Frame {
    pub(super) fn new(id: u64, data: Bytes) -> Self {
        Self {
            id,
            data,
            published_at: Instant::now(),
        }
    }

    /// Buffer-assigned identity
    pub fn id(&self) -> u64 {
        self.id
    }

    /// JPEG bytes
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// When the frame entered the buffer
    pub fn published_at(&self) -> Instant {
        self.published_at
    }

    /// Identity comparison (never compares bytes)
    pub fn same_as(&self, other: &Frame) -> bool {
        self.id == other.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_not_content() {
        let a = Frame::new(1, Bytes::from_static(b"jpeg"));
        let b = Frame::new(2, Bytes::from_static(b"jpeg"));

        assert!(!a.same_as(&b));
        assert!(a.same_as(&a.clone()));
        assert_eq!(a.len(), 4);
    }
}
