//! Multipart part reader
//!
//! Pulls one JPEG frame at a time out of an MJPEG response body:
//!
//! 1. Read a header block up to the blank line, byte by byte from the
//!    buffered view. Every underlying fill is bounded by the read timeout.
//! 2. Extract `Content-Length` / `Content-Type`.
//! 3. No length yet (or a zero length): keep waiting, but give up once the
//!    stall exceeds the give-up timeout.
//! 4. Grow the scratch buffer if needed (doubling, never shrinking).
//! 5. Read exactly `Content-Length` bytes, accumulating across short reads.
//!
//! No trailing CRLF is required after the body; whatever precedes the next
//! boundary line becomes part of the next header block.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tokio::time::timeout;

use super::config::ClientConfig;
use crate::error::{ProtocolError, Result};
use crate::protocol::constants::HEADER_TERMINATOR;
use crate::protocol::PartHeader;
use crate::session::StallTimer;

/// Result of asking for the next frame
#[derive(Debug)]
pub enum PartOutcome {
    /// One complete frame
    Frame(Bytes),
    /// No usable data for longer than the give-up timeout
    StreamExhausted(Duration),
    /// Remote closed the body cleanly between parts
    Closed,
}

/// Result of a single bounded read step
enum Step<T> {
    Ready(T),
    TimedOut,
    Eof,
}

/// Reads frames from a buffered MJPEG body
pub struct PartReader<R> {
    stream: R,
    read_timeout: Duration,
    give_up_timeout: Duration,
    max_header_size: usize,
    max_frame_size: usize,
    /// Header bytes read so far; kept across read timeouts
    header: BytesMut,
    /// Frame payload scratch space
    scratch: Vec<u8>,
    stall: StallTimer,
    first_part: bool,
}

impl<R> PartReader<R>
where
    R: AsyncBufRead + Unpin,
{
    /// Create a reader over a body stream positioned at the first part
    pub fn new(stream: R, config: &ClientConfig) -> Self {
        Self::with_buffer(stream, config, Vec::new())
    }

    /// Create a reader that reuses a scratch buffer from an earlier connection
    pub fn with_buffer(stream: R, config: &ClientConfig, mut scratch: Vec<u8>) -> Self {
        if scratch.len() < config.initial_buffer_size {
            scratch.resize(config.initial_buffer_size, 0);
        }

        Self {
            stream,
            read_timeout: config.read_timeout,
            give_up_timeout: config.give_up_timeout,
            max_header_size: config.max_header_size,
            max_frame_size: config.max_frame_size,
            header: BytesMut::with_capacity(256),
            scratch,
            stall: StallTimer::new(),
            first_part: true,
        }
    }

    /// Current scratch buffer size
    pub fn buffer_size(&self) -> usize {
        self.scratch.len()
    }

    /// Give back the scratch buffer, dropping the stream
    pub fn into_buffer(self) -> Vec<u8> {
        self.scratch
    }

    /// Read the next complete frame.
    ///
    /// Errors are fatal for the connection: I/O failures, a wrong content
    /// type or an oversize part.
    pub async fn next_frame(&mut self) -> Result<PartOutcome> {
        let length = loop {
            match self.read_header_block().await? {
                Step::Eof => return Ok(PartOutcome::Closed),
                Step::TimedOut => {}
                Step::Ready(block) => {
                    let header = PartHeader::parse(&block);
                    if self.first_part {
                        tracing::debug!(
                            header = %String::from_utf8_lossy(&block).trim(),
                            "First part header read"
                        );
                        self.first_part = false;
                    }
                    match header.frame_length()? {
                        // An empty part is not a frame; keep waiting.
                        Some(0) => tracing::debug!("Skipping empty part"),
                        Some(length) => {
                            self.stall.reset();
                            break length;
                        }
                        None => {}
                    }
                }
            }

            let stalled = self.stall.stalled();
            if stalled >= self.give_up_timeout {
                self.stall.reset();
                return Ok(PartOutcome::StreamExhausted(stalled));
            }
            tracing::trace!(stalled_ms = stalled.as_millis() as u64, "Waiting for frames");
            tokio::task::yield_now().await;
        };

        if length > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                declared: length,
                limit: self.max_frame_size,
            }
            .into());
        }
        self.ensure_capacity(length);

        let mut filled = 0;
        while filled < length {
            match self.read_body_chunk(filled, length).await? {
                Step::Ready(n) => {
                    filled += n;
                    self.stall.reset();
                }
                Step::TimedOut => {
                    let stalled = self.stall.stalled();
                    if stalled >= self.give_up_timeout {
                        self.stall.reset();
                        return Ok(PartOutcome::StreamExhausted(stalled));
                    }
                    tracing::trace!(remaining = length - filled, "Read timeout inside frame");
                }
                Step::Eof => {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!("connection closed after {} of {} frame bytes", filled, length),
                    )
                    .into());
                }
            }
        }

        Ok(PartOutcome::Frame(Bytes::copy_from_slice(
            &self.scratch[..length],
        )))
    }

    /// Grow the scratch buffer to hold `needed` bytes, doubling from its
    /// current size. Never shrinks.
    fn ensure_capacity(&mut self, needed: usize) {
        let current = self.scratch.len();
        if current >= needed {
            return;
        }

        let mut size = current.max(1);
        while size < needed {
            size = size.saturating_mul(2);
        }
        tracing::debug!(from = current, to = size, needed, "Growing frame buffer");
        self.scratch = vec![0; size];
    }

    /// Step 1: accumulate bytes until CRLF CRLF.
    async fn read_header_block(&mut self) -> Result<Step<BytesMut>> {
        loop {
            let available = match timeout(self.read_timeout, self.stream.fill_buf()).await {
                Err(_) => return Ok(Step::TimedOut),
                Ok(result) => result?,
            };
            if available.is_empty() {
                return Ok(Step::Eof);
            }

            let mut consumed = 0;
            let mut complete = false;
            for &b in available {
                self.header.extend_from_slice(&[b]);
                consumed += 1;
                if self.header.ends_with(HEADER_TERMINATOR) {
                    complete = true;
                    break;
                }
            }
            self.stream.consume(consumed);

            if complete {
                return Ok(Step::Ready(self.header.split()));
            }
            if self.header.len() > self.max_header_size {
                return Err(ProtocolError::HeaderTooLarge(self.max_header_size).into());
            }
        }
    }

    /// Step 5: one bounded read into the scratch buffer.
    async fn read_body_chunk(&mut self, filled: usize, length: usize) -> Result<Step<usize>> {
        let target = &mut self.scratch[filled..length];
        match timeout(self.read_timeout, self.stream.read(target)).await {
            Err(_) => Ok(Step::TimedOut),
            Ok(Ok(0)) => Ok(Step::Eof),
            Ok(Ok(n)) => Ok(Step::Ready(n)),
            Ok(Err(e)) => Err(e.into()),
        }
    }
}
