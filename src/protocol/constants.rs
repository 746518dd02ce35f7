//! MJPEG / HTTP protocol constants

/// Boundary token used by the frame server for multipart responses
pub const BOUNDARY: &str = "mjpegrs-boundary-7c1f3e";

/// The only part content type the reader accepts
pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Terminator of a header block (blank line after the last header)
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Initial reader scratch buffer size (104 KiB)
pub const DEFAULT_SCRATCH_SIZE: usize = 104 * 1024;

/// Maximum size of a part header block before the stream is considered garbage
pub const DEFAULT_MAX_HEADER_SIZE: usize = 16 * 1024;

/// Largest frame the reader accepts (32 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 32 * 1024 * 1024;

/// Maximum size of an HTTP request or response head
pub const MAX_HTTP_HEAD_SIZE: usize = 16 * 1024;

/// Default HTTP port when the URL omits one
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// User agent sent by the reader
pub const DEFAULT_USER_AGENT: &str = concat!("mjpeg-rs/", env!("CARGO_PKG_VERSION"));
