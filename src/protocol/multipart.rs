//! Multipart part headers
//!
//! An MJPEG body is a sequence of parts:
//!
//! ```text
//! --boundary\r\n
//! Content-Type: image/jpeg\r\n
//! Content-Length: 5000\r\n
//! \r\n
//! <5000 bytes of JPEG>
//! [\r\n]                      <- optional, never required
//! ```
//!
//! The reader needs `Content-Length` and `Content-Type`; the boundary line
//! is skipped along with any other header it does not know about.

use bytes::{BufMut, Bytes, BytesMut};

use super::constants::{BOUNDARY, JPEG_CONTENT_TYPE};
use crate::error::ProtocolError;

/// Headers extracted from one part header block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartHeader {
    /// Declared payload length, if present and numeric
    pub content_length: Option<usize>,
    /// Declared content type, if present
    pub content_type: Option<String>,
}

impl PartHeader {
    /// Parse a header block (everything up to and including the blank line)
    pub fn parse(block: &[u8]) -> Self {
        Self {
            content_length: header_value(block, "Content-Length")
                .and_then(|v| v.parse::<usize>().ok()),
            content_type: header_value(block, "Content-Type"),
        }
    }

    /// Check the content type and return the payload length to read.
    ///
    /// `Ok(None)` means no usable length was found and the caller should
    /// wait for the next header block. A content type other than
    /// `image/jpeg` is fatal for the connection, and so is a length that
    /// comes without any content type.
    pub fn frame_length(&self) -> Result<Option<usize>, ProtocolError> {
        match (&self.content_type, self.content_length) {
            (Some(ct), _) if !is_jpeg(ct) => {
                Err(ProtocolError::UnsupportedContentType(ct.clone()))
            }
            (None, Some(_)) => Err(ProtocolError::MissingContentType),
            (_, length) => Ok(length),
        }
    }
}

/// Find a header value by case-insensitive key. The value runs to the end of
/// its line and is trimmed.
pub fn header_value(block: &[u8], key: &str) -> Option<String> {
    let text = String::from_utf8_lossy(block);

    text.split('\n').find_map(|line| {
        let line = line.trim_end_matches('\r');
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case(key) {
            Some(value.trim().to_string())
        } else {
            None
        }
    })
}

/// Media type comparison ignoring case and parameters
fn is_jpeg(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|media| media.trim().eq_ignore_ascii_case(JPEG_CONTENT_TYPE))
        .unwrap_or(false)
}

/// `Content-Type` header value for a continuous stream
pub fn stream_content_type() -> String {
    format!("multipart/x-mixed-replace; boundary={}", BOUNDARY)
}

/// Encode one multipart part: boundary line, headers, payload and trailing CRLF
pub fn encode_part(payload: &[u8]) -> Bytes {
    let head = format!(
        "--{}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n",
        BOUNDARY,
        JPEG_CONTENT_TYPE,
        payload.len()
    );

    let mut buf = BytesMut::with_capacity(head.len() + payload.len() + 2);
    buf.put_slice(head.as_bytes());
    buf.put_slice(payload);
    buf.put_slice(b"\r\n");
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_typical_part() {
        let block = b"--myboundary\r\nContent-Type: image/jpeg\r\nContent-Length: 5000\r\n\r\n";
        let header = PartHeader::parse(block);

        assert_eq!(header.content_length, Some(5000));
        assert_eq!(header.content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(header.frame_length(), Ok(Some(5000)));
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let block = b"\r\n--b\r\ncontent-type:IMAGE/JPEG\r\nCONTENT-LENGTH:   42  \r\n\r\n";
        let header = PartHeader::parse(block);

        assert_eq!(header.frame_length(), Ok(Some(42)));
    }

    #[test]
    fn test_missing_length_is_not_fatal() {
        let header = PartHeader::parse(b"--b\r\nContent-Type: image/jpeg\r\n\r\n");
        assert_eq!(header.frame_length(), Ok(None));

        let header = PartHeader::parse(b"--b\r\nContent-Type: image/jpeg\r\nContent-Length: abc\r\n\r\n");
        assert_eq!(header.frame_length(), Ok(None));

        let header = PartHeader::parse(b"--b\r\nX-Info: nothing\r\n\r\n");
        assert_eq!(header.frame_length(), Ok(None));

        let header = PartHeader::parse(b"\r\n\r\n");
        assert_eq!(header.frame_length(), Ok(None));
    }

    #[test]
    fn test_negative_length_is_not_a_length() {
        let header = PartHeader::parse(b"Content-Length: -5\r\n\r\n");
        assert_eq!(header.content_length, None);
    }

    #[test]
    fn test_wrong_content_type_is_fatal() {
        let header =
            PartHeader::parse(b"--b\r\nContent-Type: text/html\r\nContent-Length: 10\r\n\r\n");

        assert_eq!(
            header.frame_length(),
            Err(ProtocolError::UnsupportedContentType("text/html".into()))
        );
    }

    #[test]
    fn test_length_without_content_type_is_fatal() {
        let header = PartHeader::parse(b"--b\r\nContent-Length: 3\r\n\r\n");
        assert_eq!(header.frame_length(), Err(ProtocolError::MissingContentType));
    }

    #[test]
    fn test_content_type_parameters_ignored() {
        let header = PartHeader::parse(b"Content-Type: image/jpeg; q=1\r\nContent-Length: 3\r\n\r\n");
        assert_eq!(header.frame_length(), Ok(Some(3)));
    }

    #[test]
    fn test_prefixed_key_does_not_match() {
        let block = b"X-Content-Length: 99\r\nContent-Length: 7\r\n\r\n";
        assert_eq!(header_value(block, "Content-Length").as_deref(), Some("7"));
    }

    #[test]
    fn test_encode_part() {
        let part = encode_part(&[0xFF, 0xD8, 0xFF, 0xD9]);
        let expected_head = format!(
            "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: 4\r\n\r\n",
            BOUNDARY
        );

        assert!(part.starts_with(expected_head.as_bytes()));
        assert!(part.ends_with(&[0xFF, 0xD8, 0xFF, 0xD9, b'\r', b'\n']));

        // What we encode, we can parse back
        let header = PartHeader::parse(expected_head.as_bytes());
        assert_eq!(header.frame_length(), Ok(Some(4)));
    }
}
