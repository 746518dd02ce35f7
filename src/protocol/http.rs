//! Minimal HTTP/1.x head handling
//!
//! The reader only needs to send one GET and check one status line, and the
//! server only needs to read one request line and write fixed response heads.
//! Bodies are handled by the multipart code.

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::constants::{HEADER_TERMINATOR, JPEG_CONTENT_TYPE};
use super::multipart::stream_content_type;
use crate::error::HttpError;

/// Read bytes up to and including the first blank line.
///
/// Bytes after the terminator stay buffered in `reader`.
pub async fn read_head<R>(reader: &mut R, max_size: usize) -> Result<BytesMut, crate::error::Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut head = BytesMut::with_capacity(512);

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Err(HttpError::IncompleteHead.into());
        }

        let mut consumed = 0;
        let mut complete = false;
        for &b in available {
            head.extend_from_slice(&[b]);
            consumed += 1;
            if head.ends_with(HEADER_TERMINATOR) {
                complete = true;
                break;
            }
        }
        reader.consume(consumed);

        if complete {
            return Ok(head);
        }
        if head.len() > max_size {
            return Err(HttpError::HeadTooLarge(max_size).into());
        }
    }
}

/// Parsed response status line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub version: String,
    pub code: u16,
    pub reason: String,
}

impl StatusLine {
    /// Parse the first line of a response head
    pub fn parse(head: &[u8]) -> Result<Self, HttpError> {
        let text = String::from_utf8_lossy(head);
        let line = text.lines().next().unwrap_or("").trim();

        let mut parts = line.splitn(3, ' ');
        let version = parts.next().unwrap_or("");
        let code = parts.next().unwrap_or("");

        if !version.starts_with("HTTP/") {
            return Err(HttpError::MalformedStatusLine(line.to_string()));
        }
        let code = code
            .parse::<u16>()
            .map_err(|_| HttpError::MalformedStatusLine(line.to_string()))?;

        Ok(Self {
            version: version.to_string(),
            code,
            reason: parts.next().unwrap_or("").to_string(),
        })
    }

    /// Map the status to the reader's notion of success
    pub fn check(&self) -> Result<(), HttpError> {
        match self.code {
            200..=299 => Ok(()),
            401 | 403 => Err(HttpError::Unauthorized(self.code)),
            code => Err(HttpError::Status(code)),
        }
    }
}

/// Parsed request line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub target: String,
}

impl RequestLine {
    /// Parse the first line of a request head. Returns `None` if malformed.
    pub fn parse(head: &[u8]) -> Option<Self> {
        let text = String::from_utf8_lossy(head);
        let line = text.lines().next()?.trim();

        let mut parts = line.split_whitespace();
        let method = parts.next()?;
        let target = parts.next()?;
        let version = parts.next()?;
        if !version.starts_with("HTTP/") {
            return None;
        }

        Some(Self {
            method: method.to_string(),
            target: target.to_string(),
        })
    }
}

/// Build the GET request the reader sends.
///
/// HTTP/1.0 keeps servers from switching to chunked transfer coding,
/// which would interleave chunk sizes with the multipart body.
pub fn build_get_request(
    host: &str,
    port: u16,
    path: &str,
    authorization: Option<&str>,
    user_agent: &str,
) -> Bytes {
    let host_header = if port == super::constants::DEFAULT_HTTP_PORT {
        host.to_string()
    } else {
        format!("{}:{}", host, port)
    };

    let mut request = format!(
        "GET {} HTTP/1.0\r\n\
         Host: {}\r\n\
         User-Agent: {}\r\n\
         Accept: multipart/x-mixed-replace, {}\r\n\
         Connection: close\r\n",
        path, host_header, user_agent, JPEG_CONTENT_TYPE
    );
    if let Some(auth) = authorization {
        request.push_str("Authorization: ");
        request.push_str(auth);
        request.push_str("\r\n");
    }
    request.push_str("\r\n");

    Bytes::from(request)
}

/// Format a timestamp as an HTTP date (IMF-fixdate)
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Response head for a continuous multipart stream
pub fn stream_response_head() -> Bytes {
    Bytes::from(format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: {}\r\n\
         Cache-Control: no-cache, no-store, must-revalidate\r\n\
         Pragma: no-cache\r\n\
         Connection: close\r\n\r\n",
        stream_content_type()
    ))
}

/// Response head for a single still image
pub fn image_response_head(content_length: usize, now: DateTime<Utc>) -> Bytes {
    let date = http_date(now);
    Bytes::from(format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: {}\r\n\
         Content-Length: {}\r\n\
         Date: {}\r\n\
         Last-Modified: {}\r\n\
         Cache-Control: no-cache\r\n\
         Connection: close\r\n\r\n",
        JPEG_CONTENT_TYPE, content_length, date, date
    ))
}

/// Bodiless response used for rejections
pub fn empty_response(code: u16, reason: &str) -> Bytes {
    Bytes::from(format!(
        "HTTP/1.1 {} {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        code, reason
    ))
}

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Standard padded base64, as used by the `Basic` scheme
pub fn base64_encode(input: &[u8]) -> String {
    let mut out = String::with_capacity((input.len() + 2) / 3 * 4);

    for chunk in input.chunks(3) {
        let b0 = chunk[0] as u32;
        let b1 = chunk.get(1).copied().unwrap_or(0) as u32;
        let b2 = chunk.get(2).copied().unwrap_or(0) as u32;
        let triple = (b0 << 16) | (b1 << 8) | b2;

        out.push(BASE64_ALPHABET[(triple >> 18) as usize & 0x3F] as char);
        out.push(BASE64_ALPHABET[(triple >> 12) as usize & 0x3F] as char);
        if chunk.len() > 1 {
            out.push(BASE64_ALPHABET[(triple >> 6) as usize & 0x3F] as char);
        } else {
            out.push('=');
        }
        if chunk.len() > 2 {
            out.push(BASE64_ALPHABET[triple as usize & 0x3F] as char);
        } else {
            out.push('=');
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tokio::io::{AsyncReadExt, BufReader};

    #[test]
    fn test_status_line() {
        let status = StatusLine::parse(b"HTTP/1.1 200 OK\r\nServer: cam\r\n\r\n").unwrap();
        assert_eq!(status.code, 200);
        assert_eq!(status.reason, "OK");
        assert!(status.check().is_ok());

        let status = StatusLine::parse(b"HTTP/1.0 401 Unauthorized\r\n\r\n").unwrap();
        assert_eq!(status.check(), Err(HttpError::Unauthorized(401)));

        let status = StatusLine::parse(b"HTTP/1.1 404 Not Found\r\n\r\n").unwrap();
        assert_eq!(status.check(), Err(HttpError::Status(404)));
    }

    #[test]
    fn test_malformed_status_line() {
        assert!(matches!(
            StatusLine::parse(b"--boundary\r\n"),
            Err(HttpError::MalformedStatusLine(_))
        ));
        assert!(matches!(
            StatusLine::parse(b"HTTP/1.1 abc\r\n"),
            Err(HttpError::MalformedStatusLine(_))
        ));
    }

    #[test]
    fn test_request_line() {
        let req = RequestLine::parse(b"GET /video?x=1 HTTP/1.1\r\nHost: a\r\n\r\n").unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.target, "/video?x=1");

        assert!(RequestLine::parse(b"garbage\r\n\r\n").is_none());
        assert!(RequestLine::parse(b"GET / FTP\r\n\r\n").is_none());
    }

    #[test]
    fn test_build_get_request() {
        let req = build_get_request("cam.local", 8080, "/video", Some("Basic abc"), "test/1");
        let text = std::str::from_utf8(&req).unwrap();

        assert!(text.starts_with("GET /video HTTP/1.0\r\n"));
        assert!(text.contains("Host: cam.local:8080\r\n"));
        assert!(text.contains("Authorization: Basic abc\r\n"));
        assert!(text.ends_with("\r\n\r\n"));

        let req = build_get_request("cam.local", 80, "/", None, "test/1");
        let text = std::str::from_utf8(&req).unwrap();
        assert!(text.contains("Host: cam.local\r\n"));
        assert!(!text.contains("Authorization"));
    }

    #[test]
    fn test_http_date() {
        let at = Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap();
        assert_eq!(http_date(at), "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    #[test]
    fn test_image_response_head() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let head = image_response_head(1000, at);
        let text = std::str::from_utf8(&head).unwrap();

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Type: image/jpeg\r\n"));
        assert!(text.contains("Content-Length: 1000\r\n"));
        assert!(text.contains("Date: Tue, 02 Jan 2024 03:04:05 GMT\r\n"));
        assert!(text.contains("Last-Modified: Tue, 02 Jan 2024 03:04:05 GMT\r\n"));
    }

    #[test]
    fn test_base64() {
        assert_eq!(base64_encode(b""), "");
        assert_eq!(base64_encode(b"f"), "Zg==");
        assert_eq!(base64_encode(b"fo"), "Zm8=");
        assert_eq!(base64_encode(b"foo"), "Zm9v");
        assert_eq!(base64_encode(b"Aladdin:open sesame"), "QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
    }

    #[tokio::test]
    async fn test_read_head_leaves_body_buffered() {
        let data: &[u8] = b"HTTP/1.0 200 OK\r\nContent-Type: x\r\n\r\n--b\r\nrest";
        let mut reader = BufReader::with_capacity(4, data);

        let head = read_head(&mut reader, 1024).await.unwrap();
        assert_eq!(&head[..], b"HTTP/1.0 200 OK\r\nContent-Type: x\r\n\r\n");

        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"--b\r\nrest");
    }

    #[tokio::test]
    async fn test_read_head_limits() {
        let data: &[u8] = b"HTTP/1.0 200 OK\r\n";
        let mut reader = BufReader::new(data);
        assert!(matches!(
            read_head(&mut reader, 1024).await,
            Err(crate::error::Error::Http(HttpError::IncompleteHead))
        ));

        let big = vec![b'a'; 4096];
        let mut reader = BufReader::new(&big[..]);
        assert!(matches!(
            read_head(&mut reader, 100).await,
            Err(crate::error::Error::Http(HttpError::HeadTooLarge(100)))
        ));
    }
}
