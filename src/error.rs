//! Error types
//!
//! Every fallible operation in the crate returns [`Result`]. The reader never
//! lets these escape its task; they are translated into
//! [`ClientEvent`](crate::client::ClientEvent) notifications instead.

use std::fmt;
use std::io;
use std::net::SocketAddr;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Underlying socket error
    Io(io::Error),
    /// Target URL could not be parsed
    Url(UrlError),
    /// HTTP-level failure while opening a stream
    Http(HttpError),
    /// The remote endpoint is not speaking the expected MJPEG dialect
    Protocol(ProtocolError),
    /// Credentials could not be attached
    Auth(AuthError),
    /// Frame server lifecycle errors
    Server(ServerError),
    /// An operation did not complete in time
    Timeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Url(e) => write!(f, "Invalid URL: {}", e),
            Error::Http(e) => write!(f, "HTTP error: {}", e),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e),
            Error::Auth(e) => write!(f, "Authentication error: {}", e),
            Error::Server(e) => write!(f, "Server error: {}", e),
            Error::Timeout => write!(f, "Operation timed out"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Server(ServerError::Bind { source, .. }) => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<UrlError> for Error {
    fn from(e: UrlError) -> Self {
        Error::Url(e)
    }
}

impl From<HttpError> for Error {
    fn from(e: HttpError) -> Self {
        Error::Http(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<AuthError> for Error {
    fn from(e: AuthError) -> Self {
        Error::Auth(e)
    }
}

impl From<ServerError> for Error {
    fn from(e: ServerError) -> Self {
        Error::Server(e)
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Error::Timeout
    }
}

/// URL parsing errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlError {
    /// Only plain `http://` is supported
    UnsupportedScheme(String),
    /// No `scheme://` prefix
    MissingScheme,
    /// Host part is empty
    EmptyHost,
    /// Port is not a valid u16
    InvalidPort(String),
}

impl fmt::Display for UrlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlError::UnsupportedScheme(s) => write!(f, "unsupported scheme '{}'", s),
            UrlError::MissingScheme => write!(f, "missing scheme"),
            UrlError::EmptyHost => write!(f, "empty host"),
            UrlError::InvalidPort(p) => write!(f, "invalid port '{}'", p),
        }
    }
}

/// HTTP response errors seen by the reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    /// Status line did not parse
    MalformedStatusLine(String),
    /// 401 or 403 from the camera
    Unauthorized(u16),
    /// Any other non-success status
    Status(u16),
    /// Response head exceeded the configured limit
    HeadTooLarge(usize),
    /// Connection closed before the response head was complete
    IncompleteHead,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpError::MalformedStatusLine(line) => write!(f, "malformed status line: {}", line),
            HttpError::Unauthorized(code) => write!(f, "credentials rejected ({})", code),
            HttpError::Status(code) => write!(f, "unexpected status {}", code),
            HttpError::HeadTooLarge(n) => write!(f, "response head larger than {} bytes", n),
            HttpError::IncompleteHead => write!(f, "connection closed during response head"),
        }
    }
}

/// Multipart framing violations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Part declared a content type other than `image/jpeg`
    UnsupportedContentType(String),
    /// Part declares a length but no content type
    MissingContentType,
    /// Part header block exceeded the configured limit
    HeaderTooLarge(usize),
    /// Declared `Content-Length` exceeds the configured limit
    FrameTooLarge { declared: usize, limit: usize },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::UnsupportedContentType(ct) => {
                write!(f, "content type not supported: {}", ct)
            }
            ProtocolError::MissingContentType => write!(f, "part has no content type"),
            ProtocolError::HeaderTooLarge(n) => write!(f, "part header larger than {} bytes", n),
            ProtocolError::FrameTooLarge { declared, limit } => {
                write!(f, "frame of {} bytes exceeds limit of {}", declared, limit)
            }
        }
    }
}

/// Credential errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Scheme name is not one we can produce an `Authorization` header for
    UnsupportedScheme(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::UnsupportedScheme(s) => write!(f, "unsupported scheme '{}'", s),
        }
    }
}

/// Frame server lifecycle errors
#[derive(Debug)]
pub enum ServerError {
    /// Listening socket could not be bound
    Bind { addr: SocketAddr, source: io::Error },
    /// Port and mode are fixed while listening
    AlreadyListening,
    /// Operation requires a running server
    NotListening,
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Bind { addr, source } => write!(f, "failed to bind {}: {}", addr, source),
            ServerError::AlreadyListening => write!(f, "server is already listening"),
            ServerError::NotListening => write!(f, "server is not listening"),
        }
    }
}
