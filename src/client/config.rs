//! Reader configuration

use std::time::Duration;

use crate::error::{AuthError, UrlError};
use crate::protocol::constants::*;
use crate::protocol::http::base64_encode;

/// Parsed `http://` target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MjpegUrl {
    /// Host name or address (IPv6 without brackets)
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Path and query, always starting with `/`
    pub path: String,
    /// User info embedded in the URL
    pub userinfo: Option<(String, String)>,
}

impl MjpegUrl {
    /// Parse `http://[user[:pass]@]host[:port][/path][?query]`
    pub fn parse(url: &str) -> Result<Self, UrlError> {
        let url = url.trim();
        let (scheme, rest) = url.split_once("://").ok_or(UrlError::MissingScheme)?;
        if !scheme.eq_ignore_ascii_case("http") {
            return Err(UrlError::UnsupportedScheme(scheme.to_string()));
        }

        let (authority, path) = match rest.find(|c: char| c == '/' || c == '?') {
            Some(idx) if rest.as_bytes()[idx] == b'?' => (&rest[..idx], format!("/{}", &rest[idx..])),
            Some(idx) => (&rest[..idx], rest[idx..].to_string()),
            None => (rest, "/".to_string()),
        };

        let (userinfo, hostport) = match authority.rsplit_once('@') {
            Some((info, hostport)) => {
                let (user, pass) = info.split_once(':').unwrap_or((info, ""));
                (Some((user.to_string(), pass.to_string())), hostport)
            }
            None => (None, authority),
        };

        let (host, port) = split_host_port(hostport)?;
        if host.is_empty() {
            return Err(UrlError::EmptyHost);
        }

        Ok(Self {
            host: host.to_string(),
            port,
            path,
            userinfo,
        })
    }

    /// `host:port` suitable for `TcpStream::connect`
    pub fn socket_target(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Host as it should appear in a `Host` header
    pub fn host_header(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        }
    }
}

fn split_host_port(hostport: &str) -> Result<(&str, u16), UrlError> {
    // Bracketed IPv6: [::1]:8080
    if let Some(rest) = hostport.strip_prefix('[') {
        let (host, after) = rest.split_once(']').ok_or(UrlError::EmptyHost)?;
        return match after.strip_prefix(':') {
            Some(port) => Ok((host, parse_port(port)?)),
            None if after.is_empty() => Ok((host, DEFAULT_HTTP_PORT)),
            None => Err(UrlError::InvalidPort(after.to_string())),
        };
    }

    match hostport.rsplit_once(':') {
        Some((host, port)) => Ok((host, parse_port(port)?)),
        None => Ok((hostport, DEFAULT_HTTP_PORT)),
    }
}

fn parse_port(port: &str) -> Result<u16, UrlError> {
    port.parse::<u16>()
        .map_err(|_| UrlError::InvalidPort(port.to_string()))
}

/// HTTP authentication scheme
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Basic base64(login:password)`
    Basic,
    /// `Authorization: Bearer <password>`
    Bearer,
    /// Anything else; rejected when the request is built
    Other(String),
}

impl AuthScheme {
    /// Scheme from its name, case-insensitive
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("basic") {
            AuthScheme::Basic
        } else if name.eq_ignore_ascii_case("bearer") {
            AuthScheme::Bearer
        } else {
            AuthScheme::Other(name.to_string())
        }
    }
}

/// Login, password and scheme for the remote camera
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login: String,
    pub password: String,
    pub scheme: AuthScheme,
}

impl Credentials {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
            scheme: AuthScheme::Basic,
        }
    }

    /// Value of the `Authorization` header
    pub fn authorization(&self) -> Result<String, AuthError> {
        match self.scheme {
            AuthScheme::Basic => {
                let raw = format!("{}:{}", self.login, self.password);
                Ok(format!("Basic {}", base64_encode(raw.as_bytes())))
            }
            AuthScheme::Bearer => Ok(format!("Bearer {}", self.password)),
            AuthScheme::Other(ref name) => Err(AuthError::UnsupportedScheme(name.clone())),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .field("scheme", &self.scheme)
            .finish()
    }
}

/// Reader configuration options
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Remote MJPEG URL
    pub url: String,

    /// Explicit credentials (take precedence over URL user info)
    pub credentials: Option<Credentials>,

    /// Reconnect after the stream is lost
    pub restart_on_error: bool,

    /// Bound on each individual socket read
    pub read_timeout: Duration,

    /// Cumulative stall before the connection is declared lost
    pub give_up_timeout: Duration,

    /// Wait between losing a connection and reconnecting
    pub reconnect_delay: Duration,

    /// Bound on TCP connect plus response head
    pub connect_timeout: Duration,

    /// Initial scratch buffer size
    pub initial_buffer_size: usize,

    /// Part header block size limit
    pub max_header_size: usize,

    /// Largest `Content-Length` accepted
    pub max_frame_size: usize,

    /// `User-Agent` header value
    pub user_agent: String,

    /// Event queue capacity
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            credentials: None,
            restart_on_error: true,
            read_timeout: Duration::from_millis(200),
            give_up_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(3),
            initial_buffer_size: DEFAULT_SCRATCH_SIZE,
            max_header_size: DEFAULT_MAX_HEADER_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            event_capacity: 256,
        }
    }
}

impl ClientConfig {
    /// Create a config for the given URL with default settings
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Parse the configured URL
    pub fn parse_url(&self) -> Result<MjpegUrl, UrlError> {
        MjpegUrl::parse(&self.url)
    }

    /// Credentials to use: explicit ones if a login is set, otherwise URL user info
    pub fn effective_credentials(&self, url: &MjpegUrl) -> Option<Credentials> {
        match self.credentials {
            Some(ref c) if !c.login.is_empty() => Some(c.clone()),
            _ => url
                .userinfo
                .as_ref()
                .filter(|(login, _)| !login.is_empty())
                .map(|(login, password)| {
                    let scheme = self
                        .credentials
                        .as_ref()
                        .map(|c| c.scheme.clone())
                        .unwrap_or(AuthScheme::Basic);
                    Credentials {
                        login: login.clone(),
                        password: password.clone(),
                        scheme,
                    }
                }),
        }
    }

    /// Set login and password (scheme defaults to Basic)
    pub fn credentials(mut self, login: impl Into<String>, password: impl Into<String>) -> Self {
        let scheme = self
            .credentials
            .take()
            .map(|c| c.scheme)
            .unwrap_or(AuthScheme::Basic);
        self.credentials = Some(Credentials {
            login: login.into(),
            password: password.into(),
            scheme,
        });
        self
    }

    /// Set the authentication scheme by name (e.g. "Basic")
    pub fn auth_scheme(mut self, name: &str) -> Self {
        let scheme = AuthScheme::from_name(name);
        match self.credentials {
            Some(ref mut c) => c.scheme = scheme,
            None => {
                self.credentials = Some(Credentials {
                    login: String::new(),
                    password: String::new(),
                    scheme,
                })
            }
        }
        self
    }

    /// Set restart-on-error
    pub fn restart_on_error(mut self, restart: bool) -> Self {
        self.restart_on_error = restart;
        self
    }

    /// Set per-read timeout
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set give-up timeout
    pub fn give_up_timeout(mut self, timeout: Duration) -> Self {
        self.give_up_timeout = timeout;
        self
    }

    /// Set reconnect delay
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set initial scratch buffer size
    pub fn initial_buffer_size(mut self, size: usize) -> Self {
        self.initial_buffer_size = size;
        self
    }

    /// Set the largest accepted frame
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Set the event queue capacity. A quarter of it is kept free for
    /// connection state events.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();

        assert!(config.restart_on_error);
        assert_eq!(config.read_timeout, Duration::from_millis(200));
        assert_eq!(config.give_up_timeout, Duration::from_secs(10));
        assert_eq!(config.reconnect_delay, Duration::from_secs(1));
        assert_eq!(config.initial_buffer_size, DEFAULT_SCRATCH_SIZE);
        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_builder_chaining() {
        let config = ClientConfig::new("http://10.0.0.5:8080/video")
            .credentials("admin", "secret")
            .auth_scheme("basic")
            .restart_on_error(false)
            .read_timeout(Duration::from_millis(50))
            .give_up_timeout(Duration::from_secs(2))
            .reconnect_delay(Duration::from_millis(500));

        let creds = config.credentials.as_ref().unwrap();
        assert_eq!(creds.login, "admin");
        assert_eq!(creds.scheme, AuthScheme::Basic);
        assert!(!config.restart_on_error);
        assert_eq!(config.give_up_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_scheme_before_credentials_is_kept() {
        let config = ClientConfig::new("http://cam/")
            .auth_scheme("Bearer")
            .credentials("user", "token");

        assert_eq!(config.credentials.unwrap().scheme, AuthScheme::Bearer);
    }

    #[test]
    fn test_parse_full_url() {
        let url = MjpegUrl::parse("http://admin:pw@10.2.13.100:8080/video?fps=10").unwrap();

        assert_eq!(url.host, "10.2.13.100");
        assert_eq!(url.port, 8080);
        assert_eq!(url.path, "/video?fps=10");
        assert_eq!(url.userinfo, Some(("admin".into(), "pw".into())));
        assert_eq!(url.socket_target(), "10.2.13.100:8080");
    }

    #[test]
    fn test_parse_minimal_url() {
        let url = MjpegUrl::parse("HTTP://camera.local").unwrap();

        assert_eq!(url.host, "camera.local");
        assert_eq!(url.port, 80);
        assert_eq!(url.path, "/");
        assert!(url.userinfo.is_none());
    }

    #[test]
    fn test_parse_query_without_path() {
        let url = MjpegUrl::parse("http://cam:81?action=stream").unwrap();
        assert_eq!(url.port, 81);
        assert_eq!(url.path, "/?action=stream");
    }

    #[test]
    fn test_parse_ipv6() {
        let url = MjpegUrl::parse("http://[::1]:9000/mjpeg").unwrap();

        assert_eq!(url.host, "::1");
        assert_eq!(url.port, 9000);
        assert_eq!(url.socket_target(), "[::1]:9000");
        assert_eq!(url.host_header(), "[::1]");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(MjpegUrl::parse("10.0.0.1/video"), Err(UrlError::MissingScheme));
        assert_eq!(
            MjpegUrl::parse("https://cam/video"),
            Err(UrlError::UnsupportedScheme("https".into()))
        );
        assert_eq!(MjpegUrl::parse("http:///video"), Err(UrlError::EmptyHost));
        assert_eq!(
            MjpegUrl::parse("http://cam:99999/"),
            Err(UrlError::InvalidPort("99999".into()))
        );
    }

    #[test]
    fn test_authorization_header() {
        let creds = Credentials::new("Aladdin", "open sesame");
        assert_eq!(
            creds.authorization().unwrap(),
            "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ=="
        );

        let mut creds = Credentials::new("x", "tok");
        creds.scheme = AuthScheme::from_name("Digest");
        assert_eq!(
            creds.authorization(),
            Err(AuthError::UnsupportedScheme("Digest".into()))
        );
    }

    #[test]
    fn test_effective_credentials() {
        let url = MjpegUrl::parse("http://u:p@cam/").unwrap();

        // URL user info used when no login is configured
        let config = ClientConfig::new("http://u:p@cam/");
        let creds = config.effective_credentials(&url).unwrap();
        assert_eq!(creds.login, "u");
        assert_eq!(creds.password, "p");

        // Explicit login wins
        let config = ClientConfig::new("http://u:p@cam/").credentials("admin", "pw");
        assert_eq!(config.effective_credentials(&url).unwrap().login, "admin");

        // No login anywhere means no credentials
        let url = MjpegUrl::parse("http://cam/").unwrap();
        let config = ClientConfig::new("http://cam/").credentials("", "pw");
        assert!(config.effective_credentials(&url).is_none());
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::new("admin", "hunter2");
        let printed = format!("{:?}", creds);
        assert!(!printed.contains("hunter2"));
    }
}
