//! Server configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on (0 = pick an ephemeral port at start)
    pub port: u16,

    /// Serve one still image per request instead of a multipart stream
    pub single_frame: bool,

    /// Address to bind to
    pub bind_ip: IpAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Bound on every write to a client
    pub write_timeout: Duration,

    /// Request head must arrive within this time
    pub request_timeout: Duration,

    /// How long `stop` waits for connections before closing them
    pub shutdown_grace: Duration,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 0,
            single_frame: false,
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            max_connections: 0, // Unlimited
            write_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(2),
            tcp_nodelay: true, // Parts are flushed one by one
        }
    }
}

impl ServerConfig {
    /// Create a new config listening on `port`
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Listening address for a given port
    pub fn socket_addr(&self, port: u16) -> SocketAddr {
        SocketAddr::new(self.bind_ip, port)
    }

    /// Set the port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Serve single images
    pub fn single_frame(mut self, single: bool) -> Self {
        self.single_frame = single;
        self
    }

    /// Set the bind address
    pub fn bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set write timeout
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set shutdown grace period
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.port, 0);
        assert!(!config.single_frame);
        assert_eq!(config.max_connections, 0);
        assert!(config.tcp_nodelay);
        assert_eq!(config.socket_addr(8080).to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn test_with_port() {
        let config = ServerConfig::with_port(8081);

        assert_eq!(config.port, 8081);
    }

    #[test]
    fn test_builder_chaining() {
        let config = ServerConfig::default()
            .port(9000)
            .single_frame(true)
            .bind_ip(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .max_connections(5)
            .write_timeout(Duration::from_secs(1))
            .request_timeout(Duration::from_secs(2))
            .shutdown_grace(Duration::from_millis(100));

        assert_eq!(config.port, 9000);
        assert!(config.single_frame);
        assert_eq!(config.socket_addr(9000).to_string(), "127.0.0.1:9000");
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.write_timeout, Duration::from_secs(1));
        assert_eq!(config.request_timeout, Duration::from_secs(2));
        assert_eq!(config.shutdown_grace, Duration::from_millis(100));
    }
}
