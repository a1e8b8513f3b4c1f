//! Server configuration types.

use std::time::Duration;

/// Default listening address.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default listening port.
pub const DEFAULT_PORT: u16 = 30125;

/// Default idle timeout for a single socket read.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Default upper bound on bytes taken from the socket per read.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 1024;

/// SMTP listener configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: String,
    /// Port to bind. Zero picks a free port.
    pub port: u16,
    /// Longest wait for the next bytes from a client. `None` waits forever.
    pub idle_timeout: Option<Duration>,
    /// Bytes requested from the socket per read.
    pub read_chunk_size: usize,
}

impl ServerConfig {
    /// Creates a configuration with the default loopback address and port.
    #[must_use]
    pub fn new() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfigBuilder {
    host: String,
    port: u16,
    idle_timeout: Option<Duration>,
    read_chunk_size: usize,
}

impl ServerConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        let defaults = ServerConfig::new();
        Self {
            host: defaults.host,
            port: defaults.port,
            idle_timeout: defaults.idle_timeout,
            read_chunk_size: defaults.read_chunk_size,
        }
    }

    /// Sets the address to bind.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the idle timeout. `None` disables it.
    #[must_use]
    pub const fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the per-read chunk size. Zero is raised to one byte.
    #[must_use]
    pub const fn read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = if size == 0 { 1 } else { size };
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ServerConfig {
        ServerConfig {
            host: self.host,
            port: self.port,
            idle_timeout: self.idle_timeout,
            read_chunk_size: self.read_chunk_size,
        }
    }
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_config_new() {
        let config = ServerConfig::new();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 30125);
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(300)));
        assert_eq!(config.read_chunk_size, 1024);
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_config_builder() {
        let config = ServerConfig::builder()
            .host("0.0.0.0")
            .port(2525)
            .idle_timeout(None)
            .read_chunk_size(16)
            .build();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 2525);
        assert_eq!(config.idle_timeout, None);
        assert_eq!(config.read_chunk_size, 16);
    }

    #[test]
    fn test_zero_chunk_size_is_raised() {
        let config = ServerConfig::builder().read_chunk_size(0).build();
        assert_eq!(config.read_chunk_size, 1);
    }
}
