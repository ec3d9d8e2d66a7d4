use std::time::Duration;

use tinyweb_http::buffer::{DEFAULT_INITIAL_CAPACITY, DEFAULT_MAX_CAPACITY};
use tinyweb_http::codec::KeepAlive;
use tinyweb_http::connection::ConnectionLimits;
use tracing::Level;

/// Idle connections are closed after this long without activity.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Connections beyond this count are answered with `Server busy!` and closed.
pub const DEFAULT_MAX_CONNECTIONS: usize = 65536;

/// Requests served on one persistent connection before it is closed.
pub const DEFAULT_KEEP_ALIVE_MAX: u32 = 6;

/// Runtime settings of a [`Server`](crate::Server).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub idle_timeout: Duration,
    pub max_connections: usize,
    pub initial_buffer_capacity: usize,
    pub max_buffer_capacity: usize,
    pub keep_alive_max: u32,
    pub log_level: Level,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            initial_buffer_capacity: DEFAULT_INITIAL_CAPACITY,
            max_buffer_capacity: DEFAULT_MAX_CAPACITY,
            keep_alive_max: DEFAULT_KEEP_ALIVE_MAX,
            log_level: Level::INFO,
        }
    }
}

impl ServerConfig {
    /// The per-connection part of the configuration.
    ///
    /// The advertised `Keep-Alive` timeout is the idle timeout, in whole seconds.
    pub fn connection_limits(&self) -> ConnectionLimits {
        ConnectionLimits {
            initial_buffer_capacity: self.initial_buffer_capacity,
            max_buffer_capacity: self.max_buffer_capacity,
            keep_alive: KeepAlive { max: self.keep_alive_max, timeout_secs: self.idle_timeout.as_secs() },
        }
    }
}
