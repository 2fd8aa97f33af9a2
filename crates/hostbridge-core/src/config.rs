//! Centralized configuration for the host bridge.
//!
//! Timing and capacity constants for the listener, the streaming and polling
//! event channels, and the main-thread dispatcher.

use std::time::Duration;

/// Listener configuration.
pub struct ServerConfig;

impl ServerConfig {
    pub const APP_NAME: &'static str = "hostbridge";
    pub const DEFAULT_HOST: &'static str = "127.0.0.1";
    pub const DEFAULT_PORT: u16 = 8787;

    /// Upper bound on how long `start` waits for the listener to bind.
    pub const START_TIMEOUT: Duration = Duration::from_secs(5);
    pub const READY_POLL_INTERVAL: Duration = Duration::from_millis(10);

    /// How long in-flight requests get to finish once a stop is requested.
    pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);
    pub const WORKER_THREADS: usize = 4;
}

/// Streaming (push) client configuration.
pub struct StreamConfig;

impl StreamConfig {
    pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
    pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 1024;
    pub const CHANNEL_CAPACITY: usize = 64;
}

/// Polling client configuration.
pub struct PollConfig;

impl PollConfig {
    pub const BUFFER_CAPACITY: usize = 4096;
    pub const DEFAULT_WAIT: Duration = Duration::from_secs(1);
    pub const MAX_WAIT: Duration = Duration::from_secs(30);
    pub const POLL_INTERVAL: Duration = Duration::from_millis(50);
}

/// Main-thread dispatch configuration.
pub struct DispatchConfig;

impl DispatchConfig {
    pub const MAX_PENDING_TASKS: usize = 256;

    /// Cadence of the host idle callback that drains the queue.
    pub const DRAIN_INTERVAL: Duration = Duration::from_millis(16);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts_are_reasonable() {
        assert!(ServerConfig::START_TIMEOUT > ServerConfig::READY_POLL_INTERVAL);
        assert!(PollConfig::MAX_WAIT >= PollConfig::DEFAULT_WAIT);
        assert!(StreamConfig::HEARTBEAT_INTERVAL > Duration::ZERO);
    }
}
