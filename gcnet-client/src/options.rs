//! Client options record and overlay
//!
//! Options live on the facade and can be overridden at construction, via
//! `set_options`, and on `connect`/`close`. Overrides are shallow: an
//! [`OptionsPatch`] only carries the fields the caller wants to change, and
//! the overlay takes effect on subsequent operations.

use crate::backoff::BackoffOptions;
use std::time::Duration;

/// Full client configuration
#[derive(Debug, Clone)]
pub struct Options {
    /// Device address
    pub host: String,
    /// Control port, 4998 on every GC family unit
    pub port: u16,
    /// Reconnect after a drop or a manual close
    pub reconnect: bool,
    /// Delay before the first reconnect attempt after a drop
    pub reconnect_delay: Duration,
    /// Reconnection backoff for failed connect attempts
    pub backoff: BackoffOptions,
    /// Budget for TCP connect to complete
    pub connection_timeout: Duration,
    /// Budget a request may sit unsent in the queue
    pub queue_timeout: Duration,
    /// Budget between dispatch and a correlated response
    pub send_timeout: Duration,
    /// Delay before retrying a `sendir` after a busy signal
    pub retry_interval: Duration,
    pub tcp_keep_alive: bool,
    pub tcp_keep_alive_initial_delay: Duration,
}

impl Options {
    /// Options for a device at `host` with the family defaults
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: gcnet_transport::tcp::DEFAULT_PORT,
            reconnect: true,
            reconnect_delay: Duration::from_millis(200),
            backoff: BackoffOptions::default(),
            connection_timeout: Duration::from_millis(3000),
            queue_timeout: Duration::from_millis(500),
            send_timeout: Duration::from_millis(500),
            retry_interval: Duration::from_millis(99),
            tcp_keep_alive: true,
            tcp_keep_alive_initial_delay: Duration::from_secs(30),
        }
    }
}

/// Partial overlay for [`Options`]
#[derive(Debug, Clone, Default)]
pub struct OptionsPatch {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub reconnect: Option<bool>,
    pub reconnect_delay: Option<Duration>,
    pub backoff: Option<BackoffOptions>,
    pub connection_timeout: Option<Duration>,
    pub queue_timeout: Option<Duration>,
    pub send_timeout: Option<Duration>,
    pub retry_interval: Option<Duration>,
    pub tcp_keep_alive: Option<bool>,
    pub tcp_keep_alive_initial_delay: Option<Duration>,
}

impl OptionsPatch {
    /// A patch that only flips `reconnect`, the common `close` override
    pub fn reconnect(value: bool) -> Self {
        Self {
            reconnect: Some(value),
            ..Self::default()
        }
    }
}

impl Options {
    /// Overlay `patch` onto this record
    pub fn apply(&mut self, patch: &OptionsPatch) {
        if let Some(host) = &patch.host {
            self.host = host.clone();
        }
        if let Some(port) = patch.port {
            self.port = port;
        }
        if let Some(reconnect) = patch.reconnect {
            self.reconnect = reconnect;
        }
        if let Some(delay) = patch.reconnect_delay {
            self.reconnect_delay = delay;
        }
        if let Some(backoff) = &patch.backoff {
            self.backoff = backoff.clone();
        }
        if let Some(timeout) = patch.connection_timeout {
            self.connection_timeout = timeout;
        }
        if let Some(timeout) = patch.queue_timeout {
            self.queue_timeout = timeout;
        }
        if let Some(timeout) = patch.send_timeout {
            self.send_timeout = timeout;
        }
        if let Some(interval) = patch.retry_interval {
            self.retry_interval = interval;
        }
        if let Some(keep_alive) = patch.tcp_keep_alive {
            self.tcp_keep_alive = keep_alive;
        }
        if let Some(delay) = patch.tcp_keep_alive_initial_delay {
            self.tcp_keep_alive_initial_delay = delay;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = Options::new("192.168.1.70");
        assert_eq!(options.host, "192.168.1.70");
        assert_eq!(options.port, 4998);
        assert_eq!(options.retry_interval, Duration::from_millis(99));
    }

    #[test]
    fn test_apply_is_shallow() {
        let mut options = Options::new("192.168.1.70");
        options.apply(&OptionsPatch {
            send_timeout: Some(Duration::from_millis(1500)),
            ..OptionsPatch::default()
        });
        assert_eq!(options.send_timeout, Duration::from_millis(1500));
        // Untouched fields keep their values.
        assert_eq!(options.host, "192.168.1.70");
        assert_eq!(options.queue_timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_reconnect_patch() {
        let mut options = Options::new("192.168.1.70");
        options.apply(&OptionsPatch::reconnect(false));
        assert!(!options.reconnect);
    }
}
