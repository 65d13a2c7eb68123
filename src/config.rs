//! Hub configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Missing or unparsable values fall
//! back to defaults; capacities and timeouts are clamped to at least 1.

use std::net::SocketAddr;
use std::time::Duration;

/// Top-level hub configuration.
///
/// Loaded once at startup via [`HubConfig::from_env`].
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:8080`).
    pub listen_addr: SocketAddr,

    /// Capacity of each session's outbound queue, in envelopes.
    pub outbound_queue_capacity: usize,

    /// Capacity of the hub's ordered command channel.
    pub hub_command_capacity: usize,

    /// Silence allowed before a session is considered dead.
    pub heartbeat_timeout: Duration,

    /// Deadline for one flush or ping write.
    pub write_timeout: Duration,

    /// Largest inbound frame accepted, in bytes.
    pub max_message_size: usize,

    /// Emit JSON log lines instead of human-readable ones.
    pub json_logs: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            outbound_queue_capacity: 256,
            hub_command_capacity: 1024,
            heartbeat_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
            max_message_size: 512,
            json_logs: false,
        }
    }
}

impl HubConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, std::net::AddrParseError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let listen_addr = match std::env::var("LISTEN_ADDR") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.listen_addr,
        };

        Ok(Self {
            listen_addr,
            outbound_queue_capacity: parse_env(
                "OUTBOUND_QUEUE_CAPACITY",
                defaults.outbound_queue_capacity,
            )
            .max(1),
            hub_command_capacity: parse_env("HUB_COMMAND_CAPACITY", defaults.hub_command_capacity)
                .max(1),
            heartbeat_timeout: Duration::from_secs(
                parse_env("WS_HEARTBEAT_TIMEOUT_SECS", defaults.heartbeat_timeout.as_secs()).max(1),
            ),
            write_timeout: Duration::from_secs(
                parse_env("WS_WRITE_TIMEOUT_SECS", defaults.write_timeout.as_secs()).max(1),
            ),
            max_message_size: parse_env("WS_MAX_MESSAGE_SIZE", defaults.max_message_size).max(1),
            json_logs: std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")),
        })
    }

    /// Interval between server pings: nine tenths of the heartbeat timeout,
    /// so a healthy client is always probed before its deadline lapses.
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_timeout * 9 / 10
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_constants() {
        let cfg = HubConfig::default();
        assert_eq!(cfg.outbound_queue_capacity, 256);
        assert_eq!(cfg.heartbeat_timeout, Duration::from_secs(60));
        assert_eq!(cfg.write_timeout, Duration::from_secs(10));
        assert_eq!(cfg.max_message_size, 512);
    }

    #[test]
    fn heartbeat_interval_is_nine_tenths() {
        let cfg = HubConfig::default();
        assert_eq!(cfg.heartbeat_interval(), Duration::from_secs(54));

        let short = HubConfig {
            heartbeat_timeout: Duration::from_millis(500),
            ..HubConfig::default()
        };
        assert_eq!(short.heartbeat_interval(), Duration::from_millis(450));
    }

    #[test]
    fn parse_env_falls_back_on_missing_key() {
        let value: usize = parse_env("NOTIFY_HUB_SURELY_UNSET_KEY", 7);
        assert_eq!(value, 7);
    }
}
