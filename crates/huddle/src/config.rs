//! Server configuration.
//!
//! Only the relay's own knobs live here. TLS material and origin policy
//! belong to whatever terminates the connection in front of the relay.

use std::time::Duration;

use crate::HuddleError;

/// Environment variable holding the listen address.
pub const BIND_ADDR_ENV: &str = "HUDDLE_BIND_ADDR";

/// Environment variable holding the idle timeout in whole seconds.
pub const IDLE_TIMEOUT_ENV: &str = "HUDDLE_IDLE_TIMEOUT_SECS";

/// Environment variable holding the WebSocket upgrade timeout in whole
/// seconds.
pub const HANDSHAKE_TIMEOUT_ENV: &str = "HUDDLE_HANDSHAKE_TIMEOUT_SECS";

/// Settings for a [`HuddleServer`](crate::HuddleServer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// How long a connection may stay silent before it is dropped. Any
    /// inbound frame, including a `heartbeat`, resets the clock.
    pub idle_timeout: Duration,

    /// How long a freshly accepted socket may take to complete its
    /// WebSocket upgrade.
    pub handshake_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            idle_timeout: Duration::from_secs(60),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    /// Builds a config from the process environment, falling back to the
    /// defaults for unset variables.
    ///
    /// # Errors
    /// Returns [`HuddleError::Config`] if a variable is set but unusable.
    pub fn from_env() -> Result<Self, HuddleError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, HuddleError> {
        let mut config = Self::default();

        if let Some(addr) = lookup(BIND_ADDR_ENV) {
            let addr = addr.trim();
            if addr.is_empty() {
                return Err(HuddleError::Config(format!("{BIND_ADDR_ENV} is empty")));
            }
            config.bind_addr = addr.to_string();
        }

        if let Some(secs) = lookup(IDLE_TIMEOUT_ENV) {
            config.idle_timeout = parse_secs(IDLE_TIMEOUT_ENV, &secs)?;
        }
        if let Some(secs) = lookup(HANDSHAKE_TIMEOUT_ENV) {
            config.handshake_timeout = parse_secs(HANDSHAKE_TIMEOUT_ENV, &secs)?;
        }

        Ok(config)
    }
}

/// Parses a positive whole number of seconds.
fn parse_secs(key: &str, value: &str) -> Result<Duration, HuddleError> {
    let secs: u64 = value
        .trim()
        .parse()
        .map_err(|_| HuddleError::Config(format!("{key}={value}")))?;
    if secs == 0 {
        return Err(HuddleError::Config(format!("{key} must be at least 1")));
    }
    Ok(Duration::from_secs(secs))
}
