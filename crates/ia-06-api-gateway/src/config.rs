//! Gateway configuration with validation.

use serde::{Deserialize, Serialize};
use shared_bus::EventState;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 5000)
    pub port: u16,
    /// Max request body size in bytes (default: 1MB)
    pub max_request_size: usize,
    /// Upper bound on webhook and health requests. Issuance is bounded per
    /// item by the credential exchange timeout instead.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Credential exchange states that are republished to the bus.
    pub terminal_states: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 5000,
            max_request_size: 1024 * 1024,
            request_timeout: Duration::from_secs(300),
            terminal_states: vec!["done".into(), "abandoned".into(), "deleted".into()],
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    #[error("at least one terminal credential exchange state is required")]
    NoTerminalStates,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_request_size == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_request_size cannot be 0".into(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "request_timeout cannot be 0".into(),
            ));
        }
        if self.terminal_states.iter().all(|s| s.trim().is_empty()) {
            return Err(ConfigError::NoTerminalStates);
        }
        Ok(())
    }

    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Terminal states in typed form, so `credential_acked` matches `done`.
    pub fn terminal_event_states(&self) -> Vec<EventState> {
        self.terminal_states
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(EventState::parse)
            .collect()
    }
}
