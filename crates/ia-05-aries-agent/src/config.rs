//! Agent client configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Where and how to reach the issuer's agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Admin API base URL, without trailing slash.
    pub admin_url: String,

    /// Sent as `x-api-key` on every admin call.
    pub api_key: Option<String>,

    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Acceptance mechanism reported when accepting the ledger TAA.
    pub taa_mechanism: String,

    /// Credential registry agent, needed to connect to the registry.
    pub registry: Option<RemoteAgentConfig>,

    /// Endorser agent, needed for endorser connections and DID registration.
    pub endorser: Option<RemoteAgentConfig>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            admin_url: "http://localhost:8024".to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            taa_mechanism: "service_agreement".to_string(),
            registry: None,
            endorser: None,
        }
    }
}

/// Another agent this agency talks to directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteAgentConfig {
    pub admin_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Label the remote agent presents in invitations.
    pub alias: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AgentConfigError {
    #[error("agent admin URL must be an http(s) URL, got {0:?}")]
    InvalidAdminUrl(String),
    #[error("request timeout must be greater than zero")]
    ZeroTimeout,
}

impl AgentConfig {
    pub fn validate(&self) -> Result<(), AgentConfigError> {
        let urls = std::iter::once(&self.admin_url)
            .chain(self.registry.iter().map(|r| &r.admin_url))
            .chain(self.endorser.iter().map(|e| &e.admin_url));
        for url in urls {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(AgentConfigError::InvalidAdminUrl(url.clone()));
            }
        }
        if self.request_timeout.is_zero() {
            return Err(AgentConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// Admin URL with any trailing slash removed.
    pub fn base_url(&self) -> &str {
        self.admin_url.trim_end_matches('/')
    }
}
