//! # Agency Configuration
//!
//! Unified configuration for every component and the runtime itself.
//!
//! Values come from, in increasing priority: built-in defaults, an optional
//! JSON file named by `IA_CONFIG_FILE`, and `IA_*` environment variables.

use ia_03_event_correlator::CorrelatorConfig;
use ia_04_batch_orchestrator::OrchestratorConfig;
use ia_05_aries_agent::{AgentConfig, AgentConfigError, RemoteAgentConfig};
use ia_06_api_gateway::GatewayConfig;
use serde::{Deserialize, Serialize};
use shared_types::IssuerProfile;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Complete agency configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgencyConfig {
    /// Upstream agent.
    pub agent: AgentSettings,
    /// HTTP server.
    pub http: GatewayConfig,
    /// Issuer on whose behalf credentials are issued.
    pub issuer: IssuerSettings,
    /// Event correlation.
    pub correlator: CorrelatorConfig,
}

/// Upstream agent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Admin API client.
    #[serde(flatten)]
    pub client: AgentConfig,
    /// How long one credential exchange may take to complete.
    #[serde(with = "humantime_serde")]
    pub cred_ex_timeout: Duration,
    /// Pause between readiness probes at startup.
    #[serde(with = "humantime_serde")]
    pub readiness_poll_interval: Duration,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            client: AgentConfig::default(),
            cred_ex_timeout: OrchestratorConfig::default().cred_ex_timeout,
            readiness_poll_interval: ia_02_readiness_gate::DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Issuer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerSettings {
    /// JSON file holding the [`IssuerProfile`]. Without one the issuer has no
    /// known schemas and every request fails validation.
    pub profile_path: Option<PathBuf>,
    /// Mechanism reported when accepting the ledger TAA.
    pub taa_mechanism: String,
    /// Tag for credential definitions the agency publishes.
    pub cred_def_tag: String,
    /// Whether published credential definitions support revocation.
    pub support_revocation: bool,
    /// Endorser connection used when a schema or credential definition has
    /// to be written to the ledger.
    pub endorser_connection_id: Option<String>,
}

impl Default for IssuerSettings {
    fn default() -> Self {
        Self {
            profile_path: None,
            taa_mechanism: "service_agreement".to_string(),
            cred_def_tag: "default".to_string(),
            support_revocation: false,
            endorser_connection_id: None,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("agent: {0}")]
    Agent(#[from] AgentConfigError),

    #[error("http: {0}")]
    Http(#[from] ia_06_api_gateway::ConfigError),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

impl AgencyConfig {
    /// Check every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.agent.client.validate()?;
        self.http.validate()?;
        if self.agent.cred_ex_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("agent.cred_ex_timeout"));
        }
        if self.agent.readiness_poll_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("agent.readiness_poll_interval"));
        }
        Ok(())
    }

    /// Read a JSON configuration file. Missing sections keep their defaults.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse { path, source })
    }

    /// Apply `IA_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let agent = &mut self.agent;
        if let Some(url) = lookup("IA_AGENT_ADMIN_URL") {
            agent.client.admin_url = url;
        }
        if let Some(key) = lookup("IA_AGENT_API_KEY") {
            agent.client.api_key = Some(key).filter(|k| !k.is_empty());
        }
        if let Some(value) = lookup("IA_AGENT_REQUEST_TIMEOUT") {
            agent.client.request_timeout = parse_duration("IA_AGENT_REQUEST_TIMEOUT", value)?;
        }
        if let Some(value) = lookup("IA_CRED_EX_TIMEOUT") {
            agent.cred_ex_timeout = parse_duration("IA_CRED_EX_TIMEOUT", value)?;
        }
        if let Some(value) = lookup("IA_READINESS_POLL_INTERVAL") {
            agent.readiness_poll_interval = parse_duration("IA_READINESS_POLL_INTERVAL", value)?;
        }
        if let Some(url) = lookup("IA_REGISTRY_ADMIN_URL") {
            agent.client.registry = Some(remote_agent(url, &lookup, "IA_REGISTRY"));
        }
        if let Some(url) = lookup("IA_ENDORSER_ADMIN_URL") {
            agent.client.endorser = Some(remote_agent(url, &lookup, "IA_ENDORSER"));
        }

        if let Some(value) = lookup("IA_HTTP_HOST") {
            self.http.host = value.parse().map_err(|e: std::net::AddrParseError| {
                ConfigError::InvalidValue {
                    var: "IA_HTTP_HOST",
                    value: value.clone(),
                    reason: e.to_string(),
                }
            })?;
        }
        if let Some(value) = lookup("IA_HTTP_PORT") {
            self.http.port = value.parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidValue {
                    var: "IA_HTTP_PORT",
                    value: value.clone(),
                    reason: e.to_string(),
                }
            })?;
        }

        if let Some(path) = lookup("IA_ISSUER_PROFILE") {
            self.issuer.profile_path = Some(PathBuf::from(path));
        }
        if let Some(mechanism) = lookup("IA_TAA_MECHANISM") {
            self.issuer.taa_mechanism = mechanism;
        }
        if let Some(conn) = lookup("IA_ENDORSER_CONNECTION_ID") {
            self.issuer.endorser_connection_id = Some(conn).filter(|c| !c.is_empty());
        }
        Ok(())
    }

    /// Agent client configuration with issuer-level settings applied.
    pub fn agent_client(&self) -> AgentConfig {
        AgentConfig {
            taa_mechanism: self.issuer.taa_mechanism.clone(),
            ..self.agent.client.clone()
        }
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            cred_ex_timeout: self.agent.cred_ex_timeout,
        }
    }

    /// Load the issuer profile, or an empty one when no file is configured.
    pub fn load_issuer_profile(&self) -> Result<IssuerProfile, ConfigError> {
        let Some(path) = &self.issuer.profile_path else {
            return Ok(IssuerProfile::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })
    }
}

/// Load configuration from the optional file and the process environment,
/// then validate it.
pub fn load_config() -> Result<AgencyConfig, ConfigError> {
    let mut config = match std::env::var("IA_CONFIG_FILE") {
        Ok(path) if !path.is_empty() => AgencyConfig::from_file(path)?,
        _ => AgencyConfig::default(),
    };
    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

fn parse_duration(var: &'static str, value: String) -> Result<Duration, ConfigError> {
    humantime_serde::re::humantime::parse_duration(&value).map_err(|e| ConfigError::InvalidValue {
        var,
        reason: e.to_string(),
        value,
    })
}

fn remote_agent<F>(admin_url: String, lookup: &F, prefix: &str) -> RemoteAgentConfig
where
    F: Fn(&str) -> Option<String>,
{
    RemoteAgentConfig {
        admin_url,
        api_key: lookup(&format!("{prefix}_API_KEY")).filter(|k| !k.is_empty()),
        alias: lookup(&format!("{prefix}_ALIAS")).unwrap_or_else(|| prefix.to_lowercase()),
    }
}
