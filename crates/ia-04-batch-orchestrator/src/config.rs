//! Orchestrator configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// How long to wait for a credential exchange to reach a terminal state.
    #[serde(with = "humantime_serde")]
    pub cred_ex_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cred_ex_timeout: Duration::from_secs(60),
        }
    }
}
