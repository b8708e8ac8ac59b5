//! Correlator configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Correlator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelatorConfig {
    /// Wait used by [`crate::EventCorrelator::subscribe_and_wait_default`].
    #[serde(with = "humantime_serde")]
    pub default_timeout: Duration,

    /// How long a resolved id is remembered for duplicate detection.
    #[serde(with = "humantime_serde")]
    pub resolved_retention: Duration,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(60),
            resolved_retention: Duration::from_secs(300),
        }
    }
}
