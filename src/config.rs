use crate::core::payment::PaymentMethod;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// What to do with payments that exceed the debt between two attendees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverpaymentPolicy {
    /// Treat the excess as credit that the next settlement resolves.
    #[default]
    Carry,
    /// Carry it forward as well, but report it for manual reconciliation.
    Flag,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Engine configuration.
///
/// Every field has a default, so an empty JSON object is a valid config.
///
/// ```
/// use settlement_engine::config::{EngineConfig, OverpaymentPolicy};
///
/// let config: EngineConfig = serde_json::from_str(r#"{ "overpayment_policy": "flag" }"#).unwrap();
/// assert_eq!(config.overpayment_policy, OverpaymentPolicy::Flag);
/// assert_eq!(config.lock_timeout_ms, 5_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long a settlement request waits for another run on the same group.
    pub lock_timeout_ms: u64,
    /// Upper bound on one execution run; `None` disables the deadline.
    pub execution_timeout_ms: Option<u64>,
    pub overpayment_policy: OverpaymentPolicy,
    /// Method recorded on payments created by the executor.
    pub payment_method: PaymentMethod,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 5_000,
            execution_timeout_ms: Some(30_000),
            overpayment_policy: OverpaymentPolicy::Carry,
            payment_method: PaymentMethod::Settlement,
        }
    }
}

impl EngineConfig {
    /// Load a config from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn execution_timeout(&self) -> Option<Duration> {
        self.execution_timeout_ms.map(Duration::from_millis)
    }
}
