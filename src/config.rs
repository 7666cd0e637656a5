//! Startup configuration: loaded once, read-only afterwards.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "conf.yaml";

const DEFAULT_GRACE_SECS: u64 = 5;

fn default_grace_period() -> u64 {
    DEFAULT_GRACE_SECS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Endpoint delivering `{"data": <number>}` records.
    pub url: String,
    /// Report period in whole seconds.
    pub period: u64,
    /// Moving-average window size.
    pub window: usize,
    /// Upper bound in seconds on the draining phase at shutdown.
    #[serde(default = "default_grace_period")]
    pub grace_period: u64,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Parse without validating; callers apply overrides, then `validate`.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.url).map_err(|e| ConfigError::Invalid {
            field: "url",
            reason: e.to_string(),
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Invalid {
                field: "url",
                reason: format!("unsupported scheme {}", url.scheme()),
            });
        }
        if self.period == 0 {
            return Err(ConfigError::Invalid {
                field: "period",
                reason: "must be at least 1 second".to_string(),
            });
        }
        if self.window == 0 {
            return Err(ConfigError::Invalid {
                field: "window",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn report_period(&self) -> Duration {
        Duration::from_secs(self.period)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_period)
    }
}
