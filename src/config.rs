//! Label tool configuration
//!
//! JSON on disk. Every field is optional:
//!
//! ```json
//! {
//!   "max_xfer": 4096,
//!   "label_version": "1.1",
//!   "log_level": "warn"
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::label::LabelVersion;
use crate::observability::Severity;

/// Upper bound on the per-round-trip transfer size
pub const MAX_XFER_LIMIT: u32 = 1 << 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        "NVL_CONFIG_INVALID"
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabelConfig {
    /// Chunk size for image-file devices (default 4096)
    #[serde(default = "default_max_xfer")]
    pub max_xfer: u32,

    /// Format written by `init` when none is given (default "1.1")
    #[serde(default = "default_label_version")]
    pub label_version: String,

    /// Minimum log severity (default "warn")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_max_xfer() -> u32 {
    4096
}
fn default_label_version() -> String {
    "1.1".to_string()
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            max_xfer: default_max_xfer(),
            label_version: default_label_version(),
            log_level: default_log_level(),
        }
    }
}

impl LabelConfig {
    /// Load and validate configuration from file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: LabelConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_xfer == 0 {
            return Err(ConfigError::Invalid("max_xfer must be > 0".into()));
        }
        if self.max_xfer > MAX_XFER_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "max_xfer must be <= {}",
                MAX_XFER_LIMIT
            )));
        }
        self.version()?;
        self.severity()?;
        Ok(())
    }

    /// Parsed `label_version`.
    pub fn version(&self) -> ConfigResult<LabelVersion> {
        self.label_version
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("label_version: {}", e)))
    }

    /// Parsed `log_level`.
    pub fn severity(&self) -> ConfigResult<Severity> {
        self.log_level.parse().map_err(ConfigError::Invalid)
    }
}
