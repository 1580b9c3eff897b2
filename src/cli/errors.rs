//! CLI-specific error types
//!
//! Failures on one image are reported per image and do not stop the
//! batch; only the final `BatchFailed` reaches `main`.

use std::fmt;
use std::io;

use crate::config::ConfigError;
use crate::device::DeviceError;
use crate::store::StoreError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error on an input or output file
    IoError,
    /// Mutation succeeded but the kernel view was not refreshed
    RefreshFailed,
    /// At least one image failed
    BatchFailed,
    /// Error raised by the label store or device, by its own code
    Label(&'static str),
}

impl CliErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "NVL_CLI_CONFIG_ERROR",
            Self::IoError => "NVL_CLI_IO_ERROR",
            Self::RefreshFailed => "NVL_CLI_REFRESH_FAILED",
            Self::BatchFailed => "NVL_CLI_BATCH_FAILED",
            Self::Label(code) => code,
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn refresh_failed(device: &str, reason: &str) -> Self {
        Self::new(
            CliErrorCode::RefreshFailed,
            format!("{}: labels written but kernel view not refreshed: {}", device, reason),
        )
    }

    pub fn batch_failed(failed: usize, total: usize) -> Self {
        Self::new(
            CliErrorCode::BatchFailed,
            format!("{} of {} images failed", failed, total),
        )
    }

    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        Self::new(CliErrorCode::Label(e.code()), e.to_string())
    }
}

impl From<DeviceError> for CliError {
    fn from(e: DeviceError) -> Self {
        Self::new(CliErrorCode::Label(e.code()), e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
