//! Device command error types
//!
//! A `DeviceError` means the command never completed at the transport
//! level. Firmware-reported failures come back inside a successful
//! [`Completion`](super::Completion) instead.

use std::fmt;

use thiserror::Error;

/// Device commands this crate issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    GetConfigSize,
    GetConfigData,
    SetConfigData,
    Disable,
    Enable,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::GetConfigSize => "get_config_size",
            Command::GetConfigData => "get_config_data",
            Command::SetConfigData => "set_config_data",
            Command::Disable => "disable",
            Command::Enable => "enable",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transport-level failure of a device command.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("{device}: {command} failed: {reason}")]
    CommandFailed {
        device: String,
        command: Command,
        reason: String,
    },

    #[error("{device}: {command} at offset {offset:#x} length {len:#x} outside label area of {config_size:#x} bytes")]
    OutOfRange {
        device: String,
        command: Command,
        offset: u64,
        len: u64,
        config_size: u64,
    },

    #[error("{device}: {command} I/O error: {source}")]
    Io {
        device: String,
        command: Command,
        #[source]
        source: std::io::Error,
    },
}

impl DeviceError {
    /// Stable error code string.
    pub fn code(&self) -> &'static str {
        match self {
            DeviceError::CommandFailed { .. } => "NVL_DEVICE_COMMAND_FAILED",
            DeviceError::OutOfRange { .. } => "NVL_DEVICE_OUT_OF_RANGE",
            DeviceError::Io { .. } => "NVL_DEVICE_IO",
        }
    }

    /// The command that failed.
    pub fn command(&self) -> Command {
        match self {
            DeviceError::CommandFailed { command, .. }
            | DeviceError::OutOfRange { command, .. }
            | DeviceError::Io { command, .. } => *command,
        }
    }
}

/// Result type for device commands
pub type DeviceResult<T> = Result<T, DeviceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_device_and_command() {
        let err = DeviceError::CommandFailed {
            device: "nmem0".into(),
            command: Command::SetConfigData,
            reason: "ENXIO".into(),
        };
        assert_eq!(err.to_string(), "nmem0: set_config_data failed: ENXIO");
        assert_eq!(err.code(), "NVL_DEVICE_COMMAND_FAILED");
        assert_eq!(err.command(), Command::SetConfigData);
    }

    #[test]
    fn test_io_error_has_source() {
        use std::error::Error;

        let err = DeviceError::Io {
            device: "img".into(),
            command: Command::GetConfigData,
            source: std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short read"),
        };
        assert!(err.source().is_some());
        assert_eq!(err.code(), "NVL_DEVICE_IO");
    }
}
