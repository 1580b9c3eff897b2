//! Transfer error types
//!
//! Error codes:
//! - NVL_XFER_AREA_QUERY (ERROR severity)
//! - NVL_XFER_BAD_EXTENT (ERROR severity)
//! - NVL_XFER_UNCHAINED_WRITE (ERROR severity)
//! - NVL_XFER_TRANSPORT_FAILED (ERROR severity)
//! - NVL_XFER_FIRMWARE_STATUS (ERROR severity)
//! - NVL_XFER_SHORT_TRANSFER (ERROR severity)
//!
//! Every transfer error reports how many bytes of the logical transfer
//! completed before it stopped.

use std::fmt;

use crate::device::DeviceError;
use crate::observability::Severity;

/// Transfer error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XferErrorCode {
    /// "get config size" failed or reported an unusable area
    NvlXferAreaQuery,
    /// Requested extent lies outside the label area
    NvlXferBadExtent,
    /// Write session not backed by a read of its extent
    NvlXferUnchainedWrite,
    /// A round trip failed at the transport level
    NvlXferTransportFailed,
    /// A round trip completed with nonzero firmware status
    NvlXferFirmwareStatus,
    /// A round trip completed with untransferred bytes
    NvlXferShortTransfer,
}

impl XferErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            XferErrorCode::NvlXferAreaQuery => "NVL_XFER_AREA_QUERY",
            XferErrorCode::NvlXferBadExtent => "NVL_XFER_BAD_EXTENT",
            XferErrorCode::NvlXferUnchainedWrite => "NVL_XFER_UNCHAINED_WRITE",
            XferErrorCode::NvlXferTransportFailed => "NVL_XFER_TRANSPORT_FAILED",
            XferErrorCode::NvlXferFirmwareStatus => "NVL_XFER_FIRMWARE_STATUS",
            XferErrorCode::NvlXferShortTransfer => "NVL_XFER_SHORT_TRANSFER",
        }
    }

    /// All transfer errors fail the operation; none is fatal on its own.
    pub fn severity(&self) -> Severity {
        Severity::Error
    }

    /// Whether the error was raised before any device command was issued.
    pub fn is_pre_io(&self) -> bool {
        matches!(
            self,
            XferErrorCode::NvlXferBadExtent | XferErrorCode::NvlXferUnchainedWrite
        )
    }
}

impl fmt::Display for XferErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Transfer error with partial progress
#[derive(Debug)]
pub struct XferError {
    code: XferErrorCode,
    message: String,
    details: Option<String>,
    /// Bytes of the logical transfer moved before the failure
    bytes_moved: u64,
    source: Option<DeviceError>,
}

impl XferError {
    pub fn area_query(message: impl Into<String>, source: Option<DeviceError>) -> Self {
        Self {
            code: XferErrorCode::NvlXferAreaQuery,
            message: message.into(),
            details: None,
            bytes_moved: 0,
            source,
        }
    }

    pub fn bad_extent(offset: u64, len: u64, config_size: u64) -> Self {
        Self {
            code: XferErrorCode::NvlXferBadExtent,
            message: "extent outside label area".into(),
            details: Some(format!(
                "offset: {:#x}, len: {:#x}, config_size: {:#x}",
                offset, len, config_size
            )),
            bytes_moved: 0,
            source: None,
        }
    }

    /// A write extent the chained read did not cover.
    pub fn unchained(offset: u64, len: u64, read_offset: u64, read_len: u64) -> Self {
        Self {
            code: XferErrorCode::NvlXferUnchainedWrite,
            message: "write extent not covered by a completed read".into(),
            details: Some(format!(
                "write: {:#x}+{:#x}, read: {:#x}+{:#x}",
                offset, len, read_offset, read_len
            )),
            bytes_moved: 0,
            source: None,
        }
    }

    pub fn transport_failed(chunk_offset: u64, chunk_len: u64, bytes_moved: u64, source: DeviceError) -> Self {
        Self {
            code: XferErrorCode::NvlXferTransportFailed,
            message: "round trip failed".into(),
            details: Some(format!("chunk: {:#x}+{:#x}", chunk_offset, chunk_len)),
            bytes_moved,
            source: Some(source),
        }
    }

    pub fn firmware_status(chunk_offset: u64, chunk_len: u64, status: u32, bytes_moved: u64) -> Self {
        Self {
            code: XferErrorCode::NvlXferFirmwareStatus,
            message: format!("firmware status {:#x}", status),
            details: Some(format!("chunk: {:#x}+{:#x}", chunk_offset, chunk_len)),
            bytes_moved,
            source: None,
        }
    }

    pub fn short_transfer(chunk_offset: u64, chunk_len: u64, residual: u32, bytes_moved: u64) -> Self {
        Self {
            code: XferErrorCode::NvlXferShortTransfer,
            message: format!("{} bytes not transferred", residual),
            details: Some(format!("chunk: {:#x}+{:#x}", chunk_offset, chunk_len)),
            bytes_moved,
            source: None,
        }
    }

    pub fn code(&self) -> XferErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Bytes of the logical transfer that completed before the failure.
    pub fn bytes_moved(&self) -> u64 {
        self.bytes_moved
    }

    /// The device error behind a transport failure, if any.
    pub fn device_error(&self) -> Option<&DeviceError> {
        self.source.as_ref()
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for XferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity(), self.code.code(), self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        if !self.code.is_pre_io() {
            write!(f, " after {} bytes", self.bytes_moved)?;
        }
        Ok(())
    }
}

impl std::error::Error for XferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for transfer operations
pub type XferResult<T> = Result<T, XferError>;
