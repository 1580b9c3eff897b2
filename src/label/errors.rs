//! Label codec error types
//!
//! Error codes:
//! - NVL_LABEL_DECODE (ERROR severity, recovered by the index-selection fallback)
//! - NVL_LABEL_GEOMETRY (ERROR severity, rejected before any write)

use thiserror::Error;

use super::index::IndexPosition;

/// Reasons an index block fails structural validation.
///
/// These never reach a caller directly while a fallback exists; the
/// storage manager tries the sibling position and the other label-size
/// candidate first.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("index block {position} truncated: {actual} bytes, need {expected}")]
    Truncated {
        position: IndexPosition,
        expected: usize,
        actual: usize,
    },

    #[error("index block {position} signature invalid")]
    BadSignature { position: IndexPosition },

    #[error("index block {position} label size {declared} does not match {assumed}")]
    LabelSizeMismatch {
        position: IndexPosition,
        declared: u32,
        assumed: u32,
    },

    #[error("index block {position} checksum invalid: stored {stored:#018x}, computed {computed:#018x}")]
    ChecksumMismatch {
        position: IndexPosition,
        stored: u64,
        computed: u64,
    },

    #[error("index block {position} sequence {seq:#x} invalid")]
    InvalidSequence { position: IndexPosition, seq: u32 },

    #[error("index block {position} myoff {actual:#x} invalid, expected {expected:#x}")]
    BadSelfOffset {
        position: IndexPosition,
        actual: u64,
        expected: u64,
    },

    #[error("index block {position} otheroff {actual:#x} invalid, expected {expected:#x}")]
    BadSiblingOffset {
        position: IndexPosition,
        actual: u64,
        expected: u64,
    },

    #[error("index block {position} mysize {actual:#x} outside [{min:#x}, {max:#x}]")]
    BadSize {
        position: IndexPosition,
        actual: u64,
        min: u64,
        max: u64,
    },

    #[error("index block {position} nslot {nslot} does not fit config size {config_size:#x}")]
    SlotOverflow {
        position: IndexPosition,
        nslot: u32,
        config_size: u64,
    },
}

impl DecodeError {
    /// Stable error code string.
    pub fn code(&self) -> &'static str {
        "NVL_LABEL_DECODE"
    }
}

/// A label format or slot count that cannot fit the label storage area.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("label area ({config_size} bytes) too small to host {label_size}-byte labels")]
    AreaTooSmall { config_size: u64, label_size: u32 },

    #[error("requested {requested} label slots, label area holds at most {max}")]
    TooManySlots { requested: u32, max: u32 },

    #[error("requested {requested} label slots, at least 2 are required")]
    TooFewSlots { requested: u32 },

    #[error("unsupported label version {0}")]
    UnsupportedVersion(String),
}

impl GeometryError {
    /// Stable error code string.
    pub fn code(&self) -> &'static str {
        "NVL_LABEL_GEOMETRY"
    }
}

/// Result type for index codec operations
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Result type for geometry derivation
pub type GeometryResult<T> = Result<T, GeometryError>;
