//! Label store error types
//!
//! Error codes:
//! - NVL_LABEL_GEOMETRY (ERROR severity, raised before any write)
//! - NVL_XFER_* (ERROR severity, see `xfer`)
//! - NVL_STORE_NO_VALID_INDEX (FATAL severity at this layer)
//! - NVL_STORE_DIMM_ACTIVE (ERROR severity)
//! - NVL_STORE_ALREADY_INITIALIZED (ERROR severity)
//! - NVL_STORE_BAD_LABEL_OFFSET (ERROR severity)
//! - NVL_STORE_PARTIAL_INIT (ERROR severity)

use thiserror::Error;

use crate::label::{GeometryError, IndexPosition, LabelSize};
use crate::observability::Severity;
use crate::xfer::XferError;

fn recovery_note(sibling_intact: &bool) -> &'static str {
    if *sibling_intact {
        "the other index block is intact and will be selected on the next read"
    } else {
        "no intact index block remains"
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Xfer(#[from] XferError),

    /// Neither index position decodes at any label size.
    #[error("{device}: no valid index block (display guess: {guessed} byte labels)")]
    NoValidIndex { device: String, guessed: LabelSize },

    #[error("{device}: regions active, refusing to modify labels")]
    DimmActive { device: String },

    #[error("{device}: labels already initialized")]
    AlreadyInitialized { device: String },

    /// The index places slot 0 somewhere other than after both blocks.
    #[error("{device}: index labeloff {labeloff:#x} does not match layout offset {expected:#x}")]
    BadLabelOffset {
        device: String,
        labeloff: u64,
        expected: u64,
    },

    /// Reinitialization stopped while writing one index block.
    #[error("{device}: reinitialization failed writing index block {position}: {source}; {}", recovery_note(.sibling_intact))]
    PartialInit {
        device: String,
        position: IndexPosition,
        sibling_intact: bool,
        #[source]
        source: XferError,
    },
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Geometry(e) => e.code(),
            StoreError::Xfer(e) => e.code().code(),
            StoreError::NoValidIndex { .. } => "NVL_STORE_NO_VALID_INDEX",
            StoreError::DimmActive { .. } => "NVL_STORE_DIMM_ACTIVE",
            StoreError::AlreadyInitialized { .. } => "NVL_STORE_ALREADY_INITIALIZED",
            StoreError::BadLabelOffset { .. } => "NVL_STORE_BAD_LABEL_OFFSET",
            StoreError::PartialInit { .. } => "NVL_STORE_PARTIAL_INIT",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            StoreError::NoValidIndex { .. } => Severity::Fatal,
            _ => Severity::Error,
        }
    }

    /// True for refusals a `force` flag would have bypassed.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            StoreError::DimmActive { .. } | StoreError::AlreadyInitialized { .. }
        )
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
