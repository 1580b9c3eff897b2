//! Label storage manager
//!
//! Reads, validates and selects the current index block, lists labels,
//! and performs the destructive mutations of a label storage area.
//!
//! # Invariants Enforced
//!
//! - Exactly one current index block once any block validates
//! - Geometry errors are raised before any device write
//! - Mutations are refused while the DIMM is active unless forced
//! - A failed reinitialization reports whether an intact index remains
//! - The kernel-view refresh is reported apart from the mutation result

mod errors;
mod manager;
mod state;

pub use errors::{StoreError, StoreResult};
pub use manager::{
    IndexDump, InitOptions, LabelDump, LabelStore, MutationReport, RefreshOutcome, Validation,
};
pub use state::{select_current, IndexState};
