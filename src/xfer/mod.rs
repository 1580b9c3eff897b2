//! Chunked config-area transfers
//!
//! Moves byte ranges between a session buffer and the device in
//! round trips of at most the device's max transfer size.
//!
//! # Invariants Enforced
//!
//! - Chunks of one transfer are issued in increasing offset order, one
//!   at a time, without overlap
//! - The first chunk that fails, reports firmware status or leaves a
//!   residual stops the transfer, and the error carries the bytes moved
//! - A [`WriteSession`] can only be built from a [`CompletedRead`] that
//!   covers its extent, so nothing is written over bytes never observed

mod errors;
mod session;

pub use errors::{XferError, XferErrorCode, XferResult};
pub use session::{CompletedRead, ConfigArea, Extent, ReadSession, WriteSession};
