//! Crash testing framework for nvlabel
//!
//! Provides:
//! - Subprocess runs of the `nvlabel` binary with a crash point armed
//! - Label area image setup
//! - Post-crash validation of the image

pub mod harness;
pub mod scenarios;
pub mod utils;

pub use harness::*;
pub use utils::*;
