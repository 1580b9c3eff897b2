//! Crash scenarios, one module per mutation

pub mod init;
pub mod write;
