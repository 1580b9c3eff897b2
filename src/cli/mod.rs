//! CLI module for nvlabel
//!
//! A thin shell over the label store: every command takes one or more
//! label area images and prints one JSON line per image.

mod args;
mod commands;
mod errors;
mod io;

pub use args::{parse_size, Cli, Command, Targets};
pub use commands::{run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
