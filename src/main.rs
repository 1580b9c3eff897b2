//! nvlabel CLI entry point
//!
//! Parses arguments and dispatches through `cli::run`, prints the error
//! to stderr and exits non-zero on failure. All logic lives in the CLI
//! module.

use nvlabel::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
