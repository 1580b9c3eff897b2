//! CLI argument definitions using clap
//!
//! Commands:
//! - nvlabel read-index --image <path>...
//! - nvlabel dump --image <path>...
//! - nvlabel check --image <path>...
//! - nvlabel init --image <path>... [--label-version] [--nslot] [--force]
//! - nvlabel zero --image <path>... [--offset] [--len] [--force]
//! - nvlabel read --image <path>... --output <path> [--offset] [--len]
//! - nvlabel write --image <path>... --input <path> [--offset] [--force]
//! - nvlabel create-image --image <path>... --size <bytes>

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::label::LabelVersion;

/// nvlabel - NVDIMM namespace label storage tool
#[derive(Parser, Debug)]
#[command(name = "nvlabel")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log more (-v info, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Label area images to operate on, each processed independently.
#[derive(Args, Debug, Clone)]
pub struct Targets {
    /// Label area image file (repeatable)
    #[arg(long = "image", required = true)]
    pub images: Vec<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the current index block
    ReadIndex {
        #[command(flatten)]
        targets: Targets,
    },

    /// Print both index blocks and all occupied labels
    Dump {
        #[command(flatten)]
        targets: Targets,
    },

    /// Validate the index blocks
    Check {
        #[command(flatten)]
        targets: Targets,
    },

    /// Rewrite both index blocks with an empty label set
    Init {
        #[command(flatten)]
        targets: Targets,

        /// Label format, 1.1 or 1.2 (default from config)
        #[arg(long, value_parser = parse_version)]
        label_version: Option<LabelVersion>,

        /// Slot count below the derived maximum
        #[arg(long)]
        nslot: Option<u32>,

        /// Overwrite valid labels and ignore active regions
        #[arg(long)]
        force: bool,
    },

    /// Zero-fill the label area or part of it
    Zero {
        #[command(flatten)]
        targets: Targets,

        #[arg(long, default_value_t = 0, value_parser = parse_size)]
        offset: u32,

        /// Bytes to zero, 0 with offset 0 for the whole area
        #[arg(long, default_value_t = 0, value_parser = parse_size)]
        len: u32,

        /// Ignore active regions
        #[arg(long)]
        force: bool,
    },

    /// Copy raw label area bytes to a file
    Read {
        #[command(flatten)]
        targets: Targets,

        #[arg(long, default_value_t = 0, value_parser = parse_size)]
        offset: u32,

        /// Bytes to read, 0 with offset 0 for the whole area
        #[arg(long, default_value_t = 0, value_parser = parse_size)]
        len: u32,

        /// Output file; images are appended in order
        #[arg(long)]
        output: PathBuf,
    },

    /// Write a file's bytes into the label area
    Write {
        #[command(flatten)]
        targets: Targets,

        #[arg(long)]
        input: PathBuf,

        #[arg(long, default_value_t = 0, value_parser = parse_size)]
        offset: u32,

        /// Ignore active regions
        #[arg(long)]
        force: bool,
    },

    /// Create zero-filled label area images
    CreateImage {
        #[command(flatten)]
        targets: Targets,

        /// Image size, e.g. 131072 or 128K
        #[arg(long, value_parser = parse_size)]
        size: u32,
    },
}

impl Command {
    pub fn targets(&self) -> &Targets {
        match self {
            Command::ReadIndex { targets }
            | Command::Dump { targets }
            | Command::Check { targets }
            | Command::Init { targets, .. }
            | Command::Zero { targets, .. }
            | Command::Read { targets, .. }
            | Command::Write { targets, .. }
            | Command::CreateImage { targets, .. } => targets,
        }
    }
}

fn parse_version(s: &str) -> Result<LabelVersion, String> {
    s.parse().map_err(|e: crate::label::GeometryError| e.to_string())
}

/// Parses a byte count with an optional K or M suffix, or a 0x prefix.
pub fn parse_size(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let (digits, shift) = match s.as_bytes().last() {
        Some(b'K' | b'k') => (&s[..s.len() - 1], 10),
        Some(b'M' | b'm') => (&s[..s.len() - 1], 20),
        _ => (s, 0),
    };

    let value = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => digits.parse::<u64>(),
    }
    .map_err(|e| format!("invalid size '{}': {}", s, e))?;

    let bytes = value << shift;
    if bytes >> shift != value {
        return Err(format!("size '{}' out of range", s));
    }
    u32::try_from(bytes).map_err(|_| format!("size '{}' exceeds 4GiB", s))
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
