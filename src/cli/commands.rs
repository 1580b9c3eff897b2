//! CLI command implementations
//!
//! Each image is opened, operated on and reported independently. A
//! failing image is reported and the batch moves on.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use serde_json::{json, Value};

use crate::config::LabelConfig;
use crate::device::FileDimm;
use crate::label::LabelVersion;
use crate::observability::{log_event_with_fields, Event, Logger, Severity};
use crate::store::{InitOptions, LabelStore, MutationReport, RefreshOutcome};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};

/// Parse arguments, set up logging and configuration, run the command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    let config = load_config(&cli)?;
    run_command(cli.command, &config)
}

fn load_config(cli: &Cli) -> CliResult<LabelConfig> {
    let config = match &cli.config {
        Some(path) => LabelConfig::load(path)?,
        None => LabelConfig::default(),
    };

    Logger::set_min_level(config.severity()?);
    Logger::init_from_env();
    match cli.verbose {
        0 => {}
        1 => Logger::set_min_level(Logger::min_level().min(Severity::Info)),
        _ => Logger::set_min_level(Severity::Trace),
    }

    if let Some(path) = &cli.config {
        log_event_with_fields(
            Event::ConfigLoaded,
            &[
                ("label_version", &config.label_version),
                ("max_xfer", &config.max_xfer.to_string()),
                ("path", &path.display().to_string()),
            ],
        );
    }
    Ok(config)
}

/// Runs `cmd` against every target image.
///
/// # Errors
///
/// `BatchFailed` when any image failed; each failure has already been
/// reported on stdout.
pub fn run_command(cmd: Command, config: &LabelConfig) -> CliResult<()> {
    let images = cmd.targets().images.clone();

    // Shared inputs are prepared once, before any image is touched
    let input = match &cmd {
        Command::Write { input, .. } => Some(fs::read(input)?),
        _ => None,
    };
    if let Command::Read { output, .. } = &cmd {
        File::create(output)?;
    }

    let mut failed = 0;
    for image in &images {
        let device = image.display().to_string();
        let result = run_one(&cmd, image, config, input.as_deref());

        let reported = match result {
            Ok(data) => write_response(&device, data),
            Err(e) => {
                failed += 1;
                write_error(&device, e.code_str(), e.message())
            }
        };
        reported?;
    }

    if failed > 0 {
        return Err(CliError::batch_failed(failed, images.len()));
    }
    Ok(())
}

fn open(image: &Path, config: &LabelConfig) -> CliResult<LabelStore<FileDimm>> {
    let dimm = FileDimm::open(image, config.max_xfer)?;
    Ok(LabelStore::open(dimm)?)
}

fn mutation_result(report: MutationReport) -> CliResult<Value> {
    if let RefreshOutcome::Failed { reason } = &report.refresh {
        return Err(CliError::refresh_failed(&report.device, reason));
    }
    Ok(serde_json::to_value(&report)?)
}

fn run_one(cmd: &Command, image: &Path, config: &LabelConfig, input: Option<&[u8]>) -> CliResult<Value> {
    match cmd {
        Command::ReadIndex { .. } => {
            let mut store = open(image, config)?;
            let (position, index) = store.read_current_index()?;
            let free_slots = index.free_slot_count();
            Ok(json!({
                "position": position,
                "index": index,
                "free_slots": free_slots,
            }))
        }

        Command::Dump { .. } => {
            let mut store = open(image, config)?;
            Ok(serde_json::to_value(store.dump()?)?)
        }

        Command::Check { .. } => {
            let mut store = open(image, config)?;
            let nslot = store.check()?;
            Ok(json!({ "nslot": nslot }))
        }

        Command::Init {
            label_version,
            nslot,
            force,
            ..
        } => {
            let version: LabelVersion = match label_version {
                Some(v) => *v,
                None => config.version()?,
            };
            let mut store = open(image, config)?;
            let report = store.reinitialize(InitOptions {
                version,
                nslot_hint: *nslot,
                force: *force,
            })?;
            mutation_result(report)
        }

        Command::Zero {
            offset, len, force, ..
        } => {
            let mut store = open(image, config)?;
            mutation_result(store.zero_range(*offset, *len, *force)?)
        }

        Command::Read {
            offset, len, output, ..
        } => {
            let mut store = open(image, config)?;
            let bytes = store.read_range(*offset, *len)?;
            let mut file = OpenOptions::new().append(true).open(output)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
            Ok(json!({ "offset": offset, "bytes": bytes.len() }))
        }

        Command::Write { offset, force, .. } => {
            let data = input.unwrap_or_default();
            let mut store = open(image, config)?;
            mutation_result(store.write_range(*offset, data, *force)?)
        }

        Command::CreateImage { size, .. } => {
            let dimm = FileDimm::create(image, *size, config.max_xfer)?;
            let store = LabelStore::open(dimm)?;
            Ok(json!({ "config_size": store.area().config_size() }))
        }
    }
}
