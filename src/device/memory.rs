//! In-memory DIMM
//!
//! Backs the label area with a `Vec<u8>`, records every command it
//! receives and can be told to fail specific commands. Used by the test
//! suites and for dry runs against a captured image.

use std::collections::HashMap;

use super::errors::{Command, DeviceError, DeviceResult};
use super::{Completion, ConfigSizeReply, ConfigTransport, DimmControl};

/// How an injected fault manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// The command fails at the transport level.
    Fail,
    /// The command completes with this nonzero firmware status and moves
    /// no data.
    Firmware(u32),
    /// The command completes leaving this many bytes untransferred.
    Residual(u32),
}

/// A fault armed against one command kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    pub command: Command,
    /// Zero-based invocation of `command` to hit; `None` hits every one.
    pub nth: Option<usize>,
    pub kind: FaultKind,
}

impl Fault {
    pub fn nth(command: Command, nth: usize, kind: FaultKind) -> Self {
        Self {
            command,
            nth: Some(nth),
            kind,
        }
    }

    pub fn always(command: Command, kind: FaultKind) -> Self {
        Self {
            command,
            nth: None,
            kind,
        }
    }
}

/// One command as observed by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandRecord {
    pub command: Command,
    pub offset: u32,
    pub len: u32,
}

/// A simulated DIMM with an in-memory label area.
#[derive(Debug, Clone)]
pub struct MemoryDimm {
    name: String,
    data: Vec<u8>,
    max_xfer: u32,
    active: bool,
    enabled: bool,
    log: Vec<CommandRecord>,
    counts: HashMap<Command, usize>,
    faults: Vec<Fault>,
}

impl MemoryDimm {
    /// Creates a DIMM with a zero-filled label area.
    pub fn new(name: impl Into<String>, config_size: u32, max_xfer: u32) -> Self {
        Self::from_image(name, vec![0u8; config_size as usize], max_xfer)
    }

    /// Creates a DIMM whose label area holds `image`.
    pub fn from_image(name: impl Into<String>, image: Vec<u8>, max_xfer: u32) -> Self {
        Self {
            name: name.into(),
            data: image,
            max_xfer,
            active: false,
            enabled: false,
            log: Vec::new(),
            counts: HashMap::new(),
            faults: Vec::new(),
        }
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Raw label area contents.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Arms a fault. Invocation counting starts from the DIMM's creation,
    /// not from the moment the fault is armed.
    pub fn inject(&mut self, fault: Fault) {
        self.faults.push(fault);
    }

    pub fn clear_faults(&mut self) {
        self.faults.clear();
    }

    /// Every command received so far, in order.
    pub fn commands(&self) -> &[CommandRecord] {
        &self.log
    }

    /// Commands of one kind received so far.
    pub fn commands_of(&self, command: Command) -> Vec<CommandRecord> {
        self.log
            .iter()
            .filter(|r| r.command == command)
            .copied()
            .collect()
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    fn record(&mut self, command: Command, offset: u32, len: u32) -> Option<FaultKind> {
        self.log.push(CommandRecord {
            command,
            offset,
            len,
        });
        let count = self.counts.entry(command).or_insert(0);
        let invocation = *count;
        *count += 1;

        self.faults
            .iter()
            .find(|f| f.command == command && f.nth.map_or(true, |n| n == invocation))
            .map(|f| f.kind)
    }

    fn injected_failure(&self, command: Command) -> DeviceError {
        DeviceError::CommandFailed {
            device: self.name.clone(),
            command,
            reason: "injected failure".into(),
        }
    }

    fn check_range(&self, command: Command, offset: u32, len: usize) -> DeviceResult<()> {
        let end = offset as u64 + len as u64;
        if end > self.data.len() as u64 {
            return Err(DeviceError::OutOfRange {
                device: self.name.clone(),
                command,
                offset: offset as u64,
                len: len as u64,
                config_size: self.data.len() as u64,
            });
        }
        Ok(())
    }

    /// Applies a fault to a data command, returning the completion and how
    /// many bytes should actually move.
    fn data_completion(
        &self,
        command: Command,
        fault: Option<FaultKind>,
        len: usize,
    ) -> DeviceResult<(Completion, usize)> {
        match fault {
            None => Ok((Completion::ok(), len)),
            Some(FaultKind::Fail) => Err(self.injected_failure(command)),
            Some(FaultKind::Firmware(status)) => Ok((
                Completion {
                    status,
                    residual: 0,
                },
                0,
            )),
            Some(FaultKind::Residual(residual)) => {
                let residual = (residual as usize).min(len);
                Ok((
                    Completion {
                        status: 0,
                        residual: residual as u32,
                    },
                    len - residual,
                ))
            }
        }
    }
}

impl ConfigTransport for MemoryDimm {
    fn get_config_size(&mut self) -> DeviceResult<ConfigSizeReply> {
        let fault = self.record(Command::GetConfigSize, 0, 0);
        let status = match fault {
            Some(FaultKind::Fail) => return Err(self.injected_failure(Command::GetConfigSize)),
            Some(FaultKind::Firmware(status)) => status,
            _ => 0,
        };
        Ok(ConfigSizeReply {
            status,
            config_size: self.data.len() as u32,
            max_xfer: self.max_xfer,
        })
    }

    fn get_config_data(&mut self, offset: u32, buf: &mut [u8]) -> DeviceResult<Completion> {
        let fault = self.record(Command::GetConfigData, offset, buf.len() as u32);
        self.check_range(Command::GetConfigData, offset, buf.len())?;
        let (completion, moved) = self.data_completion(Command::GetConfigData, fault, buf.len())?;

        let start = offset as usize;
        buf[..moved].copy_from_slice(&self.data[start..start + moved]);
        Ok(completion)
    }

    fn set_config_data(&mut self, offset: u32, data: &[u8]) -> DeviceResult<Completion> {
        let fault = self.record(Command::SetConfigData, offset, data.len() as u32);
        self.check_range(Command::SetConfigData, offset, data.len())?;
        let (completion, moved) = self.data_completion(Command::SetConfigData, fault, data.len())?;

        let start = offset as usize;
        self.data[start..start + moved].copy_from_slice(&data[..moved]);
        Ok(completion)
    }
}

impl DimmControl for MemoryDimm {
    fn devname(&self) -> &str {
        &self.name
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn disable(&mut self) -> DeviceResult<()> {
        if self.record(Command::Disable, 0, 0).is_some() {
            return Err(self.injected_failure(Command::Disable));
        }
        self.enabled = false;
        Ok(())
    }

    fn enable(&mut self) -> DeviceResult<()> {
        if self.record(Command::Enable, 0, 0).is_some() {
            return Err(self.injected_failure(Command::Enable));
        }
        self.enabled = true;
        Ok(())
    }
}
