//! Label storage manager
//!
//! Drives chunked transfers and the label codecs through the
//! read / validate / select-current protocol and the destructive
//! mutations (reinitialize, zero-fill, raw extent writes).
//!
//! No locking: callers serialize access to one DIMM themselves. The
//! activity check before a mutation is a one-time gate.

use serde::Serialize;

use crate::crash_point::{maybe_crash, points};
use crate::device::Dimm;
use crate::label::{
    decode_slots, encode_with_geometry, guess_label_size, Geometry, IndexBlock, IndexHeader,
    IndexPosition, Label, LabelSize, LabelVersion, Seq,
};
use crate::observability::{log_event_with_fields, Event};
use crate::xfer::{CompletedRead, ConfigArea, ReadSession, WriteSession, XferError};

use super::errors::{StoreError, StoreResult};
use super::state::{select_current, IndexState};

/// Sequence numbers written by reinitialization, position 0 first.
const INIT_SEQ: [u32; 2] = [3, 2];

/// Result of validating the index blocks.
#[derive(Debug, Clone)]
pub struct Validation {
    /// Layout for the accepted label size
    pub geometry: Geometry,
    /// Decoded blocks, by position
    pub blocks: [Option<IndexBlock>; 2],
    pub state: IndexState,
    pub current: IndexPosition,
}

impl Validation {
    pub fn current_block(&self) -> Option<&IndexBlock> {
        self.blocks[self.current.as_index()].as_ref()
    }
}

/// Options for [`LabelStore::reinitialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitOptions {
    pub version: LabelVersion,
    /// Lowers the slot count below the derived maximum
    pub nslot_hint: Option<u32>,
    /// Bypass the activity and already-initialized checks
    pub force: bool,
}

impl InitOptions {
    pub fn new(version: LabelVersion) -> Self {
        Self {
            version,
            nslot_hint: None,
            force: false,
        }
    }
}

/// Whether the kernel's cached label view was refreshed after a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// The DIMM was disabled; nothing cached
    NotNeeded,
    /// Disabled and re-enabled
    Reloaded,
    Failed { reason: String },
}

/// Outcome of a successful mutation, with the refresh tracked separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationReport {
    pub device: String,
    pub offset: u32,
    pub bytes_written: u64,
    pub refresh: RefreshOutcome,
}

impl MutationReport {
    pub fn refresh_failed(&self) -> bool {
        matches!(self.refresh, RefreshOutcome::Failed { .. })
    }
}

/// Raw and decoded view of one index position, for display.
#[derive(Debug, Clone, Serialize)]
pub struct IndexDump {
    pub position: IndexPosition,
    pub valid: bool,
    pub header: Option<IndexHeader>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_slots: Option<u32>,
}

/// Everything known about a label area, for display.
#[derive(Debug, Clone, Serialize)]
pub struct LabelDump {
    pub device: String,
    pub config_size: u32,
    pub max_xfer: u32,
    pub label_size: LabelSize,
    /// True when `label_size` comes from the display heuristic
    pub label_size_guessed: bool,
    pub state: IndexState,
    pub current: Option<IndexPosition>,
    pub indexes: Vec<IndexDump>,
    pub labels: Vec<Label>,
}

/// Label storage for one DIMM.
pub struct LabelStore<D: Dimm> {
    dimm: D,
    area: ConfigArea,
}

impl<D: Dimm> LabelStore<D> {
    /// Queries the label area size and transfer limit.
    pub fn open(mut dimm: D) -> StoreResult<Self> {
        let area = ConfigArea::query(&mut dimm)?;
        Ok(Self { dimm, area })
    }

    pub fn dimm(&self) -> &D {
        &self.dimm
    }

    pub fn dimm_mut(&mut self) -> &mut D {
        &mut self.dimm
    }

    pub fn into_inner(self) -> D {
        self.dimm
    }

    pub fn area(&self) -> &ConfigArea {
        &self.area
    }

    fn devname(&self) -> String {
        self.dimm.devname().to_string()
    }

    /// Bytes covering both index blocks at every derivable label size.
    ///
    /// The smallest label size has the most slots and so the largest
    /// index blocks.
    fn index_extent_len(&self) -> u32 {
        LabelSize::CANDIDATES
            .iter()
            .filter_map(|size| Geometry::derive(self.area.config_size() as u64, *size).ok())
            .map(|g| 2 * g.index_size)
            .max()
            .map(|len| len.min(self.area.config_size() as u64) as u32)
            .unwrap_or(self.area.config_size())
    }

    fn read_index_area(&mut self) -> StoreResult<CompletedRead> {
        let len = self.index_extent_len();
        let read = ReadSession::new(&self.area, 0, len)?.submit(&mut self.dimm)?;
        Ok(read)
    }

    /// Decodes both positions under one candidate geometry.
    fn decode_at(&self, read: &CompletedRead, geometry: &Geometry) -> [Option<IndexBlock>; 2] {
        let device = self.devname();
        IndexPosition::BOTH.map(|position| {
            let offset = geometry.index_offset(position);
            let bytes = read
                .get_data(offset, geometry.index_size as usize)
                .unwrap_or_default();

            match IndexBlock::decode(bytes, position, geometry) {
                Ok(block) => {
                    log_event_with_fields(
                        Event::IndexAccepted,
                        &[
                            ("device", &device),
                            ("label_size", &geometry.label_size.to_string()),
                            ("position", &position.to_string()),
                            ("seq", &block.sequence().to_string()),
                        ],
                    );
                    Some(block)
                }
                Err(e) => {
                    log_event_with_fields(
                        Event::IndexRejected,
                        &[
                            ("device", &device),
                            ("label_size", &geometry.label_size.to_string()),
                            ("position", &position.to_string()),
                            ("reason", &e.to_string()),
                        ],
                    );
                    None
                }
            }
        })
    }

    /// Tries each label size in order; the first at which any position
    /// decodes wins.
    fn find_valid(&self, read: &CompletedRead) -> Option<Validation> {
        for size in LabelSize::CANDIDATES {
            let Ok(geometry) = Geometry::derive(self.area.config_size() as u64, size) else {
                continue;
            };
            let blocks = self.decode_at(read, &geometry);
            if let Some(current) = select_current(&blocks) {
                let state = IndexState::of(&blocks);
                return Some(Validation {
                    geometry,
                    blocks,
                    state,
                    current,
                });
            }
        }
        None
    }

    /// The error for a read path that found nothing to select.
    fn no_valid_index(&self, read: &CompletedRead) -> StoreError {
        let guessed = self.guess_from_headers(read);
        log_event_with_fields(
            Event::IndexInvalid,
            &[("device", &self.devname()), ("guessed_label_size", &guessed.to_string())],
        );
        StoreError::NoValidIndex {
            device: self.devname(),
            guessed,
        }
    }

    /// Raw headers at both positions, located with `label_size`'s layout.
    fn peek_headers(&self, read: &CompletedRead, label_size: LabelSize) -> [Option<IndexHeader>; 2] {
        let index_size = Geometry::derive(self.area.config_size() as u64, label_size)
            .map(|g| g.index_size)
            .ok();
        IndexPosition::BOTH.map(|position| {
            let offset = match (position, index_size) {
                (IndexPosition::First, _) => 0,
                (IndexPosition::Second, Some(size)) => size,
                (IndexPosition::Second, None) => return None,
            };
            read.get_data(offset, read.data().len().saturating_sub(offset as usize))
                .and_then(IndexHeader::peek)
        })
    }

    /// Display-only label size guess. Never used to gate a write.
    fn guess_from_headers(&self, read: &CompletedRead) -> LabelSize {
        let headers = self.peek_headers(read, LabelSize::Small);
        let guessed = guess_label_size(headers.iter().flatten());
        log_event_with_fields(
            Event::LabelSizeGuessed,
            &[("device", &self.devname()), ("label_size", &guessed.to_string())],
        );
        guessed
    }

    /// Reads and validates both index blocks.
    pub fn validate(&mut self) -> StoreResult<Validation> {
        let read = self.read_index_area()?;
        let validation = self.find_valid(&read).ok_or_else(|| self.no_valid_index(&read))?;
        self.log_selected(&validation);
        Ok(validation)
    }

    fn log_selected(&self, validation: &Validation) {
        let seq = validation
            .current_block()
            .map(|b| b.sequence().to_string())
            .unwrap_or_default();
        log_event_with_fields(
            Event::IndexSelected,
            &[
                ("device", &self.devname()),
                ("label_size", &validation.geometry.label_size.to_string()),
                ("num_valid", &validation.state.num_valid().to_string()),
                ("position", &validation.current.to_string()),
                ("seq", &seq),
            ],
        );
    }

    /// Validates only. Returns the slot count of the accepted layout.
    pub fn check(&mut self) -> StoreResult<u32> {
        Ok(self.validate()?.geometry.nslot)
    }

    /// The authoritative index block and its position.
    pub fn read_current_index(&mut self) -> StoreResult<(IndexPosition, IndexBlock)> {
        let validation = self.validate()?;
        let current = validation.current;
        let [first, second] = validation.blocks;
        let block = match current {
            IndexPosition::First => first,
            IndexPosition::Second => second,
        };
        match block {
            Some(block) => Ok((current, block)),
            None => Err(StoreError::NoValidIndex {
                device: self.devname(),
                guessed: validation.geometry.label_size,
            }),
        }
    }

    /// Occupied labels of the slot array described by `index`.
    pub fn list_labels(&mut self, index: &IndexBlock) -> StoreResult<Vec<Label>> {
        let geometry = Geometry::derive(self.area.config_size() as u64, index.label_size)?;
        let start = geometry.label_offset();
        if index.labeloff != start {
            return Err(StoreError::BadLabelOffset {
                device: self.devname(),
                labeloff: index.labeloff,
                expected: start,
            });
        }
        let len = (index.nslot as u64 * index.label_size.bytes() as u64)
            .min(self.area.config_size() as u64 - start);
        if len == 0 {
            return Ok(Vec::new());
        }
        let read = ReadSession::new(&self.area, start as u32, len as u32)?.submit(&mut self.dimm)?;
        Ok(decode_slots(read.data(), &geometry, index.nslot))
    }

    fn check_active(&self, force: bool) -> StoreResult<()> {
        if self.dimm.is_active() && !force {
            log_event_with_fields(
                Event::MutationRefused,
                &[("device", &self.devname()), ("reason", "active")],
            );
            return Err(StoreError::DimmActive {
                device: self.devname(),
            });
        }
        Ok(())
    }

    /// Makes the kernel drop its cached view of the label area.
    fn refresh_kernel_view(&mut self) -> RefreshOutcome {
        if !self.dimm.is_enabled() {
            return RefreshOutcome::NotNeeded;
        }

        let outcome = match self.dimm.disable() {
            Err(e) => RefreshOutcome::Failed {
                reason: e.to_string(),
            },
            Ok(()) => {
                maybe_crash(points::REFRESH_AFTER_DISABLE);
                match self.dimm.enable() {
                    Ok(()) => RefreshOutcome::Reloaded,
                    Err(e) => RefreshOutcome::Failed {
                        reason: e.to_string(),
                    },
                }
            }
        };

        match &outcome {
            RefreshOutcome::Failed { reason } => log_event_with_fields(
                Event::KernelViewRefreshFailed,
                &[("device", &self.devname()), ("reason", reason)],
            ),
            _ => log_event_with_fields(Event::KernelViewReloaded, &[("device", &self.devname())]),
        }
        outcome
    }

    /// Destructively rewrites both index blocks with an all-free bitmap.
    ///
    /// Position 0 gets sequence 3 and position 1 sequence 2, so position 0
    /// is current once both land.
    ///
    /// # Errors
    ///
    /// - `Geometry` before any I/O when the version or slot hint cannot fit
    /// - `DimmActive` / `AlreadyInitialized` unless `force`
    /// - `PartialInit` when a block write stops partway
    pub fn reinitialize(&mut self, opts: InitOptions) -> StoreResult<MutationReport> {
        let device = self.devname();
        let config_size = self.area.config_size() as u64;
        let geometry = Geometry::derive(config_size, opts.version.label_size())?;
        let nslot = geometry.resolve_slots(opts.nslot_hint)?;

        let read = self.read_index_area()?;
        self.check_active(opts.force)?;

        let prior = self.find_valid(&read);
        if prior.is_some() && !opts.force {
            log_event_with_fields(
                Event::MutationRefused,
                &[("device", &device), ("reason", "already initialized")],
            );
            return Err(StoreError::AlreadyInitialized { device });
        }

        log_event_with_fields(
            Event::InitBegin,
            &[
                ("device", &device),
                ("nslot", &nslot.to_string()),
                ("prior_valid", &prior.is_some().to_string()),
                ("version", &opts.version.to_string()),
            ],
        );

        let mut written = 0u64;
        for position in IndexPosition::BOTH {
            let seq = Seq::from_raw(INIT_SEQ[position.as_index()]);
            let block = encode_with_geometry(&geometry, opts.version, position, seq, nslot);
            let offset = geometry.index_offset(position);

            match position {
                IndexPosition::First => maybe_crash(points::INIT_BEFORE_FIRST_INDEX),
                IndexPosition::Second => maybe_crash(points::INIT_BETWEEN_INDEX_WRITES),
            }

            let result = WriteSession::chain(&read, offset as u32, block.len() as u32)
                .and_then(|mut write| {
                    write.set_data(offset, &block)?;
                    write.submit(&mut self.dimm)
                });

            match result {
                Ok(bytes) => {
                    written += bytes;
                    log_event_with_fields(
                        Event::InitIndexWritten,
                        &[
                            ("device", &device),
                            ("position", &position.to_string()),
                            ("seq", &seq.to_string()),
                        ],
                    );
                }
                Err(source) => {
                    let sibling_intact = self.sibling_intact(position, prior.as_ref(), &geometry);
                    log_event_with_fields(
                        Event::InitFailed,
                        &[
                            ("device", &device),
                            ("position", &position.to_string()),
                            ("sibling_intact", &sibling_intact.to_string()),
                            ("bytes_moved", &source.bytes_moved().to_string()),
                        ],
                    );
                    return Err(StoreError::PartialInit {
                        device,
                        position,
                        sibling_intact,
                        source,
                    });
                }
            }
        }
        maybe_crash(points::INIT_AFTER_SECOND_INDEX);

        log_event_with_fields(
            Event::InitComplete,
            &[("device", &device), ("nslot", &nslot.to_string())],
        );

        let refresh = self.refresh_kernel_view();
        Ok(MutationReport {
            device,
            offset: 0,
            bytes_written: written,
            refresh,
        })
    }

    /// Whether a readable index block survives a failed write at `failed`.
    ///
    /// A failure at position 1 leaves the freshly written position 0. A
    /// failure at position 0 leaves the prior position 1 only if it was
    /// valid and the new block cannot have reached into it.
    fn sibling_intact(
        &self,
        failed: IndexPosition,
        prior: Option<&Validation>,
        geometry: &Geometry,
    ) -> bool {
        match failed {
            IndexPosition::Second => true,
            IndexPosition::First => prior.is_some_and(|v| {
                v.blocks[IndexPosition::Second.as_index()].is_some()
                    && geometry.index_size <= v.geometry.index_size
            }),
        }
    }

    /// Zero-fills `len` bytes at `offset` (`0, 0`: whole area).
    pub fn zero_range(&mut self, offset: u32, len: u32, force: bool) -> StoreResult<MutationReport> {
        let extent = self.area.extent(offset, len)?;
        self.check_active(force)?;

        let read = ReadSession::new(&self.area, extent.offset, extent.len)?.submit(&mut self.dimm)?;
        let mut write = WriteSession::chain(&read, extent.offset, extent.len)?;
        write.zero_data(extent.offset as u64, extent.len as usize)?;

        maybe_crash(points::ZERO_BEFORE_WRITE);
        let written = write.submit(&mut self.dimm)?;
        maybe_crash(points::ZERO_AFTER_WRITE);

        log_event_with_fields(
            Event::ZeroComplete,
            &[
                ("bytes", &written.to_string()),
                ("device", &self.devname()),
                ("offset", &extent.offset.to_string()),
            ],
        );

        let refresh = self.refresh_kernel_view();
        Ok(MutationReport {
            device: self.devname(),
            offset: extent.offset,
            bytes_written: written,
            refresh,
        })
    }

    /// Raw bytes of `len` at `offset` (`0, 0`: whole area).
    pub fn read_range(&mut self, offset: u32, len: u32) -> StoreResult<Vec<u8>> {
        let read = ReadSession::new(&self.area, offset, len)?.submit(&mut self.dimm)?;
        Ok(read.into_data())
    }

    /// Writes `data` at `offset` through a read-modify-write chain.
    pub fn write_range(&mut self, offset: u32, data: &[u8], force: bool) -> StoreResult<MutationReport> {
        let len = u32::try_from(data.len()).unwrap_or(u32::MAX);
        if len == 0 {
            return Err(XferError::bad_extent(offset as u64, 0, self.area.config_size() as u64).into());
        }
        let extent = self.area.extent(offset, len)?;
        self.check_active(force)?;

        let read = ReadSession::new(&self.area, extent.offset, extent.len)?.submit(&mut self.dimm)?;
        let mut write = WriteSession::chain(&read, extent.offset, extent.len)?;
        write.set_data(extent.offset as u64, data)?;

        maybe_crash(points::WRITE_BEFORE_SUBMIT);
        let written = write.submit(&mut self.dimm)?;

        log_event_with_fields(
            Event::WriteComplete,
            &[
                ("bytes", &written.to_string()),
                ("device", &self.devname()),
                ("offset", &extent.offset.to_string()),
            ],
        );

        let refresh = self.refresh_kernel_view();
        Ok(MutationReport {
            device: self.devname(),
            offset: extent.offset,
            bytes_written: written,
            refresh,
        })
    }

    /// Snapshot of both index positions and the occupied labels.
    ///
    /// Succeeds even when no index block is valid; the label size is then
    /// the display heuristic's guess and no labels are listed.
    pub fn dump(&mut self) -> StoreResult<LabelDump> {
        let read = self.read_index_area()?;
        let validation = self.find_valid(&read);

        let (label_size, label_size_guessed) = match &validation {
            Some(v) => (v.geometry.label_size, false),
            None => (self.guess_from_headers(&read), true),
        };
        let headers = self.peek_headers(&read, label_size);

        let mut indexes = Vec::with_capacity(2);
        for (position, header) in IndexPosition::BOTH.into_iter().zip(headers) {
            let block = validation
                .as_ref()
                .and_then(|v| v.blocks[position.as_index()].as_ref());
            let error = match (block, &validation) {
                (Some(_), _) => None,
                (None, Some(v)) => {
                    let offset = v.geometry.index_offset(position);
                    read.get_data(offset, v.geometry.index_size as usize)
                        .map(|bytes| IndexBlock::decode(bytes, position, &v.geometry))
                        .and_then(|r| r.err())
                        .map(|e| e.to_string())
                }
                (None, None) => Some("no valid index block at any label size".to_string()),
            };
            indexes.push(IndexDump {
                position,
                valid: block.is_some(),
                header,
                error,
                free_slots: block.map(|b| b.free_slot_count()),
            });
        }

        let labels = match validation.as_ref().and_then(|v| v.current_block()) {
            Some(current) => {
                let current = current.clone();
                self.list_labels(&current)?
            }
            None => Vec::new(),
        };

        Ok(LabelDump {
            device: self.devname(),
            config_size: self.area.config_size(),
            max_xfer: self.area.max_xfer(),
            label_size,
            label_size_guessed,
            state: validation.as_ref().map_or(IndexState::Invalid, |v| v.state),
            current: validation.as_ref().map(|v| v.current),
            indexes,
            labels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Command, DimmControl, Fault, FaultKind, MemoryDimm};
    use crate::observability::{capture_events, Severity};

    const CONFIG_SIZE: u32 = 131072;

    fn store() -> LabelStore<MemoryDimm> {
        LabelStore::open(MemoryDimm::new("nmem0", CONFIG_SIZE, 4096)).unwrap()
    }

    #[test]
    fn test_blank_area_is_invalid() {
        let mut store = store();
        let err = store.validate().unwrap_err();
        assert!(matches!(err, StoreError::NoValidIndex { guessed: LabelSize::Small, .. }));
    }

    #[test]
    fn test_init_then_current_is_first() {
        let mut store = store();
        let report = store.reinitialize(InitOptions::new(LabelVersion::V1_1)).unwrap();
        assert_eq!(report.refresh, RefreshOutcome::NotNeeded);
        assert_eq!(report.bytes_written, 2 * 256);

        let (position, block) = store.read_current_index().unwrap();
        assert_eq!(position, IndexPosition::First);
        assert_eq!(block.sequence(), Seq::from_raw(3));
        assert_eq!(block.nslot, 1020);
        assert_eq!(store.check().unwrap(), 1020);
    }

    #[test]
    fn test_init_v1_2_accepted_at_large_size() {
        let mut store = store();
        store.reinitialize(InitOptions::new(LabelVersion::V1_2)).unwrap();

        let validation = store.validate().unwrap();
        assert_eq!(validation.geometry.label_size, LabelSize::Large);
        assert_eq!(validation.state, IndexState::Both);
        assert_eq!(validation.geometry.nslot, 510);
    }

    #[test]
    fn test_init_refuses_initialized_unless_forced() {
        let mut store = store();
        store.reinitialize(InitOptions::new(LabelVersion::V1_1)).unwrap();

        let err = store.reinitialize(InitOptions::new(LabelVersion::V1_2)).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyInitialized { .. }));

        let mut opts = InitOptions::new(LabelVersion::V1_2);
        opts.force = true;
        store.reinitialize(opts).unwrap();
        assert_eq!(store.validate().unwrap().geometry.label_size, LabelSize::Large);
    }

    #[test]
    fn test_active_blocks_mutation_before_writes() {
        let dimm = MemoryDimm::new("nmem0", CONFIG_SIZE, 4096).with_active(true);
        let mut store = LabelStore::open(dimm).unwrap();

        let err = store.reinitialize(InitOptions::new(LabelVersion::V1_1)).unwrap_err();
        assert!(matches!(err, StoreError::DimmActive { .. }));
        let err = store.zero_range(0, 0, false).unwrap_err();
        assert!(matches!(err, StoreError::DimmActive { .. }));
        assert!(store.dimm().commands_of(Command::SetConfigData).is_empty());
    }

    #[test]
    fn test_nslot_hint() {
        let mut store = store();
        let mut opts = InitOptions::new(LabelVersion::V1_1);
        opts.nslot_hint = Some(64);
        store.reinitialize(opts).unwrap();

        let (_, block) = store.read_current_index().unwrap();
        assert_eq!(block.nslot, 64);
        assert_eq!(block.free_slot_count(), 64);

        let mut store = self::store();
        let mut opts = InitOptions::new(LabelVersion::V1_1);
        opts.nslot_hint = Some(5000);
        assert!(matches!(store.reinitialize(opts).unwrap_err(), StoreError::Geometry(_)));
        assert!(store.dimm().commands_of(Command::SetConfigData).is_empty());
    }

    #[test]
    fn test_refresh_runs_when_enabled() {
        let dimm = MemoryDimm::new("nmem0", CONFIG_SIZE, 4096).with_enabled(true);
        let mut store = LabelStore::open(dimm).unwrap();

        let report = store.zero_range(0, 0, false).unwrap();
        assert_eq!(report.refresh, RefreshOutcome::Reloaded);
        assert_eq!(report.bytes_written, CONFIG_SIZE as u64);
        assert!(store.dimm().is_enabled());
    }

    #[test]
    fn test_refresh_failure_does_not_fail_mutation() {
        let mut dimm = MemoryDimm::new("nmem0", CONFIG_SIZE, 4096).with_enabled(true);
        dimm.inject(Fault::always(Command::Enable, FaultKind::Fail));
        let mut store = LabelStore::open(dimm).unwrap();

        let report = store.reinitialize(InitOptions::new(LabelVersion::V1_1)).unwrap();
        assert!(report.refresh_failed());
        assert!(store.check().is_ok());
    }

    #[test]
    fn test_write_range_then_read_range() {
        let mut store = store();
        store.write_range(1000, b"abcdef", false).unwrap();
        assert_eq!(store.read_range(999, 8).unwrap(), b"\0abcdef\0");
    }

    #[test]
    fn test_write_range_rejects_empty_and_overflow() {
        let mut store = store();
        assert!(store.write_range(0, &[], false).is_err());
        assert!(store.write_range(CONFIG_SIZE - 2, &[1, 2, 3], false).is_err());
        assert!(store.dimm().commands_of(Command::SetConfigData).is_empty());
    }

    #[test]
    fn test_dump_blank_area_guesses() {
        let mut store = store();
        let dump = store.dump().unwrap();
        assert!(dump.label_size_guessed);
        assert_eq!(dump.state, IndexState::Invalid);
        assert_eq!(dump.current, None);
        assert!(dump.indexes.iter().all(|i| !i.valid));
    }

    #[test]
    fn test_dump_initialized_area() {
        let mut store = store();
        store.reinitialize(InitOptions::new(LabelVersion::V1_1)).unwrap();

        let dump = store.dump().unwrap();
        assert!(!dump.label_size_guessed);
        assert_eq!(dump.current, Some(IndexPosition::First));
        assert_eq!(dump.indexes[1].header.as_ref().unwrap().seq, 2);
        assert_eq!(dump.indexes[0].free_slots, Some(1020));
        // A zeroed slot 0 self-reports slot 0
        assert_eq!(dump.labels.len(), 1);
        assert!(dump.labels[0].uuid.is_nil());

        let json = serde_json::to_value(&dump).unwrap();
        assert_eq!(json["label_size"], "128");
        assert_eq!(json["current"], "0");
    }

    #[test]
    fn test_zero_from_offset_without_len_keeps_index_blocks() {
        let mut store = store();
        store.reinitialize(InitOptions::new(LabelVersion::V1_1)).unwrap();
        store.write_range(4096, &[0x5A; 64], false).unwrap();
        let head = store.dimm().data()[..4096].to_vec();
        let writes = store.dimm().commands_of(Command::SetConfigData).len();

        let err = store.zero_range(4096, 0, false).unwrap_err();
        assert_eq!(err.code(), "NVL_XFER_BAD_EXTENT");
        assert_eq!(store.dimm().commands_of(Command::SetConfigData).len(), writes);
        assert_eq!(&store.dimm().data()[..4096], &head[..]);
        assert!(store.dimm().data()[4096..4160].iter().all(|b| *b == 0x5A));
        assert_eq!(store.check().unwrap(), 1020);

        assert!(store.read_range(100, 0).is_err());
        assert_eq!(store.read_range(0, 0).unwrap().len(), CONFIG_SIZE as usize);
    }

    #[test]
    fn test_init_of_blank_area_reports_no_invalid_index() {
        let mut store = store();
        let (result, events) = capture_events(|| store.reinitialize(InitOptions::new(LabelVersion::V1_1)));
        result.unwrap();

        let names: Vec<&str> = events.iter().map(|(_, e)| e.as_str()).collect();
        assert!(!names.contains(&Event::IndexInvalid.as_str()));
        assert!(!names.contains(&Event::LabelSizeGuessed.as_str()));
        assert!(events.iter().all(|(severity, _)| *severity < Severity::Fatal));
        assert!(names.contains(&Event::InitComplete.as_str()));
    }

    #[test]
    fn test_check_of_blank_area_reports_invalid_index() {
        let mut store = store();
        let (result, events) = capture_events(|| store.check());
        assert!(result.is_err());
        assert!(events.contains(&(Severity::Fatal, Event::IndexInvalid.as_str().to_string())));
        assert!(events.contains(&(Severity::Warn, Event::LabelSizeGuessed.as_str().to_string())));
    }

    #[test]
    fn test_list_labels_rejects_foreign_label_offset() {
        let mut store = store();
        store.reinitialize(InitOptions::new(LabelVersion::V1_1)).unwrap();
        let (_, mut index) = store.read_current_index().unwrap();
        assert!(store.list_labels(&index).unwrap().is_empty());

        index.labeloff += 128;
        let err = store.list_labels(&index).unwrap_err();
        assert!(matches!(err, StoreError::BadLabelOffset { expected: 512, .. }));
    }
}
