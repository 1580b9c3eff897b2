//! Label storage area geometry
//!
//! The label storage area (LSA) is laid out as two index blocks followed by
//! the label slot array:
//!
//! ```text
//! +------------+  0
//! |  index 0   |
//! +------------+  index_size
//! |  index 1   |
//! +------------+  2 * index_size  (labeloff)
//! |  slot 0    |
//! |  ...       |
//! |  slot N-1  |
//! +------------+  <= config_size
//! ```
//!
//! The size of an index block depends on the slot count (one bitmap bit per
//! slot) and the slot count depends on the space left after both index
//! blocks, so the slot count is derived in two steps: estimate from
//! `config_size / label_size`, size the index blocks for the estimate, then
//! recompute the slot count from what remains.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::{GeometryError, GeometryResult};
use super::index::IndexPosition;

/// Index blocks are padded to a multiple of this many bytes.
pub const INDEX_ALIGN: u64 = 256;

/// Size of the fixed index block header preceding the free bitmap.
pub const INDEX_HEADER_SIZE: u64 = 72;

/// Smallest slot count a usable label area may hold.
pub const MIN_SLOTS: u32 = 2;

/// On-media label slot size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LabelSize {
    /// 128-byte labels (format 1.1)
    #[serde(rename = "128")]
    Small,
    /// 256-byte labels (format 1.2)
    #[serde(rename = "256")]
    Large,
}

impl LabelSize {
    /// Probe order used when the label size is not yet known.
    pub const CANDIDATES: [LabelSize; 2] = [LabelSize::Small, LabelSize::Large];

    /// Slot size in bytes.
    pub fn bytes(self) -> u32 {
        match self {
            LabelSize::Small => 128,
            LabelSize::Large => 256,
        }
    }

    /// Encoded `labelsize` byte of the index block (`bytes = 1 << (7 + code)`).
    pub fn code(self) -> u8 {
        match self {
            LabelSize::Small => 0,
            LabelSize::Large => 1,
        }
    }

    /// Decodes an index block `labelsize` byte.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(LabelSize::Small),
            1 => Some(LabelSize::Large),
            _ => None,
        }
    }
}

impl fmt::Display for LabelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bytes())
    }
}

/// Label area format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LabelVersion {
    #[serde(rename = "1.1")]
    V1_1,
    #[serde(rename = "1.2")]
    V1_2,
}

impl LabelVersion {
    pub fn major(self) -> u16 {
        1
    }

    pub fn minor(self) -> u16 {
        match self {
            LabelVersion::V1_1 => 1,
            LabelVersion::V1_2 => 2,
        }
    }

    /// Label slot size mandated by this version.
    pub fn label_size(self) -> LabelSize {
        match self {
            LabelVersion::V1_1 => LabelSize::Small,
            LabelVersion::V1_2 => LabelSize::Large,
        }
    }

    /// Version as the `major * 100 + minor` number used for comparisons.
    pub fn as_number(self) -> u32 {
        self.major() as u32 * 100 + self.minor() as u32
    }

    /// Maps on-media major/minor to a known version.
    pub fn from_parts(major: u16, minor: u16) -> Option<Self> {
        match (major, minor) {
            (1, 1) => Some(LabelVersion::V1_1),
            (1, 2) => Some(LabelVersion::V1_2),
            _ => None,
        }
    }
}

impl fmt::Display for LabelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major(), self.minor())
    }
}

impl FromStr for LabelVersion {
    type Err = GeometryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1.1" | "v1.1" => Ok(LabelVersion::V1_1),
            "1.2" | "v1.2" => Ok(LabelVersion::V1_2),
            other => Err(GeometryError::UnsupportedVersion(other.to_string())),
        }
    }
}

/// Size of one index block for `nslot` slots: header plus one bitmap bit
/// per slot, rounded up to [`INDEX_ALIGN`].
pub fn index_size(nslot: u32) -> u64 {
    let raw = INDEX_HEADER_SIZE + (nslot as u64).div_ceil(8);
    raw.div_ceil(INDEX_ALIGN) * INDEX_ALIGN
}

/// Slot count for a label area using the two-step derivation.
fn derive_slot_count(config_size: u64, label_size: LabelSize) -> Option<u32> {
    let bytes = label_size.bytes() as u64;
    let estimate = (config_size / bytes).min(u32::MAX as u64) as u32;
    let estimate_index = index_size(estimate);
    let space = config_size.checked_sub(2 * estimate_index)?;
    Some((space / bytes).min(u32::MAX as u64) as u32)
}

/// Resolved layout of one label storage area for one label size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Geometry {
    /// Total bytes of the label storage area as reported by the device
    pub config_size: u64,
    /// Label slot size assumed by this layout
    pub label_size: LabelSize,
    /// Maximum number of label slots
    pub nslot: u32,
    /// Size of each of the two index blocks
    pub index_size: u64,
}

impl Geometry {
    /// Derives the layout for `config_size` bytes of `label_size` labels.
    ///
    /// # Errors
    ///
    /// `AreaTooSmall` when the area cannot host both index blocks and at
    /// least [`MIN_SLOTS`] labels.
    pub fn derive(config_size: u64, label_size: LabelSize) -> GeometryResult<Self> {
        let too_small = GeometryError::AreaTooSmall {
            config_size,
            label_size: label_size.bytes(),
        };

        let nslot = derive_slot_count(config_size, label_size).ok_or_else(|| too_small.clone())?;
        let space = config_size - nslot as u64 * label_size.bytes() as u64;
        let size = index_size(nslot);

        if 2 * size > space || nslot < MIN_SLOTS {
            return Err(too_small);
        }

        Ok(Self {
            config_size,
            label_size,
            nslot,
            index_size: size,
        })
    }

    /// Byte offset of the index block at `position`.
    pub fn index_offset(&self, position: IndexPosition) -> u64 {
        position.as_index() as u64 * self.index_size
    }

    /// Byte offset of slot 0, relative to the start of the area.
    pub fn label_offset(&self) -> u64 {
        2 * self.index_size
    }

    /// Byte offset of `slot`.
    pub fn slot_offset(&self, slot: u32) -> u64 {
        self.label_offset() + slot as u64 * self.label_size.bytes() as u64
    }

    /// Whether `nslot` slots plus both index blocks fit in the area.
    pub fn fits(&self, nslot: u32) -> bool {
        nslot as u64 * self.label_size.bytes() as u64 + 2 * self.index_size <= self.config_size
    }

    /// Validates a caller-requested slot count against this layout.
    ///
    /// `None` selects the derived maximum. A hint may only lower it.
    pub fn resolve_slots(&self, hint: Option<u32>) -> GeometryResult<u32> {
        match hint {
            None => Ok(self.nslot),
            Some(requested) if requested < MIN_SLOTS => {
                Err(GeometryError::TooFewSlots { requested })
            }
            Some(requested) if requested > self.nslot => Err(GeometryError::TooManySlots {
                requested,
                max: self.nslot,
            }),
            Some(requested) => Ok(requested),
        }
    }
}
