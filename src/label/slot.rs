//! Namespace label slot codec
//!
//! ```text
//! offset  size  field
//!      0    16  uuid
//!     16    64  name (NUL padded)
//!     80     4  flags
//!     84     2  nlabel
//!     86     2  position
//!     88     8  isetcookie
//!     96     8  lbasize
//!    104     8  dpa
//!    112     8  rawsize
//!    120     4  slot
//!  ---- 256-byte labels only ----
//!    124     1  align
//!    125     3  reserved
//!    128    16  type_guid
//!    144    16  abstraction_guid
//!    160    88  reserved2
//!    248     8  checksum (fletcher64, field zeroed)
//! ```
//!
//! A slot is occupied only when its `slot` field equals its position in
//! the slot array.

use serde::Serialize;
use uuid::Uuid;

use super::checksum::{checksum_with_field_zeroed, verify_checksum_field};
use super::geometry::{Geometry, LabelSize};

/// Length of the label name field.
pub const NAME_LEN: usize = 64;

const OFF_UUID: usize = 0;
const OFF_NAME: usize = 16;
const OFF_FLAGS: usize = 80;
const OFF_NLABEL: usize = 84;
const OFF_POSITION: usize = 86;
const OFF_ISETCOOKIE: usize = 88;
const OFF_LBASIZE: usize = 96;
const OFF_DPA: usize = 104;
const OFF_RAWSIZE: usize = 112;
const OFF_SLOT: usize = 120;
const OFF_ALIGN: usize = 124;
const OFF_TYPE_GUID: usize = 128;
const OFF_ABSTRACTION_GUID: usize = 144;
const OFF_LABEL_CHECKSUM: usize = 248;

/// Label flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct LabelFlags(pub u32);

impl LabelFlags {
    /// Read-only label
    pub const ROLABEL: u32 = 0x1;
    /// DIMM-local namespace
    pub const LOCAL: u32 = 0x2;
    /// Namespace fronted by a block translation table
    pub const BTT: u32 = 0x4;
    /// Label is mid-update
    pub const UPDATING: u32 = 0x8;

    pub fn contains(self, bit: u32) -> bool {
        self.0 & bit == bit
    }
}

/// Fields present only in 256-byte (v1.2) labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelExtension {
    pub align: u8,
    pub type_guid: Uuid,
    pub abstraction_guid: Uuid,
    pub checksum: u64,
}

/// A decoded namespace label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Label {
    pub uuid: Uuid,
    pub name: String,
    pub flags: LabelFlags,
    pub nlabel: u16,
    pub position: u16,
    pub isetcookie: u64,
    pub lbasize: u64,
    pub dpa: u64,
    pub rawsize: u64,
    pub slot: u32,
    #[serde(flatten)]
    pub extension: Option<LabelExtension>,
}

fn le_u16(bytes: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([bytes[off], bytes[off + 1]])
}

fn le_u32(bytes: &[u8], off: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[off..off + 4]);
    u32::from_le_bytes(buf)
}

fn le_u64(bytes: &[u8], off: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[off..off + 8]);
    u64::from_le_bytes(buf)
}

fn guid(bytes: &[u8], off: usize) -> Uuid {
    let mut buf = [0u8; 16];
    buf.copy_from_slice(&bytes[off..off + 16]);
    Uuid::from_bytes(buf)
}

impl Label {
    /// Decodes one slot. Returns `None` if `bytes` is shorter than
    /// `label_size`.
    ///
    /// For 128-byte labels the extension fields are absent.
    pub fn decode(bytes: &[u8], label_size: LabelSize) -> Option<Self> {
        let len = label_size.bytes() as usize;
        if bytes.len() < len {
            return None;
        }
        let bytes = &bytes[..len];

        let raw_name = &bytes[OFF_NAME..OFF_NAME + NAME_LEN];
        let name_end = raw_name.iter().position(|b| *b == 0).unwrap_or(NAME_LEN - 1);
        let name = String::from_utf8_lossy(&raw_name[..name_end]).into_owned();

        let extension = match label_size {
            LabelSize::Small => None,
            LabelSize::Large => Some(LabelExtension {
                align: bytes[OFF_ALIGN],
                type_guid: guid(bytes, OFF_TYPE_GUID),
                abstraction_guid: guid(bytes, OFF_ABSTRACTION_GUID),
                checksum: le_u64(bytes, OFF_LABEL_CHECKSUM),
            }),
        };

        Some(Self {
            uuid: guid(bytes, OFF_UUID),
            name,
            flags: LabelFlags(le_u32(bytes, OFF_FLAGS)),
            nlabel: le_u16(bytes, OFF_NLABEL),
            position: le_u16(bytes, OFF_POSITION),
            isetcookie: le_u64(bytes, OFF_ISETCOOKIE),
            lbasize: le_u64(bytes, OFF_LBASIZE),
            dpa: le_u64(bytes, OFF_DPA),
            rawsize: le_u64(bytes, OFF_RAWSIZE),
            slot: le_u32(bytes, OFF_SLOT),
            extension,
        })
    }

    /// Encodes the label for a slot of `label_size` bytes.
    ///
    /// Names longer than 63 bytes are truncated so the field stays NUL
    /// terminated. For 256-byte labels the checksum field is recomputed and
    /// the stored `extension.checksum` is ignored.
    pub fn encode(&self, label_size: LabelSize) -> Vec<u8> {
        let mut bytes = vec![0u8; label_size.bytes() as usize];

        bytes[OFF_UUID..OFF_UUID + 16].copy_from_slice(self.uuid.as_bytes());
        let name = self.name.as_bytes();
        let name_len = name.len().min(NAME_LEN - 1);
        bytes[OFF_NAME..OFF_NAME + name_len].copy_from_slice(&name[..name_len]);
        bytes[OFF_FLAGS..OFF_FLAGS + 4].copy_from_slice(&self.flags.0.to_le_bytes());
        bytes[OFF_NLABEL..OFF_NLABEL + 2].copy_from_slice(&self.nlabel.to_le_bytes());
        bytes[OFF_POSITION..OFF_POSITION + 2].copy_from_slice(&self.position.to_le_bytes());
        bytes[OFF_ISETCOOKIE..OFF_ISETCOOKIE + 8].copy_from_slice(&self.isetcookie.to_le_bytes());
        bytes[OFF_LBASIZE..OFF_LBASIZE + 8].copy_from_slice(&self.lbasize.to_le_bytes());
        bytes[OFF_DPA..OFF_DPA + 8].copy_from_slice(&self.dpa.to_le_bytes());
        bytes[OFF_RAWSIZE..OFF_RAWSIZE + 8].copy_from_slice(&self.rawsize.to_le_bytes());
        bytes[OFF_SLOT..OFF_SLOT + 4].copy_from_slice(&self.slot.to_le_bytes());

        if let (LabelSize::Large, Some(ext)) = (label_size, &self.extension) {
            bytes[OFF_ALIGN] = ext.align;
            bytes[OFF_TYPE_GUID..OFF_TYPE_GUID + 16].copy_from_slice(ext.type_guid.as_bytes());
            bytes[OFF_ABSTRACTION_GUID..OFF_ABSTRACTION_GUID + 16]
                .copy_from_slice(ext.abstraction_guid.as_bytes());
        }
        if label_size == LabelSize::Large {
            let sum = checksum_with_field_zeroed(&bytes, OFF_LABEL_CHECKSUM);
            bytes[OFF_LABEL_CHECKSUM..OFF_LABEL_CHECKSUM + 8].copy_from_slice(&sum.to_le_bytes());
        }

        bytes
    }

    /// Whether this label occupies slot `index` of the array.
    pub fn occupies(&self, index: u32) -> bool {
        self.slot == index
    }

    pub fn is_read_only(&self) -> bool {
        self.flags.contains(LabelFlags::ROLABEL)
    }
}

/// Verifies the self-checksum of a raw 256-byte label.
///
/// 128-byte labels carry no checksum and are always reported valid.
pub fn label_checksum_valid(bytes: &[u8], label_size: LabelSize) -> bool {
    match label_size {
        LabelSize::Small => true,
        LabelSize::Large => verify_checksum_field(&bytes[..bytes.len().min(256)], OFF_LABEL_CHECKSUM),
    }
}

/// Decodes the occupied slots of a label array.
///
/// `area` starts at slot 0; `nslot` comes from the selected index block.
/// Slots whose self-reported index differs from their position, and slots
/// cut short by the end of `area`, are treated as empty.
pub fn decode_slots(area: &[u8], geometry: &Geometry, nslot: u32) -> Vec<Label> {
    let size = geometry.label_size.bytes() as usize;
    area.chunks_exact(size)
        .take(nslot as usize)
        .enumerate()
        .filter_map(|(index, raw)| {
            Label::decode(raw, geometry.label_size).filter(|label| label.occupies(index as u32))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(slot: u32) -> Label {
        Label {
            uuid: Uuid::from_bytes([slot as u8 + 1; 16]),
            name: format!("namespace{}", slot),
            flags: LabelFlags(LabelFlags::LOCAL),
            nlabel: 1,
            position: 0,
            isetcookie: 0x1234_5678_9abc_def0,
            lbasize: 512,
            dpa: 0x1000_0000 * (slot as u64 + 1),
            rawsize: 1 << 30,
            slot,
            extension: None,
        }
    }

    #[test]
    fn test_decode_small_label() {
        let label = sample(3);
        let bytes = label.encode(LabelSize::Small);
        assert_eq!(bytes.len(), 128);

        let decoded = Label::decode(&bytes, LabelSize::Small).unwrap();
        assert_eq!(decoded, label);
        assert!(decoded.extension.is_none());
        assert!(decoded.flags.contains(LabelFlags::LOCAL));
        assert!(!decoded.is_read_only());
    }

    #[test]
    fn test_decode_large_label_with_checksum() {
        let mut label = sample(0);
        label.extension = Some(LabelExtension {
            align: 0,
            type_guid: Uuid::from_bytes([0xAA; 16]),
            abstraction_guid: Uuid::from_bytes([0xBB; 16]),
            checksum: 0,
        });
        let bytes = label.encode(LabelSize::Large);
        assert!(label_checksum_valid(&bytes, LabelSize::Large));

        let decoded = Label::decode(&bytes, LabelSize::Large).unwrap();
        let ext = decoded.extension.as_ref().unwrap();
        assert_eq!(ext.type_guid, Uuid::from_bytes([0xAA; 16]));
        assert_ne!(ext.checksum, 0);

        let mut corrupt = bytes.clone();
        corrupt[20] ^= 0x40;
        assert!(!label_checksum_valid(&corrupt, LabelSize::Large));
    }

    #[test]
    fn test_name_is_nul_terminated() {
        let mut label = sample(0);
        label.name = "x".repeat(100);
        let bytes = label.encode(LabelSize::Small);
        let decoded = Label::decode(&bytes, LabelSize::Small).unwrap();
        assert_eq!(decoded.name.len(), NAME_LEN - 1);
    }

    #[test]
    fn test_short_input() {
        assert!(Label::decode(&[0u8; 127], LabelSize::Small).is_none());
        assert!(Label::decode(&[0u8; 200], LabelSize::Large).is_none());
    }

    #[test]
    fn test_decode_slots_skips_mismatched_index() {
        let geometry = Geometry::derive(131072, LabelSize::Small).unwrap();
        let mut area = vec![0u8; 128 * 4];
        area[128..256].copy_from_slice(&sample(1).encode(LabelSize::Small));
        // claims slot 7 while sitting in slot 2
        area[256..384].copy_from_slice(&sample(7).encode(LabelSize::Small));
        area[384..512].copy_from_slice(&sample(3).encode(LabelSize::Small));

        let labels = decode_slots(&area, &geometry, 4);
        let slots: Vec<u32> = labels.iter().map(|l| l.slot).collect();
        // an all-zero slot 0 self-reports slot 0 and so counts as occupied
        assert_eq!(slots, vec![0, 1, 3]);
    }

    #[test]
    fn test_decode_slots_honors_nslot() {
        let geometry = Geometry::derive(131072, LabelSize::Small).unwrap();
        let mut area = vec![0u8; 128 * 4];
        for slot in 0..4u32 {
            let start = slot as usize * 128;
            area[start..start + 128].copy_from_slice(&sample(slot).encode(LabelSize::Small));
        }
        assert_eq!(decode_slots(&area, &geometry, 2).len(), 2);
        assert_eq!(decode_slots(&area[..300], &geometry, 4).len(), 2);
    }
}
