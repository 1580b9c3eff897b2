//! Namespace index block codec
//!
//! On-media layout (all integers little-endian):
//!
//! ```text
//! +------------------+  0
//! | signature        | 16 bytes, "NAMESPACE_INDEX\0"
//! | flags            | 3 bytes, reserved
//! | labelsize        | u8, 0 => 128-byte labels, 1 => 256-byte labels
//! | seq              | u32, low 2 bits significant, 0 invalid
//! | myoff            | u64
//! | mysize           | u64
//! | otheroff         | u64
//! | labeloff         | u64
//! | nslot            | u32
//! | major, minor     | u16, u16
//! | checksum         | u64, fletcher64 with this field zeroed
//! +------------------+  72
//! | free bitmap      | 1 bit per slot, set = free
//! | padding          | up to the 256-byte aligned index size
//! +------------------+
//! ```
//!
//! The checksum covers the whole block including padding.

use std::fmt;

use serde::Serialize;

use super::checksum::{checksum_with_field_zeroed, Hasher};
use super::errors::{DecodeError, DecodeResult, GeometryResult};
use super::geometry::{Geometry, LabelSize, LabelVersion, INDEX_HEADER_SIZE};
use super::sequence::Seq;

/// Index block signature.
pub const INDEX_SIGNATURE: &[u8; 16] = b"NAMESPACE_INDEX\0";

const SIG_LEN: usize = 16;
const OFF_FLAGS: usize = 16;
const OFF_LABELSIZE: usize = 19;
const OFF_SEQ: usize = 20;
const OFF_MYOFF: usize = 24;
const OFF_MYSIZE: usize = 32;
const OFF_OTHEROFF: usize = 40;
const OFF_LABELOFF: usize = 48;
const OFF_NSLOT: usize = 56;
const OFF_MAJOR: usize = 60;
const OFF_MINOR: usize = 62;
/// Byte offset of the checksum field within an index block.
pub const OFF_CHECKSUM: usize = 64;
const OFF_FREE: usize = INDEX_HEADER_SIZE as usize;

/// One of the two fixed index block positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum IndexPosition {
    #[serde(rename = "0")]
    First,
    #[serde(rename = "1")]
    Second,
}

impl IndexPosition {
    pub const BOTH: [IndexPosition; 2] = [IndexPosition::First, IndexPosition::Second];

    pub fn as_index(self) -> usize {
        match self {
            IndexPosition::First => 0,
            IndexPosition::Second => 1,
        }
    }

    /// The sibling position.
    pub fn other(self) -> IndexPosition {
        match self {
            IndexPosition::First => IndexPosition::Second,
            IndexPosition::Second => IndexPosition::First,
        }
    }
}

impl fmt::Display for IndexPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_index())
    }
}

fn read_u16(bytes: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([bytes[off], bytes[off + 1]])
}

fn read_u32(bytes: &[u8], off: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[off..off + 4]);
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8], off: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[off..off + 8]);
    u64::from_le_bytes(buf)
}

/// Unvalidated view of an index block header.
///
/// Used for display and for the label-size heuristic; never trusted for
/// anything that writes to the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexHeader {
    pub signature: String,
    pub major: u16,
    pub minor: u16,
    pub labelsize: u8,
    pub seq: u32,
    pub nslot: u32,
}

impl IndexHeader {
    /// Reads the header fields without any validation.
    ///
    /// Returns `None` when fewer than the header's bytes are available.
    pub fn peek(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < OFF_FREE {
            return None;
        }
        let sig_end = bytes[..SIG_LEN].iter().position(|b| *b == 0).unwrap_or(SIG_LEN);
        Some(Self {
            signature: String::from_utf8_lossy(&bytes[..sig_end]).into_owned(),
            major: read_u16(bytes, OFF_MAJOR),
            minor: read_u16(bytes, OFF_MINOR),
            labelsize: bytes[OFF_LABELSIZE],
            seq: read_u32(bytes, OFF_SEQ),
            nslot: read_u32(bytes, OFF_NSLOT),
        })
    }

    /// Label size the header claims, `1 << (7 + labelsize)`.
    pub fn declared_label_size(&self) -> u32 {
        1u32.checked_shl(7 + self.labelsize as u32).unwrap_or(0)
    }
}

/// Best-effort label size guess for display.
///
/// Counts headers declaring version 1.1 versus 1.2 and assumes 256-byte
/// labels only when 1.2 is in the strict majority.
pub fn guess_label_size<'a>(headers: impl IntoIterator<Item = &'a IndexHeader>) -> LabelSize {
    let (mut v1, mut v2) = (0, 0);
    for header in headers {
        if header.major == 1 {
            match header.minor {
                1 => v1 += 1,
                2 => v2 += 1,
                _ => {}
            }
        }
    }
    if v2 > v1 {
        LabelSize::Large
    } else {
        LabelSize::Small
    }
}

/// A structurally valid index block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexBlock {
    pub position: IndexPosition,
    pub flags: [u8; 3],
    pub label_size: LabelSize,
    /// Raw on-media sequence field; see [`IndexBlock::sequence`]
    pub seq: u32,
    pub myoff: u64,
    pub mysize: u64,
    pub otheroff: u64,
    pub labeloff: u64,
    pub nslot: u32,
    pub major: u16,
    pub minor: u16,
    pub checksum: u64,
    #[serde(skip)]
    free: Vec<u8>,
}

impl IndexBlock {
    /// Validates the index block stored at `position`.
    ///
    /// `bytes` must start at the block; anything past `geometry.index_size`
    /// is ignored.
    ///
    /// # Errors
    ///
    /// Returns the first structural check that fails, in this order:
    /// length, signature, label size, checksum, sequence, self offset,
    /// sibling offset, size, slot count.
    pub fn decode(bytes: &[u8], position: IndexPosition, geometry: &Geometry) -> DecodeResult<Self> {
        let size = geometry.index_size as usize;
        if bytes.len() < size {
            return Err(DecodeError::Truncated {
                position,
                expected: size,
                actual: bytes.len(),
            });
        }
        let block = &bytes[..size];

        if &block[..SIG_LEN] != INDEX_SIGNATURE {
            return Err(DecodeError::BadSignature { position });
        }

        let major = read_u16(block, OFF_MAJOR);
        let minor = read_u16(block, OFF_MINOR);
        let code = block[OFF_LABELSIZE];
        // label sizes other than 128 arrived with v1.2
        let declared = if major as u32 * 100 + minor as u32 >= LabelVersion::V1_2.as_number() {
            LabelSize::from_code(code)
        } else {
            Some(LabelSize::Small)
        };
        if declared != Some(geometry.label_size) {
            return Err(DecodeError::LabelSizeMismatch {
                position,
                declared: declared
                    .map(LabelSize::bytes)
                    .unwrap_or_else(|| 1u32.checked_shl(7 + code as u32).unwrap_or(0)),
                assumed: geometry.label_size.bytes(),
            });
        }

        let stored = read_u64(block, OFF_CHECKSUM);
        let computed = checksum_with_field_zeroed(block, OFF_CHECKSUM);
        if stored != computed {
            return Err(DecodeError::ChecksumMismatch {
                position,
                stored,
                computed,
            });
        }

        let seq = read_u32(block, OFF_SEQ);
        if !Seq::from_raw(seq).is_valid() {
            return Err(DecodeError::InvalidSequence { position, seq });
        }

        let myoff = read_u64(block, OFF_MYOFF);
        let expected = geometry.index_offset(position);
        if myoff != expected {
            return Err(DecodeError::BadSelfOffset {
                position,
                actual: myoff,
                expected,
            });
        }

        let otheroff = read_u64(block, OFF_OTHEROFF);
        let expected = geometry.index_offset(position.other());
        if otheroff != expected {
            return Err(DecodeError::BadSiblingOffset {
                position,
                actual: otheroff,
                expected,
            });
        }

        let mysize = read_u64(block, OFF_MYSIZE);
        if mysize > geometry.index_size || mysize < INDEX_HEADER_SIZE {
            return Err(DecodeError::BadSize {
                position,
                actual: mysize,
                min: INDEX_HEADER_SIZE,
                max: geometry.index_size,
            });
        }

        let nslot = read_u32(block, OFF_NSLOT);
        if !geometry.fits(nslot) {
            return Err(DecodeError::SlotOverflow {
                position,
                nslot,
                config_size: geometry.config_size,
            });
        }

        let bitmap_len = (nslot as usize).div_ceil(8);
        let free = block[OFF_FREE..OFF_FREE + bitmap_len].to_vec();

        let mut flags = [0u8; 3];
        flags.copy_from_slice(&block[OFF_FLAGS..OFF_FLAGS + 3]);

        Ok(Self {
            position,
            flags,
            label_size: geometry.label_size,
            seq,
            myoff,
            mysize,
            otheroff,
            labeloff: read_u64(block, OFF_LABELOFF),
            nslot,
            major,
            minor,
            checksum: stored,
            free,
        })
    }

    /// Masked sequence number used for current-block selection.
    pub fn sequence(&self) -> Seq {
        Seq::from_raw(self.seq)
    }

    /// Known format version, if the block declares one.
    pub fn version(&self) -> Option<LabelVersion> {
        LabelVersion::from_parts(self.major, self.minor)
    }

    /// Whether the free bitmap marks `slot` as unused.
    pub fn is_slot_free(&self, slot: u32) -> bool {
        if slot >= self.nslot {
            return false;
        }
        let byte = self.free[(slot / 8) as usize];
        byte & (1 << (slot % 8)) != 0
    }

    /// Number of slots the free bitmap marks as unused.
    pub fn free_slot_count(&self) -> u32 {
        (0..self.nslot).filter(|slot| self.is_slot_free(*slot)).count() as u32
    }
}

/// Builds a fresh index block for `version` at `position`.
///
/// The block gets the signature, the version's label-size code, offsets
/// derived from `config_size`, an all-free bitmap for `nslot` slots and a
/// freshly computed checksum.
///
/// # Errors
///
/// `GeometryError` when the version's label size cannot fit `config_size`
/// or `nslot` exceeds the derived slot count.
pub fn encode_index(
    version: LabelVersion,
    position: IndexPosition,
    seq: Seq,
    nslot: u32,
    config_size: u64,
) -> GeometryResult<Vec<u8>> {
    let geometry = Geometry::derive(config_size, version.label_size())?;
    let nslot = geometry.resolve_slots(Some(nslot))?;
    Ok(encode_with_geometry(&geometry, version, position, seq, nslot))
}

/// Builds an index block against an already derived layout.
///
/// The caller guarantees `nslot <= geometry.nslot` and that the geometry
/// was derived for `version`'s label size.
pub(crate) fn encode_with_geometry(
    geometry: &Geometry,
    version: LabelVersion,
    position: IndexPosition,
    seq: Seq,
    nslot: u32,
) -> Vec<u8> {
    let mut block = vec![0u8; geometry.index_size as usize];

    block[..SIG_LEN].copy_from_slice(INDEX_SIGNATURE);
    block[OFF_LABELSIZE] = version.label_size().code();
    block[OFF_SEQ..OFF_SEQ + 4].copy_from_slice(&seq.value().to_le_bytes());
    block[OFF_MYOFF..OFF_MYOFF + 8].copy_from_slice(&geometry.index_offset(position).to_le_bytes());
    block[OFF_MYSIZE..OFF_MYSIZE + 8].copy_from_slice(&geometry.index_size.to_le_bytes());
    block[OFF_OTHEROFF..OFF_OTHEROFF + 8]
        .copy_from_slice(&geometry.index_offset(position.other()).to_le_bytes());
    block[OFF_LABELOFF..OFF_LABELOFF + 8].copy_from_slice(&geometry.label_offset().to_le_bytes());
    block[OFF_NSLOT..OFF_NSLOT + 4].copy_from_slice(&nslot.to_le_bytes());
    block[OFF_MAJOR..OFF_MAJOR + 2].copy_from_slice(&version.major().to_le_bytes());
    block[OFF_MINOR..OFF_MINOR + 2].copy_from_slice(&version.minor().to_le_bytes());

    let full_bytes = (nslot / 8) as usize;
    block[OFF_FREE..OFF_FREE + full_bytes].fill(0xff);
    let tail_bits = nslot % 8;
    if tail_bits != 0 {
        block[OFF_FREE + full_bytes] = (1u8 << tail_bits) - 1;
    }

    let mut hasher = Hasher::new();
    hasher.update(&block);
    let checksum = hasher.finalize();
    block[OFF_CHECKSUM..OFF_CHECKSUM + 8].copy_from_slice(&checksum.to_le_bytes());

    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::errors::GeometryError;

    const CONFIG_SIZE: u64 = 131072;

    fn geometry(version: LabelVersion) -> Geometry {
        Geometry::derive(CONFIG_SIZE, version.label_size()).unwrap()
    }

    #[test]
    fn test_round_trip_all_versions_and_positions() {
        for version in [LabelVersion::V1_1, LabelVersion::V1_2] {
            let geometry = geometry(version);
            for position in IndexPosition::BOTH {
                for (seq, nslot) in [(1u32, 2u32), (2, 17), (3, geometry.nslot)] {
                    let bytes =
                        encode_index(version, position, Seq::from_raw(seq), nslot, CONFIG_SIZE).unwrap();
                    assert_eq!(bytes.len(), geometry.index_size as usize);

                    let block = IndexBlock::decode(&bytes, position, &geometry).unwrap();
                    assert_eq!(block.version(), Some(version));
                    assert_eq!(block.position, position);
                    assert_eq!(block.sequence(), Seq::from_raw(seq));
                    assert_eq!(block.nslot, nslot);
                    assert_eq!(block.labeloff, geometry.label_offset());
                    assert_eq!(block.free_slot_count(), nslot);
                }
            }
        }
    }

    #[test]
    fn test_single_bit_flip_rejected() {
        let geometry = geometry(LabelVersion::V1_1);
        let bytes = encode_index(LabelVersion::V1_1, IndexPosition::First, Seq::from_raw(3), 64, CONFIG_SIZE).unwrap();

        for byte in (0..bytes.len()).filter(|b| !(OFF_CHECKSUM..OFF_CHECKSUM + 8).contains(b)) {
            for bit in 0..8 {
                let mut corrupt = bytes.clone();
                corrupt[byte] ^= 1 << bit;
                assert!(
                    IndexBlock::decode(&corrupt, IndexPosition::First, &geometry).is_err(),
                    "flip at byte {} bit {} accepted",
                    byte,
                    bit
                );
            }
        }
    }

    #[test]
    fn test_bad_signature() {
        let geometry = geometry(LabelVersion::V1_1);
        let mut bytes = encode_index(LabelVersion::V1_1, IndexPosition::First, Seq::from_raw(1), 8, CONFIG_SIZE).unwrap();
        bytes[0] = b'X';
        assert_eq!(
            IndexBlock::decode(&bytes, IndexPosition::First, &geometry),
            Err(DecodeError::BadSignature {
                position: IndexPosition::First
            })
        );
    }

    #[test]
    fn test_wrong_position_rejected() {
        let geometry = geometry(LabelVersion::V1_1);
        let bytes = encode_index(LabelVersion::V1_1, IndexPosition::First, Seq::from_raw(1), 8, CONFIG_SIZE).unwrap();
        let err = IndexBlock::decode(&bytes, IndexPosition::Second, &geometry).unwrap_err();
        assert!(matches!(err, DecodeError::BadSelfOffset { .. }));
    }

    #[test]
    fn test_label_size_mismatch() {
        let small = geometry(LabelVersion::V1_1);
        let bytes = encode_index(LabelVersion::V1_2, IndexPosition::First, Seq::from_raw(1), 8, CONFIG_SIZE).unwrap();
        let err = IndexBlock::decode(&bytes, IndexPosition::First, &small).unwrap_err();
        assert_eq!(
            err,
            DecodeError::LabelSizeMismatch {
                position: IndexPosition::First,
                declared: 256,
                assumed: 128,
            }
        );
    }

    #[test]
    fn test_pre_1_2_ignores_labelsize_code() {
        let geometry = geometry(LabelVersion::V1_1);
        let mut bytes = encode_index(LabelVersion::V1_1, IndexPosition::First, Seq::from_raw(1), 8, CONFIG_SIZE).unwrap();
        bytes[OFF_LABELSIZE] = 1;
        let sum = checksum_with_field_zeroed(&bytes, OFF_CHECKSUM);
        bytes[OFF_CHECKSUM..OFF_CHECKSUM + 8].copy_from_slice(&sum.to_le_bytes());

        let block = IndexBlock::decode(&bytes, IndexPosition::First, &geometry).unwrap();
        assert_eq!(block.label_size, LabelSize::Small);
    }

    #[test]
    fn test_zero_sequence_rejected() {
        let geometry = geometry(LabelVersion::V1_1);
        let bytes = encode_index(LabelVersion::V1_1, IndexPosition::First, Seq::INVALID, 8, CONFIG_SIZE).unwrap();
        let err = IndexBlock::decode(&bytes, IndexPosition::First, &geometry).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidSequence { seq: 0, .. }));
    }

    #[test]
    fn test_slot_overflow_rejected() {
        let geometry = geometry(LabelVersion::V1_1);
        let mut bytes = encode_index(LabelVersion::V1_1, IndexPosition::First, Seq::from_raw(2), 8, CONFIG_SIZE).unwrap();
        bytes[OFF_NSLOT..OFF_NSLOT + 4].copy_from_slice(&(geometry.nslot + 1).to_le_bytes());
        let sum = checksum_with_field_zeroed(&bytes, OFF_CHECKSUM);
        bytes[OFF_CHECKSUM..OFF_CHECKSUM + 8].copy_from_slice(&sum.to_le_bytes());

        let err = IndexBlock::decode(&bytes, IndexPosition::First, &geometry).unwrap_err();
        assert!(matches!(err, DecodeError::SlotOverflow { .. }));
    }

    #[test]
    fn test_truncated_input() {
        let geometry = geometry(LabelVersion::V1_1);
        let err = IndexBlock::decode(&[0u8; 100], IndexPosition::First, &geometry).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { actual: 100, .. }));
    }

    #[test]
    fn test_free_bitmap_padding_bits_clear() {
        let geometry = geometry(LabelVersion::V1_1);
        let bytes = encode_index(LabelVersion::V1_1, IndexPosition::First, Seq::from_raw(1), 11, CONFIG_SIZE).unwrap();
        assert_eq!(bytes[OFF_FREE], 0xff);
        assert_eq!(bytes[OFF_FREE + 1], 0b0000_0111);
        assert!(bytes[OFF_FREE + 2..].iter().all(|b| *b == 0));

        let block = IndexBlock::decode(&bytes, IndexPosition::First, &geometry).unwrap();
        assert!(block.is_slot_free(10));
        assert!(!block.is_slot_free(11));
    }

    #[test]
    fn test_encode_rejects_oversized_slot_count() {
        let geometry = geometry(LabelVersion::V1_2);
        let err = encode_index(LabelVersion::V1_2, IndexPosition::First, Seq::from_raw(1), geometry.nslot + 1, CONFIG_SIZE)
            .unwrap_err();
        assert!(matches!(err, GeometryError::TooManySlots { .. }));
    }

    #[test]
    fn test_peek_and_guess() {
        let v11 = encode_index(LabelVersion::V1_1, IndexPosition::First, Seq::from_raw(3), 8, CONFIG_SIZE).unwrap();
        let v12 = encode_index(LabelVersion::V1_2, IndexPosition::Second, Seq::from_raw(2), 8, CONFIG_SIZE).unwrap();

        let a = IndexHeader::peek(&v11).unwrap();
        let b = IndexHeader::peek(&v12).unwrap();
        assert_eq!(a.signature, "NAMESPACE_INDEX");
        assert_eq!(b.declared_label_size(), 256);

        // tie defaults to 128
        assert_eq!(guess_label_size([&a, &b]), LabelSize::Small);
        assert_eq!(guess_label_size([&b, &b]), LabelSize::Large);
        assert!(IndexHeader::peek(&[0u8; 10]).is_none());
    }
}
