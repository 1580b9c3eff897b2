//! On-media label format for NVDIMM namespace metadata
//!
//! The label storage area holds two redundant index blocks followed by an
//! array of fixed-size label slots. This module owns the byte layouts and
//! their validation; it never talks to a device.
//!
//! # Invariants Enforced
//!
//! - Every index block is verified against its fletcher64 checksum
//! - Offsets, sizes and slot counts must agree with the derived geometry
//! - Sequence number 0 is never accepted as valid
//! - A slot is occupied only when it self-reports its own array index

pub mod checksum;
mod errors;
mod geometry;
mod index;
mod sequence;
mod slot;

pub use checksum::{fletcher64, Hasher};
pub use errors::{DecodeError, DecodeResult, GeometryError, GeometryResult};
pub use geometry::{index_size, Geometry, LabelSize, LabelVersion, INDEX_ALIGN, INDEX_HEADER_SIZE, MIN_SLOTS};
pub use index::{encode_index, guess_label_size, IndexBlock, IndexHeader, IndexPosition, INDEX_SIGNATURE, OFF_CHECKSUM};
pub use sequence::{Seq, SEQ_MASK};
pub use slot::{decode_slots, label_checksum_valid, Label, LabelExtension, LabelFlags, NAME_LEN};

pub(crate) use index::encode_with_geometry;
