//! Index block sequence numbers
//!
//! A sequence number is a 2-bit generation counter. Zero means "never
//! written"; valid values cycle 1 -> 2 -> 3 -> 1. Of two valid index
//! blocks the one whose sequence number is the successor of the other's
//! is the newer.

use std::fmt;

use serde::Serialize;

/// Mask applied to the on-media `seq` field before any comparison.
pub const SEQ_MASK: u32 = 0x3;

/// A masked 2-bit sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Seq(u32);

impl Seq {
    /// The invalid / never-written sentinel.
    pub const INVALID: Seq = Seq(0);

    /// Masks a raw on-media value.
    pub fn from_raw(raw: u32) -> Self {
        Seq(raw & SEQ_MASK)
    }

    pub fn value(self) -> u32 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Successor in the 1 -> 2 -> 3 -> 1 cycle. The sentinel maps to itself.
    pub fn next(self) -> Seq {
        const NEXT: [u32; 4] = [0, 2, 3, 1];
        Seq(NEXT[self.0 as usize])
    }

    /// Picks the newer of two sequence numbers.
    ///
    /// Returns `b` when `a` is invalid or equal to `b`, `a` when `b` is
    /// invalid, `b` when it is `a`'s successor and `a` otherwise.
    pub fn best(a: Seq, b: Seq) -> Seq {
        if !a.is_valid() || a == b {
            b
        } else if !b.is_valid() {
            a
        } else if a.next() == b {
            b
        } else {
            a
        }
    }
}

impl fmt::Display for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
