//! Current index selection

use serde::Serialize;

use crate::label::{IndexBlock, IndexPosition, Seq};

/// How many index positions passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "position", rename_all = "snake_case")]
pub enum IndexState {
    Invalid,
    Single(IndexPosition),
    Both,
}

impl IndexState {
    pub fn of(blocks: &[Option<IndexBlock>; 2]) -> Self {
        match blocks {
            [None, None] => IndexState::Invalid,
            [Some(_), None] => IndexState::Single(IndexPosition::First),
            [None, Some(_)] => IndexState::Single(IndexPosition::Second),
            [Some(_), Some(_)] => IndexState::Both,
        }
    }

    pub fn num_valid(&self) -> usize {
        match self {
            IndexState::Invalid => 0,
            IndexState::Single(_) => 1,
            IndexState::Both => 2,
        }
    }
}

/// Picks the current index position.
///
/// With both positions valid the newer sequence number wins; position 1
/// is current whenever the winning number equals its own.
pub fn select_current(blocks: &[Option<IndexBlock>; 2]) -> Option<IndexPosition> {
    match blocks {
        [None, None] => None,
        [Some(_), None] => Some(IndexPosition::First),
        [None, Some(_)] => Some(IndexPosition::Second),
        [Some(first), Some(second)] => {
            let best = Seq::best(first.sequence(), second.sequence());
            if best == second.sequence() {
                Some(IndexPosition::Second)
            } else {
                Some(IndexPosition::First)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::{encode_index, Geometry, LabelVersion};

    const CONFIG_SIZE: u64 = 131072;

    fn block(position: IndexPosition, seq: u32) -> IndexBlock {
        let version = LabelVersion::V1_1;
        let geometry = Geometry::derive(CONFIG_SIZE, version.label_size()).unwrap();
        let bytes = encode_index(version, position, Seq::from_raw(seq), geometry.nslot, CONFIG_SIZE).unwrap();
        IndexBlock::decode(&bytes, position, &geometry).unwrap()
    }

    #[test]
    fn test_newer_second_wins() {
        let blocks = [Some(block(IndexPosition::First, 2)), Some(block(IndexPosition::Second, 3))];
        assert_eq!(IndexState::of(&blocks), IndexState::Both);
        assert_eq!(select_current(&blocks), Some(IndexPosition::Second));
    }

    #[test]
    fn test_fresh_init_selects_first() {
        let blocks = [Some(block(IndexPosition::First, 3)), Some(block(IndexPosition::Second, 2))];
        assert_eq!(select_current(&blocks), Some(IndexPosition::First));
    }

    #[test]
    fn test_wraparound() {
        let blocks = [Some(block(IndexPosition::First, 1)), Some(block(IndexPosition::Second, 3))];
        assert_eq!(select_current(&blocks), Some(IndexPosition::First));
    }

    #[test]
    fn test_equal_sequence_selects_second() {
        let blocks = [Some(block(IndexPosition::First, 2)), Some(block(IndexPosition::Second, 2))];
        assert_eq!(select_current(&blocks), Some(IndexPosition::Second));
    }

    #[test]
    fn test_single_and_invalid() {
        let only_second = [None, Some(block(IndexPosition::Second, 1))];
        assert_eq!(IndexState::of(&only_second), IndexState::Single(IndexPosition::Second));
        assert_eq!(select_current(&only_second), Some(IndexPosition::Second));

        let none: [Option<IndexBlock>; 2] = [None, None];
        assert_eq!(IndexState::of(&none).num_valid(), 0);
        assert_eq!(select_current(&none), None);
    }
}
