//! Closure rows shared by every relation type

use super::vertex::VertexId;
use serde::{Deserialize, Serialize};

/// Depth value stored in the slots of types that do not own a row.
pub const NOT_APPLICABLE: u32 = 0;

/// Depth of an explicitly inserted edge.
pub const DIRECT: u32 = 1;

/// One row of the closure table.
///
/// `depths` carries one slot per registered relation type, in registry
/// order. Exactly one slot (the owner) holds a depth `>= 1`; every other
/// slot holds [`NOT_APPLICABLE`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeRow {
    pub ancestor: VertexId,
    pub descendant: VertexId,
    pub depths: Vec<u32>,
}

impl EdgeRow {
    /// Build a row owned by `slot` with the given depth, zeroing the
    /// other `slot_count - 1` slots.
    pub fn owned(
        slot_count: usize,
        slot: usize,
        ancestor: VertexId,
        descendant: VertexId,
        depth: u32,
    ) -> Self {
        let mut depths = vec![NOT_APPLICABLE; slot_count];
        if let Some(d) = depths.get_mut(slot) {
            *d = depth;
        }
        Self {
            ancestor,
            descendant,
            depths,
        }
    }

    /// Build a direct (depth 1) row owned by `slot`
    pub fn direct(slot_count: usize, slot: usize, ancestor: VertexId, descendant: VertexId) -> Self {
        Self::owned(slot_count, slot, ancestor, descendant, DIRECT)
    }

    /// The slot that owns this row, if exactly one slot is set
    pub fn owner(&self) -> Option<usize> {
        let mut owners = self
            .depths
            .iter()
            .enumerate()
            .filter(|(_, d)| **d != NOT_APPLICABLE)
            .map(|(slot, _)| slot);
        match (owners.next(), owners.next()) {
            (Some(slot), None) => Some(slot),
            _ => None,
        }
    }

    /// Depth held in `slot` (0 when the slot does not apply)
    pub fn depth_in(&self, slot: usize) -> u32 {
        self.depths.get(slot).copied().unwrap_or(NOT_APPLICABLE)
    }

    /// True when the row belongs to `slot` and no other slot claims it
    pub fn is_claimed_only_by(&self, slot: usize) -> bool {
        self.depth_in(slot) != NOT_APPLICABLE
            && self
                .depths
                .iter()
                .enumerate()
                .all(|(i, d)| i == slot || *d == NOT_APPLICABLE)
    }

    pub fn is_direct_in(&self, slot: usize) -> bool {
        self.is_claimed_only_by(slot) && self.depth_in(slot) == DIRECT
    }

    pub fn touches(&self, vertex: &VertexId) -> bool {
        &self.ancestor == vertex || &self.descendant == vertex
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owned_row_zeroes_other_slots() {
        let row = EdgeRow::owned(3, 1, "a".into(), "b".into(), 4);
        assert_eq!(row.depths, vec![0, 4, 0]);
        assert_eq!(row.owner(), Some(1));
        assert!(row.is_claimed_only_by(1));
        assert!(!row.is_claimed_only_by(0));
        assert!(!row.is_direct_in(1));
    }

    #[test]
    fn row_claimed_by_two_slots_has_no_owner() {
        let row = EdgeRow {
            ancestor: "a".into(),
            descendant: "b".into(),
            depths: vec![1, 2],
        };
        assert_eq!(row.owner(), None);
        assert!(!row.is_claimed_only_by(0));
        assert!(!row.is_claimed_only_by(1));
    }

    #[test]
    fn depth_in_out_of_range_slot_is_not_applicable() {
        let row = EdgeRow::direct(1, 0, "a".into(), "b".into());
        assert_eq!(row.depth_in(5), NOT_APPLICABLE);
        assert!(row.touches(&"a".into()));
        assert!(!row.touches(&"c".into()));
    }
}
