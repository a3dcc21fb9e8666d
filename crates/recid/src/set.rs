use crate::{
    cursor::{Cursor, CursorError, CursorMut, Position},
    id::RecordId,
    obs::metrics,
    range::RecordIdRange,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{
    collections::{HashMap, hash_map::Entry},
    fmt,
};
use xxhash_rust::xxh3::Xxh3Builder;

///
/// RecordIdSet
///
/// Deduplicated set of record identifiers sized for index maintenance.
///
/// - Backing layout is a dense slot array plus an id → slot map: insertion
///   appends, membership is one hash probe, and removal swap-fills the
///   vacated slot instead of shifting the tail.
/// - Iteration order is implementation-defined and NOT stable across
///   removals; downstream logic must not depend on it.
/// - `cursor_mut` is the supported way to prune while scanning. It takes the
///   set by exclusive borrow, so a second cursor or any direct mutation
///   during the scan is a compile-time error.
///

#[derive(Clone)]
pub struct RecordIdSet {
    slots: Vec<RecordId>,
    index: HashMap<RecordId, usize, Xxh3Builder>,
}

impl RecordIdSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::with_hasher(Xxh3Builder::new()),
        }
    }

    /// Create an empty set with room for `capacity` ids.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            index: HashMap::with_capacity_and_hasher(capacity, Xxh3Builder::new()),
        }
    }

    /// Build a set, discarding duplicate ids.
    #[must_use]
    pub fn from_ids(ids: Vec<RecordId>) -> Self {
        let mut set = Self::with_capacity(ids.len());
        for id in ids {
            set.insert(id);
        }
        set
    }

    /// Materialize a contiguous id range into a set.
    #[must_use]
    pub fn from_range(range: RecordIdRange) -> Self {
        range.into_iter().collect()
    }

    /// Return the number of live ids in the set.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the set is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Insert an id, returning `true` if it was newly inserted.
    pub fn insert(&mut self, id: RecordId) -> bool {
        let inserted = match self.index.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(self.slots.len());
                self.slots.push(id);
                true
            }
        };

        metrics::record_insert(inserted);
        inserted
    }

    /// Remove an id directly, returning `true` if it was present.
    ///
    /// Usable only while no cursor is active; the borrow checker enforces
    /// this against `cursor_mut`.
    pub fn remove(&mut self, id: RecordId) -> bool {
        let slot = self.index.get(&id).copied();
        let removed = match slot {
            Some(slot) => {
                self.detach(slot);
                true
            }
            None => false,
        };

        metrics::record_remove(removed);
        removed
    }

    /// Returns `true` if the set contains the id.
    #[must_use]
    pub fn contains(&self, id: RecordId) -> bool {
        self.index.contains_key(&id)
    }

    /// Clear all ids from the set.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
    }

    /// Plain iterator over the ids in slot order.
    pub fn iter(&self) -> std::iter::Copied<std::slice::Iter<'_, RecordId>> {
        self.slots.iter().copied()
    }

    /// Open a read-only cursor over the contents at call time.
    ///
    /// Multiple simultaneous read-only cursors are permitted and
    /// independent.
    #[must_use]
    pub fn cursor(&self) -> SetCursor<'_> {
        metrics::record_cursor_open(false);

        SetCursor {
            slots: &self.slots,
            pos: Position::BeforeFirst,
            scanned: 0,
        }
    }

    /// Open the single mutating cursor.
    ///
    /// The exclusive borrow keeps every other access path to the set out for
    /// the cursor's lifetime, including a second cursor of either kind.
    #[must_use]
    pub fn cursor_mut(&mut self) -> SetCursorMut<'_> {
        metrics::record_cursor_open(true);

        SetCursorMut {
            set: self,
            pos: Position::BeforeFirst,
            scanned: 0,
        }
    }

    /// Swap-remove the id at `slot` and repoint the id swapped into it.
    fn detach(&mut self, slot: usize) -> RecordId {
        let id = self.slots.swap_remove(slot);
        self.index.remove(&id);

        if let Some(moved) = self.slots.get(slot).copied()
            && let Some(pos) = self.index.get_mut(&moved)
        {
            *pos = slot;
        }

        id
    }

    #[cfg(any(test, debug_assertions))]
    #[allow(dead_code)]
    fn assert_consistent(&self) {
        assert_eq!(self.slots.len(), self.index.len());
        for (slot, id) in self.slots.iter().enumerate() {
            assert_eq!(self.index.get(id), Some(&slot));
        }
    }
}

impl fmt::Debug for RecordIdSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.slots.iter()).finish()
    }
}

impl Default for RecordIdSet {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for RecordIdSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|id| other.contains(id))
    }
}

impl Eq for RecordIdSet {}

impl Extend<RecordId> for RecordIdSet {
    fn extend<I: IntoIterator<Item = RecordId>>(&mut self, ids: I) {
        for id in ids {
            self.insert(id);
        }
    }
}

impl FromIterator<RecordId> for RecordIdSet {
    fn from_iter<I: IntoIterator<Item = RecordId>>(ids: I) -> Self {
        let mut set = Self::new();
        set.extend(ids);
        set
    }
}

impl IntoIterator for RecordIdSet {
    type Item = RecordId;
    type IntoIter = std::vec::IntoIter<RecordId>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.into_iter()
    }
}

impl<'a> IntoIterator for &'a RecordIdSet {
    type Item = RecordId;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, RecordId>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// Canonical ascending order on the wire, so equal sets serialize identically
// regardless of slot history.
impl Serialize for RecordIdSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut ids = self.slots.clone();
        ids.sort_unstable();
        ids.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RecordIdSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ids = Vec::<RecordId>::deserialize(deserializer)?;
        Ok(Self::from_ids(ids))
    }
}

///
/// SetCursor
///
/// Read-only cursor bound to one set for its lifetime.
///

pub struct SetCursor<'a> {
    slots: &'a [RecordId],
    pos: Position,
    scanned: u64,
}

impl Cursor for SetCursor<'_> {
    fn advance(&mut self) -> bool {
        self.pos = self.pos.advanced(self.slots.len());

        if self.pos.is_valid() {
            self.scanned = self.scanned.saturating_add(1);
            true
        } else {
            false
        }
    }

    fn is_valid(&self) -> bool {
        self.pos.is_valid()
    }

    fn get(&self) -> Result<RecordId, CursorError> {
        self.pos
            .slot()
            .and_then(|slot| self.slots.get(slot).copied())
            .ok_or(CursorError::NotPositioned)
    }
}

impl Drop for SetCursor<'_> {
    fn drop(&mut self) {
        metrics::record_scan(self.scanned);
    }
}

///
/// SetCursorMut
///
/// Mutating cursor: the sole structural-change path into the set while it is
/// alive. Removal swap-fills the current slot, and the cursor re-enters that
/// slot on the next advance, so a scan-and-prune pass visits every survivor
/// exactly once.
///

pub struct SetCursorMut<'a> {
    set: &'a mut RecordIdSet,
    pos: Position,
    scanned: u64,
}

impl Cursor for SetCursorMut<'_> {
    fn advance(&mut self) -> bool {
        self.pos = self.pos.advanced(self.set.slots.len());

        if self.pos.is_valid() {
            self.scanned = self.scanned.saturating_add(1);
            true
        } else {
            false
        }
    }

    fn is_valid(&self) -> bool {
        self.pos.is_valid()
    }

    fn get(&self) -> Result<RecordId, CursorError> {
        self.pos
            .slot()
            .and_then(|slot| self.set.slots.get(slot).copied())
            .ok_or(CursorError::NotPositioned)
    }
}

impl CursorMut for SetCursorMut<'_> {
    fn remove(&mut self) -> Result<RecordId, CursorError> {
        let Some(slot) = self.pos.slot() else {
            return Err(CursorError::NotPositioned);
        };

        let id = self.set.detach(slot);
        self.pos = Position::Removed(slot);
        metrics::record_cursor_remove();

        Ok(id)
    }
}

impl Drop for SetCursorMut<'_> {
    fn drop(&mut self) {
        metrics::record_scan(self.scanned);
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn id(index: u64) -> RecordId {
        RecordId::from_index(index)
    }

    fn set_of(indexes: &[u64]) -> RecordIdSet {
        indexes.iter().copied().map(RecordId::from_index).collect()
    }

    fn members(set: &RecordIdSet) -> BTreeSet<u64> {
        set.iter().map(RecordId::index).collect()
    }

    #[test]
    fn insert_reports_membership_change() {
        let mut set = RecordIdSet::new();

        assert!(set.insert(id(7)));
        assert!(!set.insert(id(7)));
        assert_eq!(set.len(), 1);
        assert!(set.contains(id(7)));
    }

    #[test]
    fn remove_reports_presence() {
        let mut set = set_of(&[1, 2]);

        assert!(set.remove(id(1)));
        assert!(!set.remove(id(1)));
        assert_eq!(set.len(), 1);
        assert!(!set.contains(id(1)));
        assert!(set.contains(id(2)));
    }

    #[test]
    fn from_ids_discards_duplicates() {
        let set = RecordIdSet::from_ids(vec![id(1), id(1), id(2)]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn equality_ignores_slot_order() {
        let forward = set_of(&[1, 2, 3]);
        let mut shuffled = set_of(&[3, 1, 2]);

        assert_eq!(forward, shuffled);

        shuffled.remove(id(1));
        assert_ne!(forward, shuffled);
    }

    #[test]
    fn read_only_cursor_visits_membership_exactly() {
        let set = set_of(&[1, 2, 3, 4, 5]);
        let mut seen = Vec::new();

        let mut cursor = set.cursor();
        while cursor.advance() {
            seen.push(cursor.get().unwrap().index());
        }

        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn fresh_cursor_is_not_positioned() {
        let set = set_of(&[1]);
        let cursor = set.cursor();

        assert!(!cursor.is_valid());
        assert_eq!(cursor.get(), Err(CursorError::NotPositioned));
    }

    #[test]
    fn empty_set_cursor_exhausts_on_first_advance() {
        let set = RecordIdSet::new();
        let mut cursor = set.cursor();

        assert!(!cursor.advance());
        assert!(!cursor.is_valid());
        assert_eq!(cursor.get(), Err(CursorError::NotPositioned));
    }

    #[test]
    fn advance_past_exhaustion_is_a_noop() {
        let set = set_of(&[1]);
        let mut cursor = set.cursor();

        assert!(cursor.advance());
        assert!(!cursor.advance());
        assert!(!cursor.advance());
        assert!(!cursor.is_valid());
    }

    #[test]
    fn simultaneous_read_only_cursors_are_independent() {
        let set = set_of(&[1, 2]);

        let mut first = set.cursor();
        let mut second = set.cursor();

        assert!(first.advance());
        assert!(first.advance());
        assert!(second.advance());

        assert!(!first.advance());
        assert!(second.is_valid());
    }

    #[test]
    fn mutating_cursor_prunes_while_scanning() {
        let mut set = set_of(&[1, 2, 3, 4, 5]);

        let mut cursor = set.cursor_mut();
        while cursor.advance() {
            let current = cursor.get().unwrap();
            if current.index() % 2 == 0 {
                assert_eq!(cursor.remove().unwrap(), current);
            }
        }
        drop(cursor);

        assert_eq!(set.len(), 3);
        assert_eq!(members(&set), BTreeSet::from([1, 3, 5]));
    }

    #[test]
    fn remove_requires_an_advance_between_calls() {
        let mut set = set_of(&[1, 2]);
        let mut cursor = set.cursor_mut();

        assert!(cursor.advance());
        cursor.remove().unwrap();

        assert!(!cursor.is_valid());
        assert_eq!(cursor.get(), Err(CursorError::NotPositioned));
        assert_eq!(cursor.remove(), Err(CursorError::NotPositioned));

        assert!(cursor.advance());
        assert!(cursor.get().is_ok());
    }

    #[test]
    fn remove_outside_valid_state_fails() {
        let mut set = set_of(&[1]);
        let mut cursor = set.cursor_mut();

        assert_eq!(cursor.remove(), Err(CursorError::NotPositioned));

        assert!(cursor.advance());
        assert!(!cursor.advance());
        assert_eq!(cursor.remove(), Err(CursorError::NotPositioned));
    }

    #[test]
    fn removal_does_not_skip_the_swapped_in_survivor() {
        let mut set = set_of(&[10, 20, 30]);
        let mut visited = Vec::new();

        let mut cursor = set.cursor_mut();
        while cursor.advance() {
            let current = cursor.get().unwrap();
            visited.push(current.index());
            if current.index() == 10 {
                cursor.remove().unwrap();
            }
        }
        drop(cursor);

        visited.sort_unstable();
        assert_eq!(visited, vec![10, 20, 30]);
        assert_eq!(members(&set), BTreeSet::from([20, 30]));
    }

    #[test]
    fn removing_the_last_element_exhausts() {
        let mut set = set_of(&[1]);
        let mut cursor = set.cursor_mut();

        assert!(cursor.advance());
        cursor.remove().unwrap();
        assert!(!cursor.advance());
        drop(cursor);

        assert!(set.is_empty());
    }

    #[test]
    fn dropping_a_cursor_mid_scan_keeps_prior_removals() {
        let mut set = set_of(&[1, 2, 3]);

        let mut cursor = set.cursor_mut();
        assert!(cursor.advance());
        let removed = cursor.remove().unwrap();
        drop(cursor);

        assert_eq!(set.len(), 2);
        assert!(!set.contains(removed));
    }

    #[test]
    fn clear_empties_the_set() {
        let mut set = set_of(&[1, 2, 3]);
        set.clear();

        assert!(set.is_empty());
        assert!(!set.contains(id(1)));
        assert!(set.insert(id(1)));
    }

    #[test]
    fn serialization_is_canonical_and_round_trips() {
        let set = set_of(&[3, 1, 2]);

        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, "[1,2,3]");

        let decoded: RecordIdSet = serde_json::from_str("[2,1,2,3]").unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded, set);
    }

    ///
    /// PROPERTIES
    ///

    #[derive(Clone, Debug)]
    enum Op {
        Insert(u64),
        Remove(u64),
        Prune(u64),
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u64..64).prop_map(Op::Insert),
            (0u64..64).prop_map(Op::Remove),
            (1u64..6).prop_map(Op::Prune),
        ]
    }

    proptest! {
        #[test]
        fn traversal_matches_membership_at_start(
            indexes in prop::collection::vec(0u64..512, 0..64),
        ) {
            let set: RecordIdSet = indexes.iter().copied().map(RecordId::from_index).collect();
            let mut seen = Vec::new();

            let mut cursor = set.cursor();
            while cursor.advance() {
                seen.push(cursor.get().unwrap().index());
            }

            let mut deduped = seen.clone();
            deduped.sort_unstable();
            deduped.dedup();

            // no repeats, no omissions
            prop_assert_eq!(seen.len(), deduped.len());
            prop_assert_eq!(deduped, members(&set).into_iter().collect::<Vec<_>>());
        }

        #[test]
        fn scan_and_prune_keeps_exactly_the_complement(
            entries in prop::collection::btree_map(0u64..512, any::<bool>(), 0..64),
        ) {
            let mut set: RecordIdSet =
                entries.keys().copied().map(RecordId::from_index).collect();
            let mut visited = Vec::new();

            let mut cursor = set.cursor_mut();
            while cursor.advance() {
                let current = cursor.get().unwrap();
                visited.push(current.index());
                if entries[&current.index()] {
                    cursor.remove().unwrap();
                }
            }
            drop(cursor);

            // every starting element dereferenced exactly once
            visited.sort_unstable();
            let mut deduped = visited.clone();
            deduped.dedup();
            prop_assert_eq!(visited.len(), deduped.len());
            prop_assert_eq!(visited.len(), entries.len());

            let survivors = members(&set);
            let expected: BTreeSet<u64> = entries
                .iter()
                .filter(|&(_, &prune)| !prune)
                .map(|(&index, _)| index)
                .collect();
            prop_assert_eq!(survivors, expected);
        }

        #[test]
        fn set_tracks_reference_model(
            ops in prop::collection::vec(arb_op(), 0..128),
        ) {
            let mut set = RecordIdSet::new();
            let mut model = BTreeSet::new();

            for op in ops {
                match op {
                    Op::Insert(index) => {
                        let expected = model.insert(index);
                        prop_assert_eq!(set.insert(RecordId::from_index(index)), expected);
                    }
                    Op::Remove(index) => {
                        let expected = model.remove(&index);
                        prop_assert_eq!(set.remove(RecordId::from_index(index)), expected);
                    }
                    Op::Prune(divisor) => {
                        let mut cursor = set.cursor_mut();
                        while cursor.advance() {
                            if cursor.get().unwrap().index() % divisor == 0 {
                                cursor.remove().unwrap();
                            }
                        }
                        model.retain(|index| index % divisor != 0);
                    }
                }

                prop_assert_eq!(set.len(), model.len());
            }

            set.assert_consistent();
            prop_assert_eq!(members(&set), model);
        }
    }
}
