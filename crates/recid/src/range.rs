use crate::{
    cursor::{Cursor, CursorError},
    id::{RecordId, RecordIdError},
    obs::metrics,
};
use serde::{Deserialize, Deserializer, Serialize};

///
/// RecordIdRange
///
/// Contiguous half-open run `[start, end)` of record identifiers.
///
/// A range is the compact form of "all record handles from a source":
/// membership and offset math are O(1), and materializing a
/// [`crate::set::RecordIdSet`] from it is only needed when the consumer will
/// prune. Inverted bounds normalize to an empty range anchored at `start`.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub struct RecordIdRange {
    start: u64,
    end: u64,
}

impl RecordIdRange {
    #[must_use]
    pub const fn new(start: RecordId, end: RecordId) -> Self {
        let start = start.index();
        let end = end.index();

        if end < start {
            Self { start, end: start }
        } else {
            Self { start, end }
        }
    }

    #[must_use]
    pub const fn empty() -> Self {
        Self { start: 0, end: 0 }
    }

    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end - self.start
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[must_use]
    pub const fn contains(&self, id: RecordId) -> bool {
        let index = id.index();
        self.start <= index && index < self.end
    }

    #[must_use]
    pub const fn first(&self) -> Option<RecordId> {
        if self.is_empty() {
            None
        } else {
            Some(RecordId::from_index(self.start))
        }
    }

    #[must_use]
    pub const fn last(&self) -> Option<RecordId> {
        if self.is_empty() {
            None
        } else {
            Some(RecordId::from_index(self.end - 1))
        }
    }

    /// Return the id at `offset` from the start of the range.
    #[must_use]
    pub const fn get(&self, offset: u64) -> Option<RecordId> {
        if offset < self.len() {
            Some(RecordId::from_index(self.start + offset))
        } else {
            None
        }
    }

    /// Return the offset of `id` within the range.
    #[must_use]
    pub const fn offset_of(&self, id: RecordId) -> Option<u64> {
        if self.contains(id) {
            Some(id.index() - self.start)
        } else {
            None
        }
    }

    /// Open a read-only cursor over the range.
    #[must_use]
    pub fn cursor(&self) -> RangeCursor {
        metrics::record_cursor_open(false);

        RangeCursor {
            range: *self,
            pos: RangePosition::BeforeFirst,
            scanned: 0,
        }
    }

    /// Plain iterator over the ids in ascending order.
    pub fn iter(&self) -> std::iter::Map<std::ops::Range<u64>, fn(u64) -> RecordId> {
        (self.start..self.end).map(RecordId::from_index as fn(u64) -> RecordId)
    }
}

impl IntoIterator for RecordIdRange {
    type Item = RecordId;
    type IntoIter = std::iter::Map<std::ops::Range<u64>, fn(u64) -> RecordId>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for &RecordIdRange {
    type Item = RecordId;
    type IntoIter = std::iter::Map<std::ops::Range<u64>, fn(u64) -> RecordId>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// Normalize through `new` so inverted bounds cannot enter via the wire.
impl<'de> Deserialize<'de> for RecordIdRange {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            start: u64,
            end: u64,
        }

        let raw = Raw::deserialize(deserializer)?;

        Ok(Self::new(
            RecordId::from_index(raw.start),
            RecordId::from_index(raw.end),
        ))
    }
}

///
/// RangePosition
///
/// Offsets are `u64` because a range can span more ids than `usize` holds on
/// narrow targets.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum RangePosition {
    BeforeFirst,
    At(u64),
    Exhausted,
}

///
/// RangeCursor
///
/// Read-only cursor over a range. Ranges are `Copy`, so the cursor owns its
/// bounds and never dangles.
///

pub struct RangeCursor {
    range: RecordIdRange,
    pos: RangePosition,
    scanned: u64,
}

impl Cursor for RangeCursor {
    fn advance(&mut self) -> bool {
        let next = match self.pos {
            RangePosition::BeforeFirst => Some(0),
            RangePosition::At(offset) => offset.checked_add(1),
            RangePosition::Exhausted => None,
        };

        self.pos = match next {
            Some(offset) if offset < self.range.len() => RangePosition::At(offset),
            _ => RangePosition::Exhausted,
        };

        if let RangePosition::At(_) = self.pos {
            self.scanned = self.scanned.saturating_add(1);
            true
        } else {
            false
        }
    }

    fn is_valid(&self) -> bool {
        matches!(self.pos, RangePosition::At(_))
    }

    fn get(&self) -> Result<RecordId, CursorError> {
        match self.pos {
            RangePosition::At(offset) => self.range.get(offset).ok_or(CursorError::NotPositioned),
            _ => Err(CursorError::NotPositioned),
        }
    }
}

impl Drop for RangeCursor {
    fn drop(&mut self) {
        metrics::record_scan(self.scanned);
    }
}

///
/// RangeAllocator
///
/// Monotone allocator over the unallocated handle space. Hands out
/// non-overlapping ranges and never reuses a handle.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct RangeAllocator {
    next: u64,
}

impl RangeAllocator {
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    #[must_use]
    pub const fn starting_at(id: RecordId) -> Self {
        Self { next: id.index() }
    }

    /// Allocate the next `count` consecutive ids as a range.
    pub const fn allocate(&mut self, count: u64) -> Result<RecordIdRange, RecordIdError> {
        let Some(end) = self.next.checked_add(count) else {
            return Err(RecordIdError::SpaceExhausted);
        };

        let range = RecordIdRange {
            start: self.next,
            end,
        };
        self.next = end;

        Ok(range)
    }

    /// Total ids handed out so far (equivalently, the next unallocated
    /// handle).
    #[must_use]
    pub const fn allocated(&self) -> u64 {
        self.next
    }
}

///
/// TESTS
///
