//! Cursor protocol for forward-only traversal of identifier collections.
//!
//! A cursor starts before the first element, is driven with `advance`, and
//! dereferences with `get` only while positioned on a live element. The
//! mutating capability is a separate trait so code holding a read-only
//! cursor cannot remove through it.

use crate::id::RecordId;
use thiserror::Error as ThisError;

///
/// CursorError
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, ThisError)]
pub enum CursorError {
    #[error("cursor is not positioned on a live element")]
    NotPositioned,
}

///
/// Cursor
///
/// Forward-only, single-pass view over a collection's contents.
///
/// State machine: before-first → valid → (valid | exhausted), terminal at
/// exhausted. Dereferencing is defined only while valid; any other state
/// fails with [`CursorError::NotPositioned`], which is a protocol misuse by
/// the caller rather than a data condition.
///

pub trait Cursor {
    /// Advance to the next live element.
    ///
    /// Returns `true` if the cursor is positioned on an element afterwards.
    /// Once exhausted, further calls are no-ops returning `false`.
    fn advance(&mut self) -> bool;

    /// Returns `true` only while positioned on a live element.
    fn is_valid(&self) -> bool;

    /// Return the identifier the cursor currently points to.
    fn get(&self) -> Result<RecordId, CursorError>;
}

///
/// CursorMut
///
/// Mutating extension of [`Cursor`].
///
/// Construction requires an exclusive borrow of the bound collection, so a
/// second cursor over the same collection (mutating or not), or any direct
/// mutation while this cursor is alive, is rejected at compile time.
///

pub trait CursorMut: Cursor {
    /// Remove the identifier the cursor currently points to.
    ///
    /// Afterwards the cursor sits between the removed element and the next
    /// one: `get` fails until `advance` repositions it. The next `advance`
    /// reaches the next surviving element without skipping or revisiting.
    fn remove(&mut self) -> Result<RecordId, CursorError>;
}

///
/// Position
///
/// Traversal state for the slot-array cursors. `Removed` is the
/// between-elements position entered by `CursorMut::remove`; the slot index
/// it carries is where the next surviving element now lives, if any.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Position {
    BeforeFirst,
    At(usize),
    Removed(usize),
    Exhausted,
}

impl Position {
    /// Transition to the next live slot, given the current slot count.
    ///
    /// `Removed(slot)` re-enters `slot` itself: swap-removal moves the next
    /// unvisited survivor into the vacated slot, so staying put is what
    /// guarantees no element is skipped.
    pub(crate) const fn advanced(self, len: usize) -> Self {
        let next = match self {
            Self::BeforeFirst => 0,
            Self::At(slot) => slot + 1,
            Self::Removed(slot) => slot,
            Self::Exhausted => return Self::Exhausted,
        };

        if next < len {
            Self::At(next)
        } else {
            Self::Exhausted
        }
    }

    pub(crate) const fn slot(self) -> Option<usize> {
        match self {
            Self::At(slot) => Some(slot),
            _ => None,
        }
    }

    pub(crate) const fn is_valid(self) -> bool {
        matches!(self, Self::At(_))
    }
}

///
/// TESTS
///
