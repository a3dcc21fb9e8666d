use serde::{Deserialize, Serialize};
use std::cell::RefCell;

///
/// EventState
/// Ephemeral, in-memory counters for identifier-set operations.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub(crate) struct EventState {
    pub ops: EventOps,
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventOps {
    // Membership mutation
    pub id_inserts: u64,
    pub id_insert_skips: u64,
    pub id_removes: u64,
    pub id_remove_misses: u64,

    // Traversal
    pub cursors_opened: u64,
    pub mut_cursors_opened: u64,
    pub ids_scanned: u64,
    pub cursor_removes: u64,
}

thread_local! {
    static EVENT_STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

/// Borrow counters immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&m.borrow()))
}

/// Borrow counters mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Reset all counters (useful in tests).
pub fn reset() {
    with_state_mut(|m| *m = EventState::default());
}

/// Record an insertion attempt and whether it changed membership.
pub(crate) fn record_insert(inserted: bool) {
    with_state_mut(|m| {
        if inserted {
            m.ops.id_inserts = m.ops.id_inserts.saturating_add(1);
        } else {
            m.ops.id_insert_skips = m.ops.id_insert_skips.saturating_add(1);
        }
    });
}

/// Record a direct removal attempt and whether the id was present.
pub(crate) fn record_remove(removed: bool) {
    with_state_mut(|m| {
        if removed {
            m.ops.id_removes = m.ops.id_removes.saturating_add(1);
        } else {
            m.ops.id_remove_misses = m.ops.id_remove_misses.saturating_add(1);
        }
    });
}

/// Record a cursor construction.
pub(crate) fn record_cursor_open(mutating: bool) {
    with_state_mut(|m| {
        if mutating {
            m.ops.mut_cursors_opened = m.ops.mut_cursors_opened.saturating_add(1);
        } else {
            m.ops.cursors_opened = m.ops.cursors_opened.saturating_add(1);
        }
    });
}

/// Record the elements dereferenced by one finished traversal.
pub(crate) fn record_scan(ids: u64) {
    with_state_mut(|m| {
        m.ops.ids_scanned = m.ops.ids_scanned.saturating_add(ids);
    });
}

/// Record a removal performed through a mutating cursor.
pub(crate) fn record_cursor_remove() {
    with_state_mut(|m| {
        m.ops.cursor_removes = m.ops.cursor_removes.saturating_add(1);
    });
}

///
/// EventReport
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventReport {
    pub counters: EventOps,
}

/// Snapshot the current counters for diagnostics surfaces.
#[must_use]
pub fn report() -> EventReport {
    EventReport {
        counters: with_state(|m| m.ops.clone()),
    }
}

///
/// TESTS
///
