//! Identifier substrate for index maintenance: record handles, deduplicated
//! handle sets, and forward-only cursors that support removal mid-scan.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod cursor;
pub mod error;
pub mod id;
pub mod obs;
pub mod range;
pub mod set;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, allocators, or observability helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        cursor::{Cursor, CursorMut},
        id::RecordId,
        range::RecordIdRange,
        set::RecordIdSet,
    };
}
