use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

///
/// RecordIdError
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, ThisError)]
pub enum RecordIdError {
    #[error("invalid record id: negative handle {handle}")]
    NegativeHandle { handle: i64 },

    #[error("invalid record id encoding: {len} bytes (expected 8)")]
    InvalidSize { len: usize },

    #[error("record id space exhausted")]
    SpaceExhausted,
}

///
/// RecordId
///
/// Opaque handle referencing one stored record.
///
/// Identity is the wrapped handle value; two ids are equal iff they wrap the
/// same handle. The record payload is owned by the storage layer, never by
/// the id. Ordering and hashing follow the handle, so ids can back sorted
/// structures and map keys directly.
///

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, Eq, Hash, Ord, PartialEq, PartialOrd,
    Serialize,
)]
#[repr(transparent)]
pub struct RecordId(u64);

impl RecordId {
    /// Fixed serialized size (do not change without migrating embedded keys)
    pub const STORED_SIZE: usize = 8;

    pub const MIN: Self = Self(u64::MIN);
    pub const MAX: Self = Self(u64::MAX);

    #[must_use]
    pub const fn from_index(index: u64) -> Self {
        Self(index)
    }

    /// Validate a signed handle from an external source.
    pub const fn try_from_handle(handle: i64) -> Result<Self, RecordIdError> {
        if handle < 0 {
            return Err(RecordIdError::NegativeHandle { handle });
        }

        Ok(Self(handle.cast_unsigned()))
    }

    #[must_use]
    pub const fn index(self) -> u64 {
        self.0
    }

    /// Big-endian encoding, so byte order matches `Ord`.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; Self::STORED_SIZE] {
        self.0.to_be_bytes()
    }

    pub const fn try_from_bytes(bytes: &[u8]) -> Result<Self, RecordIdError> {
        if bytes.len() != Self::STORED_SIZE {
            return Err(RecordIdError::InvalidSize { len: bytes.len() });
        }

        let mut buf = [0u8; Self::STORED_SIZE];
        buf.copy_from_slice(bytes);

        Ok(Self(u64::from_be_bytes(buf)))
    }
}

impl From<u64> for RecordId {
    fn from(index: u64) -> Self {
        Self(index)
    }
}

impl From<u32> for RecordId {
    fn from(index: u32) -> Self {
        Self(u64::from(index))
    }
}

impl From<RecordId> for u64 {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

impl TryFrom<i64> for RecordId {
    type Error = RecordIdError;

    fn try_from(handle: i64) -> Result<Self, Self::Error> {
        Self::try_from_handle(handle)
    }
}

impl TryFrom<&[u8]> for RecordId {
    type Error = RecordIdError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::try_from_bytes(bytes)
    }
}

///
/// TESTS
///
