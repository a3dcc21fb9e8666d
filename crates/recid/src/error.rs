use crate::{cursor::CursorError, id::RecordIdError};
use thiserror::Error as ThisError;

///
/// Error
///
/// Crate-level error surface aggregating the module errors.
///
/// Every variant is a protocol misuse by calling code, never a transient or
/// data-dependent condition; nothing here is retried internally. Aliasing a
/// mutating cursor has no variant at all: cursor construction borrows the
/// set exclusively, so the compiler rejects it before it can fail.
///

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    RecordId(#[from] RecordIdError),

    #[error(transparent)]
    Cursor(#[from] CursorError),
}

///
/// TESTS
///
