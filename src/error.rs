use std::io;
use thiserror::Error;

use crate::storage::PageId;

/// Engine-wide error taxonomy. Errors bubble up the operator chain
/// unmodified; an `Err` from any iterator call ends that stream.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("malformed data: {0}")]
    MalformedData(String),

    #[error("illegal operation: {0}")]
    IllegalOperation(String),

    #[error("page full: page {0} has no free slot")]
    PageFull(PageId),

    #[error("tuple not found: {0}")]
    TupleNotFound(String),

    #[error("incompatible types: {0}")]
    IncompatibleTypes(String),

    #[error("buffer pool is full")]
    BufferFull,

    #[error("field not found: {0}")]
    FieldNotFound(String),
}

pub type DbResult<T> = Result<T, DbError>;
