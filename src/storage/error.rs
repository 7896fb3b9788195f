//! Storage layer error types.

use crate::storage::page::PageId;
use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Page is full: requires {required} bytes but only {available} available")]
    PageFull { required: usize, available: usize },

    #[error("Tuple needs {required} bytes but a slot holds {available}")]
    TupleTooLarge { required: usize, available: usize },

    #[error("Page not found: {0}")]
    PageNotFound(PageId),

    #[error("Page id {0} is outside the addressable id range")]
    PageIdOutOfRange(PageId),

    #[error("Short read on page {page_id}: expected {expected} bytes, got {actual}")]
    ShortRead {
        page_id: PageId,
        expected: usize,
        actual: usize,
    },

    #[error("Buffer pool exhausted: all {capacity} frames are pinned")]
    BufferExhausted { capacity: usize },

    #[error("Malformed tuple: {0}")]
    MalformedTuple(String),

    #[error("Corrupt page {page_id}: {reason}")]
    CorruptPage { page_id: PageId, reason: String },

    #[error("Failed to flush page {page_id} before eviction")]
    FlushFailed {
        page_id: PageId,
        #[source]
        source: Box<StorageError>,
    },

    #[error("Page {0} is not resident in the buffer pool")]
    PageNotResident(PageId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
