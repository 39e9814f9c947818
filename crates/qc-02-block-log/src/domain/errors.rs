//! # Domain Errors
//!
//! Error types for the Block Log subsystem.
//!
//! ## Design Principles
//!
//! - Partial reads and writes never surface here; `adapters::file_io` absorbs them
//! - Structural corruption and precondition failures are fatal to the caller
//! - "Block not found" is `Ok(None)`, not an error
//! - Rebuild interruption is reported in `RebuildReport`, not an error

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::IndexKind;

/// Result type alias using StorageError.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during block log operations.
#[derive(Debug, Error)]
pub enum StorageError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    /// Underlying I/O failure that survived the retry loop.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File has not been opened (or was closed).
    #[error("File is not open: {}", path.display())]
    NotOpen { path: PathBuf },

    // -------------------------------------------------------------------------
    // Structural Corruption
    // -------------------------------------------------------------------------
    /// Log is too short to hold even one trailing offset.
    #[error("Block log of {size} bytes cannot contain a head block")]
    EmptyLog { size: u64 },

    /// A trailing offset failed the monotonicity check.
    #[error("Bad block index at block {block_num}: {higher_pos} <= {block_pos}")]
    BadTrailingOffset {
        block_num: u32,
        higher_pos: u64,
        block_pos: u64,
    },

    /// Trailing offset of a replayed block does not point at the block's start.
    #[error("Block {block_num} at offset {offset} carries trailing offset {trailer}")]
    TrailerMismatch {
        block_num: u32,
        offset: u64,
        trailer: u64,
    },

    /// Record count of an index disagrees with the log head after a rebuild.
    #[error("{index} is inconsistent: expected {expected} records, found {actual}")]
    InconsistentIndex {
        index: IndexKind,
        expected: u32,
        actual: u64,
    },

    /// Position records of two neighbouring blocks do not bound a block.
    #[error("Corrupt position record for block {block_num}: offset {offset}, next {next}")]
    CorruptPosition {
        block_num: u32,
        offset: u64,
        next: u64,
    },

    // -------------------------------------------------------------------------
    // Precondition Violations
    // -------------------------------------------------------------------------
    /// Operation needs the head block but the log is empty.
    #[error("Head block is not available")]
    MissingHead,

    /// Appended block does not extend the head.
    #[error("Non-sequential block: expected {expected}, got {actual}")]
    NonSequentialBlock { expected: u32, actual: u32 },

    /// Number of open index streams differs from the number of indexes.
    #[error("Incorrect number of index streams: expected {expected}, got {actual}")]
    IndexStreamMismatch { expected: usize, actual: usize },

    /// An index stops short of the head, e.g. after an interrupted rebuild.
    #[error("{index} holds {records} records but the head is block {head_num}")]
    IndexBehindHead {
        index: IndexKind,
        records: u64,
        head_num: u32,
    },

    /// Appends are refused until a `prepare` completes again.
    #[error("Block log is not ready for appends: {reason}")]
    NotReady { reason: &'static str },

    /// Index exists although the block log is empty.
    #[error("Index {} is not empty but the block log is; an explicit rebuild is required", path.display())]
    OrphanedIndex { path: PathBuf },

    // -------------------------------------------------------------------------
    // Serialization / Locking
    // -------------------------------------------------------------------------
    /// Serialization/deserialization error.
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// The block log is locked by another process.
    #[error("Database locked: {message}")]
    DatabaseLocked { message: String },
}

impl StorageError {
    /// Whether this error indicates on-disk corruption.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            StorageError::EmptyLog { .. }
                | StorageError::BadTrailingOffset { .. }
                | StorageError::TrailerMismatch { .. }
                | StorageError::InconsistentIndex { .. }
                | StorageError::CorruptPosition { .. }
        )
    }
}

/// Serialization errors.
#[derive(Debug, Clone, Error)]
#[error("Serialization error: {message}")]
pub struct SerializationError {
    pub message: String,
}

impl From<SerializationError> for StorageError {
    fn from(err: SerializationError) -> Self {
        StorageError::Serialization {
            message: err.message,
        }
    }
}
