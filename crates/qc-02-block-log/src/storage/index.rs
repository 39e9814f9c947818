//! # Block Indexes
//!
//! Common contract of the two fixed-width, one-record-per-block index files.
//!
//! Record `N` of an index lives at byte `(N - 1) * record_size`, so the record
//! count of a healthy index always equals the highest block number it covers.

use std::fmt;
use std::io::Write;

use shared_types::SignedBlock;

use super::descriptor::{StorageDescription, StorageStatus};
use crate::adapters::file_io;
use crate::domain::errors::{Result, StorageError};

/// The fixed set of index kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    /// Block number -> log offset.
    Position,
    /// Block number -> (block id, signing key).
    Identity,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKind::Position => write!(f, "position index"),
            IndexKind::Identity => write!(f, "identity index"),
        }
    }
}

/// How the last record of an index relates to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailState {
    /// Last record describes the log head.
    Matches,
    /// Last record describes a block below the head.
    Behind,
    /// Last record does not describe any block of this log.
    Diverged,
}

/// An index kept in lockstep with the block log.
///
/// Implemented by exactly `PositionIndex` and `IdentityIndex`.
pub trait BlockIndex: Send + Sync {
    /// Which index this is.
    fn kind(&self) -> IndexKind;

    /// Width of one record in bytes.
    fn record_size(&self) -> u64;

    /// Backing file state.
    fn storage(&self) -> &StorageDescription;

    /// Backing file state (mutable, startup only).
    fn storage_mut(&mut self) -> &mut StorageDescription;

    /// Encode the record for `block`, which starts at log offset `position`.
    fn encode_record(&self, block: &SignedBlock, position: u64) -> Vec<u8>;

    /// Compare the last of `count` records against the log.
    ///
    /// `head_pos` is the log offset of the head block.
    fn inspect_tail(&mut self, count: u64, head: &SignedBlock, head_pos: u64) -> Result<TailState>;

    /// Number of complete records on disk.
    fn record_count(&self) -> u64 {
        self.storage().size() / self.record_size()
    }

    /// Open (or create) the index file.
    fn open(&mut self) -> Result<()> {
        self.storage_mut().open()
    }

    /// Close the index file. Safe to call repeatedly.
    fn close(&mut self) {
        self.storage_mut().close();
    }

    /// Decide this index's status against the log head.
    ///
    /// `head_pos` is the log offset where the head block starts.
    fn prepare(&mut self, head: &SignedBlock, head_pos: u64) -> Result<()> {
        let head_num = u64::from(head.block_num());
        let size = self.storage().size();
        let record_size = self.record_size();

        let (status, diff) = if size == 0 {
            (StorageStatus::Empty, head_num)
        } else if size % record_size != 0 {
            tracing::warn!(
                "[qc-02] {} has a torn tail ({} bytes, record size {})",
                self.kind(),
                size,
                record_size
            );
            (StorageStatus::Reopen, head_num)
        } else {
            let count = size / record_size;
            if count > head_num {
                (StorageStatus::Reopen, head_num)
            } else {
                match self.inspect_tail(count, head, head_pos)? {
                    TailState::Matches if count == head_num => (StorageStatus::None, 0),
                    TailState::Behind if count < head_num => {
                        (StorageStatus::Resume, head_num - count)
                    }
                    _ => (StorageStatus::Reopen, head_num),
                }
            }
        };

        tracing::info!(
            "[qc-02] {}: {} records, log head {}, status {:?}",
            self.kind(),
            self.record_count(),
            head_num,
            status
        );

        let storage = self.storage_mut();
        storage.status = status;
        storage.diff = diff;
        Ok(())
    }

    /// Write the record for `block` to a reconstruction stream.
    fn write(&self, stream: &mut dyn Write, block: &SignedBlock, position: u64) -> Result<()> {
        stream.write_all(&self.encode_record(block, position))?;
        Ok(())
    }

    /// Append the record for `block` during live operation.
    ///
    /// Single writer only. The record count grows only after the write completes.
    fn append(&self, block: &SignedBlock, position: u64) -> Result<()> {
        let record = self.encode_record(block, position);
        let storage = self.storage();
        let at = storage.size();
        file_io::pwrite_with_retry(storage.file()?, &record, at)?;
        storage.publish_size(at + record.len() as u64);
        Ok(())
    }

    /// Verify that the index covers exactly `block_num` blocks.
    fn check_consistency(&self, block_num: u32) -> Result<()> {
        let size = self.storage().size();
        let expected = u64::from(block_num) * self.record_size();
        if size != expected {
            tracing::error!(
                "[qc-02] {} is inconsistent with the block log: {} bytes, expected {}",
                self.kind(),
                size,
                expected
            );
            return Err(StorageError::InconsistentIndex {
                index: self.kind(),
                expected: block_num,
                actual: size / self.record_size(),
            });
        }
        Ok(())
    }

    /// Report an index that has data while the block log has none.
    fn non_empty_idx_info(&self) {
        let storage = self.storage();
        tracing::error!(
            "[qc-02] Block log is empty but {} {} holds {} bytes; it cannot be interpreted without \
             a block log and must be rebuilt or removed",
            self.kind(),
            storage.path.display(),
            storage.size()
        );
    }
}
