//! # Position Index
//!
//! Block number -> byte offset of the block's record in the log.
//!
//! One little-endian `u64` per block, no header. A block's size is the
//! distance to the next block's offset minus the 8-byte trailer; the last
//! indexed block is bounded by the log size instead.

use std::path::PathBuf;

use shared_types::SignedBlock;

use super::descriptor::{StorageDescription, StorageType};
use super::index::{BlockIndex, IndexKind, TailState};
use crate::adapters::file_io;
use crate::domain::errors::{Result, StorageError};
use crate::storage::TRAILER_SIZE;

/// Width of one position record.
pub const POSITION_RECORD_SIZE: u64 = 8;

/// Where a block lives in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLocation {
    /// Offset of the first byte of the serialized block.
    pub offset: u64,
    /// Length of the serialized block, trailer excluded.
    pub size: u64,
}

/// Block number -> log offset index.
#[derive(Debug)]
pub struct PositionIndex {
    storage: StorageDescription,
}

impl PositionIndex {
    /// Create a closed index at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            storage: StorageDescription::new(StorageType::BlockLogIdx, path),
        }
    }

    /// Log offset recorded for `block_num`, if indexed.
    pub fn offset_of(&self, block_num: u32) -> Result<Option<u64>> {
        let count = self.record_count();
        if block_num == 0 || u64::from(block_num) > count {
            return Ok(None);
        }
        let at = (u64::from(block_num) - 1) * POSITION_RECORD_SIZE;
        Ok(Some(file_io::read_u64(self.storage.file()?, at)?))
    }

    /// Locate `block_num` in a log of `log_size` bytes.
    ///
    /// Returns `None` for block 0 and for blocks past the last record.
    pub fn read(&self, block_num: u32, log_size: u64) -> Result<Option<BlockLocation>> {
        let Some(offset) = self.offset_of(block_num)? else {
            return Ok(None);
        };

        let next = if u64::from(block_num) < self.record_count() {
            file_io::read_u64(
                self.storage.file()?,
                u64::from(block_num) * POSITION_RECORD_SIZE,
            )?
        } else {
            log_size
        };

        if next < offset + TRAILER_SIZE {
            return Err(StorageError::CorruptPosition {
                block_num,
                offset,
                next,
            });
        }

        Ok(Some(BlockLocation {
            offset,
            size: next - offset - TRAILER_SIZE,
        }))
    }
}

impl BlockIndex for PositionIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::Position
    }

    fn record_size(&self) -> u64 {
        POSITION_RECORD_SIZE
    }

    fn storage(&self) -> &StorageDescription {
        &self.storage
    }

    fn storage_mut(&mut self) -> &mut StorageDescription {
        &mut self.storage
    }

    fn encode_record(&self, _block: &SignedBlock, position: u64) -> Vec<u8> {
        position.to_le_bytes().to_vec()
    }

    fn inspect_tail(&mut self, count: u64, head: &SignedBlock, head_pos: u64) -> Result<TailState> {
        let last = file_io::read_u64(self.storage.file()?, (count - 1) * POSITION_RECORD_SIZE)?;
        self.storage.pos = last;

        let head_num = u64::from(head.block_num());
        let state = if count == head_num {
            if last == head_pos {
                TailState::Matches
            } else {
                TailState::Diverged
            }
        } else if last < head_pos {
            TailState::Behind
        } else {
            TailState::Diverged
        };
        Ok(state)
    }
}
