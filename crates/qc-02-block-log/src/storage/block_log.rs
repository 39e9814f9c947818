//! # Block Log File
//!
//! The append-only file of serialized blocks.
//!
//! Every record is the serialized block followed by a little-endian `u64`
//! holding the offset of the record's own start. The trailer of the last
//! record therefore locates the head block without any index.

use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use shared_types::SignedBlock;

use super::descriptor::{StorageDescription, StorageType};
use super::position_index::BlockLocation;
use super::TRAILER_SIZE;
use crate::adapters::file_io;
use crate::domain::errors::{Result, StorageError};
use crate::ports::outbound::BlockSerializer;

/// The block log and its cached head.
///
/// The head is swapped as a whole; a reader holding an `Arc` from `head()`
/// keeps a complete block while a newer head is published.
#[derive(Debug)]
pub struct BlockLogFile {
    storage: StorageDescription,
    head: ArcSwapOption<SignedBlock>,
}

impl BlockLogFile {
    /// Create a closed block log at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            storage: StorageDescription::new(StorageType::BlockLog, path),
            head: ArcSwapOption::empty(),
        }
    }

    /// Open (or create) the log file.
    pub fn open(&mut self) -> Result<()> {
        self.storage.open()
    }

    /// Release the file and forget the head. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.storage.close();
        self.head.store(None);
    }

    /// Backing file state.
    pub fn storage(&self) -> &StorageDescription {
        &self.storage
    }

    pub(crate) fn storage_mut(&mut self) -> &mut StorageDescription {
        &mut self.storage
    }

    /// Log offset where the head block starts, read from the last trailer.
    pub fn head_position(&self) -> Result<u64> {
        let size = self.storage.size();
        if size < TRAILER_SIZE {
            return Err(StorageError::EmptyLog { size });
        }
        Ok(file_io::read_u64(self.storage.file()?, size - TRAILER_SIZE)?)
    }

    /// Read the head block from disk.
    ///
    /// Startup only: a concurrent append moves the end of the file.
    pub fn read_head(&self, serializer: &dyn BlockSerializer) -> Result<SignedBlock> {
        let size = self.storage.size();
        let head_pos = self.head_position()?;
        let end = size - TRAILER_SIZE;
        if head_pos > end {
            return Err(StorageError::CorruptPosition {
                block_num: 0,
                offset: head_pos,
                next: size,
            });
        }

        let bytes = file_io::read_bytes(self.storage.file()?, head_pos, end - head_pos)?;
        Ok(serializer.deserialize(&bytes)?)
    }

    /// Raw bytes of the block at `location`.
    pub fn read(&self, location: BlockLocation) -> Result<Vec<u8>> {
        Ok(file_io::read_bytes(
            self.storage.file()?,
            location.offset,
            location.size,
        )?)
    }

    /// Append `serialized` plus its trailer at the end of the log.
    ///
    /// Returns the offset the block starts at. Single writer only; the new
    /// size becomes visible after the bytes are written.
    pub fn append(&self, serialized: &[u8]) -> Result<u64> {
        let start = self.storage.size();

        let mut record = Vec::with_capacity(serialized.len() + TRAILER_SIZE as usize);
        record.extend_from_slice(serialized);
        record.extend_from_slice(&start.to_le_bytes());

        file_io::pwrite_with_retry(self.storage.file()?, &record, start)?;
        self.storage.publish_size(start + record.len() as u64);
        Ok(start)
    }

    /// Replace the cached head.
    pub fn publish_head(&self, block: Arc<SignedBlock>) {
        self.head.store(Some(block));
    }

    /// Forget the cached head.
    pub(crate) fn clear_head(&self) {
        self.head.store(None);
    }

    /// The cached head, if the log holds any block.
    pub fn head(&self) -> Option<Arc<SignedBlock>> {
        self.head.load_full()
    }

    /// Flush log contents to disk.
    pub fn sync(&self) -> Result<()> {
        self.storage.file()?.sync_data()?;
        Ok(())
    }
}
