//! # Storage Description
//!
//! Per-file state shared by the block log and every index.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::adapters::file_io;
use crate::domain::errors::{Result, StorageError};

/// Which file a description belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageType {
    /// The append-only block log.
    BlockLog,
    /// Block number -> log offset.
    BlockLogIdx,
    /// Block number -> (block id, signing key).
    HashIdx,
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageType::BlockLog => write!(f, "block log"),
            StorageType::BlockLogIdx => write!(f, "block log index"),
            StorageType::HashIdx => write!(f, "hash index"),
        }
    }
}

/// Reconciliation status of an index relative to the block log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageStatus {
    /// Consistent with the log; nothing to do.
    #[default]
    None,
    /// No records while the log has blocks; full rebuild.
    Empty,
    /// Unusable (diverged, torn or longer than the log); full rebuild.
    Reopen,
    /// A valid prefix of the log; rebuild can continue after its last record.
    Resume,
}

/// State of one on-disk file.
///
/// `size` only grows through appends after startup and is published with
/// release ordering after the bytes it covers have been written, so a reader
/// that observes a size can read every byte below it.
#[derive(Debug)]
pub struct StorageDescription {
    /// Kind of file.
    pub storage_type: StorageType,
    /// Location on disk.
    pub path: PathBuf,
    /// Reconciliation status, set by `prepare`.
    pub status: StorageStatus,
    /// Blocks this file is behind the log head, set by `prepare`.
    pub diff: u64,
    /// Log offset of the last indexed block (position index only), set by `prepare`.
    pub pos: u64,
    file: Option<File>,
    size: AtomicU64,
}

impl StorageDescription {
    /// Create a closed description for `path`.
    pub fn new(storage_type: StorageType, path: impl Into<PathBuf>) -> Self {
        Self {
            storage_type,
            path: path.into(),
            status: StorageStatus::None,
            diff: 0,
            pos: 0,
            file: None,
            size: AtomicU64::new(0),
        }
    }

    /// Open (or create) the backing file and read its size.
    pub fn open(&mut self) -> Result<()> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        let size = file_io::file_size(&file)?;

        self.file = Some(file);
        self.size.store(size, Ordering::Release);
        self.status = StorageStatus::None;
        self.diff = 0;
        self.pos = 0;
        Ok(())
    }

    /// Point the description at a new path. The file must be closed.
    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        debug_assert!(self.file.is_none());
        self.path = path.into();
    }

    /// Release the file handle. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.file = None;
    }

    /// Whether the file is open.
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// The open file handle.
    pub fn file(&self) -> Result<&File> {
        self.file.as_ref().ok_or_else(|| StorageError::NotOpen {
            path: self.path.clone(),
        })
    }

    /// Size in bytes covered by completed writes.
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    /// Publish a new size after the bytes below it are written.
    pub(crate) fn publish_size(&self, size: u64) {
        self.size.store(size, Ordering::Release);
    }

    /// Re-read the size from the file system.
    pub fn refresh_size(&self) -> Result<u64> {
        let size = file_io::file_size(self.file()?)?;
        self.publish_size(size);
        Ok(size)
    }

    /// Drop all contents of the file.
    pub fn truncate(&mut self) -> Result<()> {
        self.file()?.set_len(0)?;
        self.publish_size(0);
        Ok(())
    }

    /// Flush file contents and metadata to disk.
    pub fn sync(&self) -> Result<()> {
        self.file()?.sync_all()?;
        Ok(())
    }

    /// Path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
