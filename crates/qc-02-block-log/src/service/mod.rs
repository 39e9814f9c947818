//! # File Manager
//!
//! Owns the block log and both indexes and serves the public API.
//!
//! ## Lifecycle
//!
//! 1. `open` / `prepare` opens every file and reconciles the indexes
//!    against the log (see `reconcile`)
//! 2. Stale indexes are rebuilt (see `rebuild`); the report is returned
//! 3. `append` and the read methods serve the node until `close`
//!
//! ## Threading
//!
//! One thread may call `append` at a time. Any number of threads may read
//! concurrently with it: sizes and the head are published only after the
//! bytes they cover are written.
//!
//! ## Readiness
//!
//! Appends are accepted only after a `prepare` whose rebuild ran to the end.
//! An interrupted rebuild, or an append that failed after touching the log,
//! leaves the manager refusing appends (`NotReady`) until the next `prepare`.
//! While an index stops short of the head, reads below the head fail with
//! `IndexBehindHead`; the head itself is always served.

mod rebuild;
mod reconcile;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use shared_types::SignedBlock;

#[cfg(feature = "locking")]
use crate::adapters::lock::BlockLogLock;
use crate::adapters::serializer::BincodeBlockSerializer;
use crate::domain::config::{identity_index_path, position_index_path, BlockLogConfig};
use crate::domain::errors::{Result, StorageError};
use crate::domain::interrupt::{InterruptCheck, InterruptFlag, InterruptSources};
use crate::domain::rebuild::RebuildReport;
use crate::ports::inbound::BlockLogApi;
use crate::ports::outbound::BlockSerializer;
use crate::storage::{
    BlockIdentity, BlockIndex, BlockLocation, BlockLogFile, IdentityIndex, PositionIndex,
};

/// The block log engine.
pub struct FileManager<BS: BlockSerializer = BincodeBlockSerializer> {
    pub(crate) config: BlockLogConfig,
    pub(crate) serializer: BS,
    pub(crate) block_log: BlockLogFile,
    pub(crate) position_index: PositionIndex,
    pub(crate) identity_index: IdentityIndex,
    pub(crate) interrupt: InterruptSources,
    pub(crate) ready: AtomicBool,
    #[cfg(feature = "locking")]
    pub(crate) lock: Option<BlockLogLock>,
}

impl FileManager<BincodeBlockSerializer> {
    /// Create a closed file manager using the bincode serializer.
    pub fn new(config: BlockLogConfig) -> Self {
        Self::with_serializer(config, BincodeBlockSerializer)
    }
}

impl<BS: BlockSerializer> FileManager<BS> {
    /// Create a closed file manager with a custom serializer.
    pub fn with_serializer(config: BlockLogConfig, serializer: BS) -> Self {
        let log_path = config.log_path();
        Self {
            block_log: BlockLogFile::new(&log_path),
            position_index: PositionIndex::new(position_index_path(&log_path)),
            identity_index: IdentityIndex::new(identity_index_path(&log_path)),
            interrupt: InterruptSources::default(),
            ready: AtomicBool::new(false),
            config,
            serializer,
            #[cfg(feature = "locking")]
            lock: None,
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &BlockLogConfig {
        &self.config
    }

    /// The block log.
    pub fn block_log(&self) -> &BlockLogFile {
        &self.block_log
    }

    /// The position index.
    pub fn position_index(&self) -> &PositionIndex {
        &self.position_index
    }

    /// The identity index.
    pub fn identity_index(&self) -> &IdentityIndex {
        &self.identity_index
    }

    /// Handle that stops a running index rebuild.
    ///
    /// Clones share state; keep one in a shutdown handler. A request stays
    /// set until `clear` is called, so every later `prepare` also stops its
    /// rebuild before the first block.
    pub fn interrupt_handle(&self) -> InterruptFlag {
        self.interrupt.flag().clone()
    }

    /// Also stop index rebuilds when the node-wide `shutdown` signal is set.
    pub fn with_interrupt(mut self, shutdown: Arc<dyn InterruptCheck>) -> Self {
        self.interrupt.attach(shutdown);
        self
    }

    /// Whether appends are accepted.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    /// Fail unless `index` holds a record for every block up to `head_num`.
    fn ensure_covers(index: &dyn BlockIndex, head_num: u32) -> Result<()> {
        let records = index.record_count();
        if records < u64::from(head_num) {
            return Err(StorageError::IndexBehindHead {
                index: index.kind(),
                records,
                head_num,
            });
        }
        Ok(())
    }

    pub(crate) fn indexes(&self) -> [&dyn BlockIndex; 2] {
        [&self.position_index, &self.identity_index]
    }

    pub(crate) fn indexes_mut(&mut self) -> [&mut dyn BlockIndex; 2] {
        [&mut self.position_index, &mut self.identity_index]
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Release every file and the process lock. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.set_ready(false);
        self.block_log.close();
        for index in self.indexes_mut() {
            index.close();
        }
        #[cfg(feature = "locking")]
        {
            self.lock = None;
        }
    }

    // =========================================================================
    // APPEND
    // =========================================================================

    /// Append `block` to the log and every index; returns its log offset.
    ///
    /// The block must extend the current head. Single writer only.
    ///
    /// A failure after the log write leaves the files out of step; the
    /// manager then refuses appends until the next `prepare` reconciles them.
    pub fn append(&self, block: &SignedBlock) -> Result<u64> {
        if !self.is_ready() {
            return Err(StorageError::NotReady {
                reason: "indexes do not cover the head; prepare again",
            });
        }
        let expected = self
            .block_log
            .head()
            .map_or(1, |head| head.block_num().wrapping_add(1));
        if block.block_num() != expected {
            return Err(StorageError::NonSequentialBlock {
                expected,
                actual: block.block_num(),
            });
        }

        let serialized = self.serializer.serialize(block)?;
        let position = self.write_records(block, &serialized).map_err(|e| {
            tracing::error!("[qc-02] Append of block {} failed: {}", expected, e);
            self.set_ready(false);
            e
        })?;

        self.block_log.publish_head(Arc::new(block.clone()));

        tracing::debug!(
            "[qc-02] Appended block {} at offset {} ({} bytes)",
            expected,
            position,
            serialized.len()
        );
        Ok(position)
    }

    fn write_records(&self, block: &SignedBlock, serialized: &[u8]) -> Result<u64> {
        let position = self.block_log.append(serialized)?;
        for index in self.indexes() {
            index.append(block, position)?;
        }

        if self.config.sync_on_append {
            self.block_log.sync()?;
            for index in self.indexes() {
                index.storage().sync()?;
            }
        }
        Ok(position)
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// The cached head block.
    pub fn head(&self) -> Option<Arc<SignedBlock>> {
        self.block_log.head()
    }

    /// Read the head block from disk.
    ///
    /// Fails on an empty log. Not safe while an append is in flight.
    pub fn read_head(&self) -> Result<SignedBlock> {
        self.block_log.read_head(&self.serializer)
    }

    /// Block `block_num`, or `None` for 0, past the head, or on an empty log.
    ///
    /// The head itself is answered from memory.
    pub fn read_block_by_num(&self, block_num: u32) -> Result<Option<Arc<SignedBlock>>> {
        if block_num == 0 {
            return Ok(None);
        }
        let Some(head) = self.block_log.head() else {
            return Ok(None);
        };
        if block_num > head.block_num() {
            return Ok(None);
        }
        if block_num == head.block_num() {
            return Ok(Some(head));
        }

        Self::ensure_covers(&self.position_index, head.block_num())?;
        let log_size = self.block_log.storage().size();
        let Some(location) = self.position_index.read(block_num, log_size)? else {
            return Ok(None);
        };
        let bytes = self.block_log.read(location)?;
        Ok(Some(Arc::new(self.serializer.deserialize(&bytes)?)))
    }

    /// Up to `count` consecutive blocks starting at `first`, stopping at the head.
    pub fn read_block_range(&self, first: u32, count: u32) -> Result<Vec<Arc<SignedBlock>>> {
        let mut blocks = Vec::with_capacity(count.min(1_000) as usize);
        let mut next = Some(first);
        for _ in 0..count {
            let Some(block_num) = next else {
                break;
            };
            match self.read_block_by_num(block_num)? {
                Some(block) => blocks.push(block),
                None => break,
            }
            next = block_num.checked_add(1);
        }
        Ok(blocks)
    }

    /// Id and signing key of `block_num` without deserializing the block.
    pub fn read_block_identity(&self, block_num: u32) -> Result<Option<BlockIdentity>> {
        if block_num == 0 {
            return Ok(None);
        }
        let Some(head) = self.block_log.head() else {
            return Ok(None);
        };
        if block_num > head.block_num() {
            return Ok(None);
        }
        if block_num == head.block_num() {
            return Ok(Some(BlockIdentity::of(&head)));
        }
        Self::ensure_covers(&self.identity_index, head.block_num())?;
        self.identity_index.read(block_num)
    }

    /// Offset and size of `block_num` in the log.
    pub fn read_block_location(&self, block_num: u32) -> Result<Option<BlockLocation>> {
        if block_num == 0 {
            return Ok(None);
        }
        let Some(head) = self.block_log.head() else {
            return Ok(None);
        };
        if block_num > head.block_num() {
            return Ok(None);
        }
        Self::ensure_covers(&self.position_index, head.block_num())?;
        if block_num < head.block_num() {
            return self
                .position_index
                .read(block_num, self.block_log.storage().size());
        }

        // No following record bounds the head, and the log size may already
        // include a block being appended, so measure the cached head instead.
        let Some(offset) = self.position_index.offset_of(block_num)? else {
            return Ok(None);
        };
        let size = self.serializer.serialize(&head)?.len() as u64;
        Ok(Some(BlockLocation { offset, size }))
    }
}

impl<BS: BlockSerializer> Drop for FileManager<BS> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<BS: BlockSerializer> BlockLogApi for FileManager<BS> {
    fn open(&mut self) -> Result<Option<RebuildReport>> {
        FileManager::open(self)
    }

    fn prepare(&mut self, path: &Path) -> Result<Option<RebuildReport>> {
        FileManager::prepare(self, path)
    }

    fn close(&mut self) {
        FileManager::close(self)
    }

    fn append(&self, block: &SignedBlock) -> Result<u64> {
        FileManager::append(self, block)
    }

    fn read_block_by_num(&self, block_num: u32) -> Result<Option<Arc<SignedBlock>>> {
        FileManager::read_block_by_num(self, block_num)
    }

    fn read_head(&self) -> Result<SignedBlock> {
        FileManager::read_head(self)
    }

    fn head(&self) -> Option<Arc<SignedBlock>> {
        FileManager::head(self)
    }

    fn read_block_range(&self, first: u32, count: u32) -> Result<Vec<Arc<SignedBlock>>> {
        FileManager::read_block_range(self, first, count)
    }

    fn read_block_identity(&self, block_num: u32) -> Result<Option<BlockIdentity>> {
        FileManager::read_block_identity(self, block_num)
    }

    fn read_block_location(&self, block_num: u32) -> Result<Option<BlockLocation>> {
        FileManager::read_block_location(self, block_num)
    }
}
