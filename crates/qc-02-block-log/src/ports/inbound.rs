//! # Inbound Ports (Driving Ports)
//!
//! The API the block log exposes to the chain and RPC layers.

use std::path::Path;
use std::sync::Arc;

use shared_types::SignedBlock;

use crate::domain::errors::StorageError;
use crate::domain::rebuild::RebuildReport;
use crate::storage::{BlockIdentity, BlockLocation};

/// Primary API of the block log.
///
/// Reads take `&self` and may run on any number of threads while a single
/// writer appends. "Not found" is `Ok(None)`; errors mean corruption, I/O
/// failure or a violated precondition.
pub trait BlockLogApi {
    /// Open the configured log, reconcile and rebuild indexes as needed.
    fn open(&mut self) -> Result<Option<RebuildReport>, StorageError>;

    /// Reopen at `path`, reconcile and rebuild indexes as needed.
    fn prepare(&mut self, path: &Path) -> Result<Option<RebuildReport>, StorageError>;

    /// Release all files. Safe to call repeatedly.
    fn close(&mut self);

    /// Append the next block; returns the log offset it was written at.
    ///
    /// ## Errors
    ///
    /// - `NonSequentialBlock`: block number is not head + 1
    /// - `NotReady`: the last rebuild was interrupted or an earlier append failed
    fn append(&self, block: &SignedBlock) -> Result<u64, StorageError>;

    /// Block by number. The head is served from memory.
    ///
    /// ## Errors
    ///
    /// - `IndexBehindHead`: below the head while the index is incomplete
    fn read_block_by_num(&self, block_num: u32) -> Result<Option<Arc<SignedBlock>>, StorageError>;

    /// Read the head block from disk (startup use).
    ///
    /// ## Errors
    ///
    /// - `EmptyLog`: the log holds no block
    fn read_head(&self) -> Result<SignedBlock, StorageError>;

    /// The cached head block.
    fn head(&self) -> Option<Arc<SignedBlock>>;

    /// Up to `count` consecutive blocks from `first`.
    fn read_block_range(
        &self,
        first: u32,
        count: u32,
    ) -> Result<Vec<Arc<SignedBlock>>, StorageError>;

    /// Block id and signing key by number. Fails with `IndexBehindHead` like
    /// `read_block_by_num`.
    fn read_block_identity(&self, block_num: u32) -> Result<Option<BlockIdentity>, StorageError>;

    /// Offset and serialized size of a block in the log.
    fn read_block_location(&self, block_num: u32) -> Result<Option<BlockLocation>, StorageError>;
}
