//! # Block Log (qc-02)
//!
//! Durable storage of the canonical block history: an append-only log of
//! serialized blocks plus two fixed-width indexes that locate any block by
//! number in O(1).
//!
//! ## On-Disk Format
//!
//! ```text
//! block_log            [block 1][off 1][block 2][off 2] ... [block N][off N]
//!                       off K = u64 LE start offset of block K
//!
//! block_log.index      [off 1][off 2] ... [off N]            8 bytes each
//! block_log_hash.index [id 1 | key 1] ... [id N | key N]     52 bytes each
//! ```
//!
//! The size of block K is `off (K+1) - off K - 8`; the head's trailer locates
//! the head without any index. All integers are little-endian.
//!
//! ## Invariants
//!
//! | Invariant | Description |
//! |-----------|-------------|
//! | Lockstep indexes | Every index holds exactly one record per block in the log |
//! | Immutable records | A record is never rewritten once appended |
//! | Publish after write | Sizes and the head become visible only after their bytes are written |
//! | Checked rebuilds | A rebuilt index is accepted only if its record count equals the head number |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Configuration, errors, cancellation, rebuild strategies
//! - `storage/` - The log file, the two indexes and their shared descriptor
//! - `ports/` - `BlockLogApi` (inbound), `BlockSerializer` (outbound)
//! - `adapters/` - Positioned I/O, bincode serializer, process lock
//! - `service/` - `FileManager`: reconciliation, rebuild, append and reads
//!
//! ## Usage
//!
//! ```ignore
//! use qc_02_block_log::{BlockLogConfig, FileManager};
//!
//! let mut manager = FileManager::new(BlockLogConfig::new().with_data_dir("/data/chain"));
//! if let Some(report) = manager.open()? {
//!     println!("indexes rebuilt: {} blocks", report.blocks_indexed);
//! }
//!
//! let offset = manager.append(&block)?;
//! let stored = manager.read_block_by_num(block.block_num())?;
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export key types for convenience
pub use adapters::serializer::BincodeBlockSerializer;
pub use domain::config::BlockLogConfig;
pub use domain::errors::{Result, SerializationError, StorageError};
pub use domain::interrupt::{InterruptCheck, InterruptFlag, InterruptSources};
pub use domain::rebuild::{RebuildReport, RebuildStrategy};
pub use ports::inbound::BlockLogApi;
pub use ports::outbound::BlockSerializer;
pub use service::FileManager;
pub use storage::{
    BlockIdentity, BlockIndex, BlockLocation, BlockLogFile, IdentityIndex, IndexKind,
    PositionIndex, StorageStatus,
};

#[cfg(feature = "locking")]
pub use adapters::lock::{BlockLogLock, LockError};
