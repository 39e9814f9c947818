//! # Storage Layer
//!
//! On-disk files of the block log: the log itself and its two indexes.
//!
//! ## Modules
//!
//! - `descriptor` - Per-file state (path, handle, size, reconciliation status)
//! - `index` - `BlockIndex` trait shared by both indexes
//! - `position_index` - Block number -> log offset
//! - `identity_index` - Block number -> (block id, signing key)
//! - `block_log` - The append-only log and its cached head

mod block_log;
mod descriptor;
mod identity_index;
mod index;
mod position_index;


/// Width of the self-offset trailing every log record.
pub const TRAILER_SIZE: u64 = 8;

pub use block_log::BlockLogFile;
pub use descriptor::{StorageDescription, StorageStatus, StorageType};
pub use identity_index::{BlockIdentity, IdentityIndex, IDENTITY_RECORD_SIZE};
pub use index::{BlockIndex, IndexKind, TailState};
pub use position_index::{BlockLocation, PositionIndex, POSITION_RECORD_SIZE};
