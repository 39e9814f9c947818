//! # Adapters Module
//!
//! Contains adapter implementations for the Block Log subsystem.
//!
//! ## Modules
//!
//! - `file_io`: Positioned reads and writes with retry
//! - `serializer`: bincode implementation of `BlockSerializer`
//! - `lock`: Process lock on a block log (feature `locking`)

pub mod file_io;
#[cfg(feature = "locking")]
pub mod lock;
pub mod serializer;

#[cfg(feature = "locking")]
pub use lock::{BlockLogLock, LockError};
pub use serializer::BincodeBlockSerializer;
