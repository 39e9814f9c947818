//! # Block Log Process Locking
//!
//! Prevents two node processes from appending to the same block log.
//!
//! The lock lives in a sibling file `<log>.lock` that records the holder's
//! PID. It is an advisory `fs2` lock. It excludes other lockers, not plain
//! readers of the log.

mod flock;

pub use flock::{lock_path, BlockLogLock, LockError};
