//! # Lock File
//!
//! `fs2` exclusive lock (flock on Unix, LockFileEx on Windows) on the block
//! log's sibling lock file.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use thiserror::Error;

use crate::domain::errors::StorageError;

/// Upper bound for the backoff between acquisition attempts.
const MAX_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Errors from block log locking.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("Failed to open lock file {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("Block log {log} is in use by process {pid}")]
    HeldByProcess { log: PathBuf, pid: u32 },

    #[error("Block log {log} is in use")]
    Held { log: PathBuf },

    #[error("Failed to record owner in lock file: {0}")]
    WriteOwner(io::Error),
}

impl From<LockError> for StorageError {
    fn from(err: LockError) -> Self {
        StorageError::DatabaseLocked {
            message: err.to_string(),
        }
    }
}

/// Lock file path for the log at `log_path`.
pub fn lock_path(log_path: &Path) -> PathBuf {
    let mut name = log_path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

enum Attempt {
    Acquired(File),
    Busy(Option<u32>),
}

/// Exclusive lock on one block log, released on drop.
///
/// ```ignore
/// let lock = BlockLogLock::acquire(Path::new("/data/chain/block_log"), Duration::from_secs(30))?;
/// ```
#[derive(Debug)]
pub struct BlockLogLock {
    file: File,
    path: PathBuf,
}

impl BlockLogLock {
    /// Lock the log at `log_path`, retrying with exponential backoff until
    /// `timeout` expires.
    ///
    /// The OS drops the lock of an exited holder; its leftover file is
    /// reused and the recorded PID overwritten.
    pub fn acquire(log_path: &Path, timeout: Duration) -> Result<Self, LockError> {
        let path = lock_path(log_path);
        let deadline = Instant::now() + timeout;
        let mut delay = Duration::from_millis(20);

        loop {
            let holder = match Self::try_lock(&path)? {
                Attempt::Acquired(file) => return Self::claim(file, path),
                Attempt::Busy(holder) => holder,
            };

            if Instant::now() >= deadline {
                let log = log_path.to_path_buf();
                return Err(match holder {
                    Some(pid) => LockError::HeldByProcess { log, pid },
                    None => LockError::Held { log },
                });
            }

            std::thread::sleep(delay);
            delay = (delay * 2).min(MAX_RETRY_DELAY);
        }
    }

    fn try_lock(path: &Path) -> Result<Attempt, LockError> {
        // Never truncate before holding the lock: the holder's PID must survive
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| LockError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Attempt::Acquired(file)),
            Err(_) => Ok(Attempt::Busy(read_holder(path))),
        }
    }

    fn claim(mut file: File, path: PathBuf) -> Result<Self, LockError> {
        file.set_len(0).map_err(LockError::WriteOwner)?;
        writeln!(file, "{}", std::process::id()).map_err(LockError::WriteOwner)?;
        file.sync_data().map_err(LockError::WriteOwner)?;

        tracing::debug!("[qc-02] Acquired {}", path.display());
        Ok(Self { file, path })
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BlockLogLock {
    fn drop(&mut self) {
        // The file stays: unlinking it would let two lockers hold different inodes
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("[qc-02] Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}

fn read_holder(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
}
