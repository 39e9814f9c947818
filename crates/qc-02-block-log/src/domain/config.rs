//! # Block Log Configuration
//!
//! Paths and startup policy for the block log and its indexes.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the block log.
///
/// All configuration values have sensible defaults; only `data_dir` usually
/// needs to be set by the host application.
#[derive(Debug, Clone)]
pub struct BlockLogConfig {
    /// Directory holding the block log and its indexes.
    pub data_dir: PathBuf,

    /// File name of the block log inside `data_dir` (default: `block_log`).
    ///
    /// Index files are derived from it: `<name>.index` and `<name>_hash.index`.
    pub log_file_name: String,

    /// Truncate index files found next to an empty block log (default: true).
    ///
    /// When `false`, startup fails with `OrphanedIndex` and the operator has
    /// to decide what to do with the files.
    pub drop_orphaned_indexes: bool,

    /// Hold an exclusive process lock on the log while open (default: false).
    pub use_process_lock: bool,

    /// How long to wait for the process lock (default: 30s).
    pub lock_timeout: Duration,

    /// fsync the log and indexes after every append (default: false).
    pub sync_on_append: bool,
}

impl Default for BlockLogConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./blockchain"),
            log_file_name: "block_log".to_string(),
            drop_orphaned_indexes: true,
            use_process_lock: false,
            lock_timeout: Duration::from_secs(30),
            sync_on_append: false,
        }
    }
}

impl BlockLogConfig {
    /// Environment variable for `data_dir`.
    pub const ENV_DATA_DIR: &'static str = "QC_BLOCK_LOG_DIR";
    /// Environment variable for `drop_orphaned_indexes`.
    pub const ENV_DROP_ORPHANED: &'static str = "QC_BLOCK_LOG_DROP_ORPHANED";
    /// Environment variable for `use_process_lock`.
    pub const ENV_LOCK: &'static str = "QC_BLOCK_LOG_LOCK";

    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var(Self::ENV_DATA_DIR) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(flag) = env_flag(Self::ENV_DROP_ORPHANED) {
            config.drop_orphaned_indexes = flag;
        }
        if let Some(flag) = env_flag(Self::ENV_LOCK) {
            config.use_process_lock = flag;
        }

        config
    }

    /// Set the data directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Set the block log file name.
    pub fn with_log_file_name(mut self, name: impl Into<String>) -> Self {
        self.log_file_name = name.into();
        self
    }

    /// Choose whether orphaned indexes are truncated or reported as an error.
    pub fn with_drop_orphaned_indexes(mut self, drop: bool) -> Self {
        self.drop_orphaned_indexes = drop;
        self
    }

    /// Enable or disable the process lock.
    pub fn with_process_lock(mut self, enabled: bool) -> Self {
        self.use_process_lock = enabled;
        self
    }

    /// Set the process lock timeout.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Enable or disable fsync after every append.
    pub fn with_sync_on_append(mut self, sync: bool) -> Self {
        self.sync_on_append = sync;
        self
    }

    /// Full path of the block log.
    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(&self.log_file_name)
    }
}

/// Path of the position index belonging to `log_path`.
pub fn position_index_path(log_path: &Path) -> PathBuf {
    suffixed(log_path, ".index")
}

/// Path of the identity index belonging to `log_path`.
pub fn identity_index_path(log_path: &Path) -> PathBuf {
    suffixed(log_path, "_hash.index")
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(suffix);
    PathBuf::from(os)
}

fn env_flag(key: &str) -> Option<bool> {
    let value = std::env::var(key).ok()?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BlockLogConfig::default();
        assert_eq!(config.log_file_name, "block_log");
        assert!(config.drop_orphaned_indexes);
        assert!(!config.use_process_lock);
        assert_eq!(config.lock_timeout.as_secs(), 30);
    }

    #[test]
    fn test_builder_chain() {
        let config = BlockLogConfig::new()
            .with_data_dir("/data/chain")
            .with_log_file_name("blocks")
            .with_drop_orphaned_indexes(false)
            .with_sync_on_append(true);

        assert_eq!(config.log_path(), PathBuf::from("/data/chain/blocks"));
        assert!(!config.drop_orphaned_indexes);
        assert!(config.sync_on_append);
    }

    #[test]
    fn test_index_paths() {
        let log = PathBuf::from("/data/block_log");
        assert_eq!(
            position_index_path(&log),
            PathBuf::from("/data/block_log.index")
        );
        assert_eq!(
            identity_index_path(&log),
            PathBuf::from("/data/block_log_hash.index")
        );
    }
}
