//! Startup reconciliation of the indexes against the block log.
//!
//! | Log    | Indexes | Action                                           |
//! |--------|---------|--------------------------------------------------|
//! | empty  | empty   | nothing                                          |
//! | empty  | data    | orphaned: truncate or fail, per configuration    |
//! | blocks | empty   | full rebuild                                     |
//! | blocks | data    | compare tails: keep, resume, or full rebuild     |

use std::path::Path;
use std::sync::Arc;

use super::FileManager;
#[cfg(feature = "locking")]
use crate::adapters::lock::BlockLogLock;
use crate::domain::config::{identity_index_path, position_index_path};
use crate::domain::errors::{Result, StorageError};
use crate::domain::rebuild::RebuildReport;
use crate::ports::outbound::BlockSerializer;
use crate::storage::{BlockIndex, StorageStatus};

impl<BS: BlockSerializer> FileManager<BS> {
    /// Open the log configured in `BlockLogConfig` and reconcile its indexes.
    ///
    /// Returns the rebuild report if any index had to be rebuilt.
    pub fn open(&mut self) -> Result<Option<RebuildReport>> {
        let path = self.config.log_path();
        self.prepare(&path)
    }

    /// Close, reopen at `path`, reconcile, and rebuild stale indexes.
    ///
    /// A rebuild interrupted through `interrupt_handle` returns a report with
    /// `interrupted` set. The indexes are then a valid prefix: the head is
    /// still served, reads below it fail with `IndexBehindHead` and appends
    /// with `NotReady`. Close and resume at the next start.
    pub fn prepare(&mut self, path: &Path) -> Result<Option<RebuildReport>> {
        self.close();

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        #[cfg(feature = "locking")]
        if self.config.use_process_lock {
            self.lock = Some(BlockLogLock::acquire(path, self.config.lock_timeout)?);
        }

        self.block_log.storage_mut().set_path(path);
        self.position_index
            .storage_mut()
            .set_path(position_index_path(path));
        self.identity_index
            .storage_mut()
            .set_path(identity_index_path(path));

        self.block_log.open()?;
        for index in self.indexes_mut() {
            index.open()?;
        }

        self.prepare_all()?;

        if self.construct_index_allowed() {
            self.construct_index().map(Some)
        } else {
            self.set_ready(true);
            Ok(None)
        }
    }

    /// Decide the status of every index against the log head.
    pub fn prepare_all(&mut self) -> Result<()> {
        let log_size = self.block_log.storage().size();

        if log_size == 0 {
            tracing::info!(
                "[qc-02] Block log {} is empty",
                self.block_log.storage().path().display()
            );
            self.block_log.clear_head();

            let drop_orphaned = self.config.drop_orphaned_indexes;
            for index in self.indexes_mut() {
                index.storage_mut().status = StorageStatus::None;
                if index.storage().size() == 0 {
                    continue;
                }
                index.non_empty_idx_info();
                if !drop_orphaned {
                    return Err(StorageError::OrphanedIndex {
                        path: index.storage().path().to_path_buf(),
                    });
                }
                tracing::warn!(
                    "[qc-02] Dropping orphaned {} {}",
                    index.kind(),
                    index.storage().path().display()
                );
                index.storage_mut().truncate()?;
            }
            return Ok(());
        }

        let head = Arc::new(self.block_log.read_head(&self.serializer)?);
        let head_pos = self.block_log.head_position()?;
        tracing::info!(
            "[qc-02] Block log {}: head block {} at offset {}",
            self.block_log.storage().path().display(),
            head.block_num(),
            head_pos
        );

        for index in self.indexes_mut() {
            index.prepare(&head, head_pos)?;
        }
        self.block_log.publish_head(head);
        Ok(())
    }

    /// Whether any index needs work.
    pub fn construct_index_allowed(&self) -> bool {
        self.indexes()
            .iter()
            .any(|index| index.storage().status != StorageStatus::None)
    }

    /// Whether every index can be continued from its existing records.
    pub fn get_resume(&self) -> bool {
        self.indexes()
            .iter()
            .all(|index| index.storage().status == StorageStatus::Resume)
    }

    /// Whether all indexes are the same number of blocks behind the log.
    pub fn diffs_agree(&self) -> bool {
        let indexes = self.indexes();
        let first = indexes[0].storage().diff;
        indexes.iter().all(|index| index.storage().diff == first)
    }

    /// Log offset a resumed rebuild continues from.
    ///
    /// The position index's last recorded offset when all indexes are equally
    /// far behind, otherwise 0.
    pub fn get_index_pos(&self) -> u64 {
        if self.diffs_agree() {
            self.position_index.storage().pos
        } else {
            0
        }
    }
}
