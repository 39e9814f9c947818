//! Backward extraction: rebuild the position index from trailing offsets
//! alone, walking a memory-mapped log from the head down to block 1.
//!
//! Only full rebuilds are possible; the walk needs the head to start from and
//! cannot continue a partial index. Output goes to `<index>.new` and replaces
//! the index only after every slot is filled.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Instant;

use memmap2::{Mmap, MmapMut};

use super::report::{RebuildReport, RebuildStrategy};
use crate::domain::errors::{Result, StorageError};
use crate::domain::interrupt::InterruptCheck;
use crate::storage::{POSITION_RECORD_SIZE, TRAILER_SIZE};

/// Temporary index file, removed on drop unless persisted.
struct TempIndex {
    path: PathBuf,
    persisted: bool,
}

impl TempIndex {
    fn create(index_path: &Path, size: u64) -> Result<(Self, File)> {
        let mut os = index_path.as_os_str().to_owned();
        os.push(".new");
        let path = PathBuf::from(os);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        let temp = Self {
            path,
            persisted: false,
        };
        file.set_len(size)?;
        Ok((temp, file))
    }

    fn persist(mut self, index_path: &Path) -> Result<()> {
        std::fs::rename(&self.path, index_path)?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for TempIndex {
    fn drop(&mut self) {
        if !self.persisted {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

fn read_offset(log: &[u8], at: u64) -> u64 {
    let at = at as usize;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&log[at..at + 8]);
    u64::from_le_bytes(raw)
}

/// Rebuild the position index at `index_path` for a log ending with block `head_num`.
///
/// `log_size` is the log size observed at startup. The index file must not be
/// open elsewhere while it is replaced. A trailing offset that does not move
/// strictly backwards aborts with `BadTrailingOffset`.
pub fn backward_extract(
    log: &File,
    log_size: u64,
    head_num: u32,
    index_path: &Path,
    interrupt: &dyn InterruptCheck,
) -> Result<RebuildReport> {
    let started = Instant::now();
    let mut report = RebuildReport::new(RebuildStrategy::BackwardExtraction, false, log_size);

    if log_size < TRAILER_SIZE {
        return Err(StorageError::EmptyLog { size: log_size });
    }

    let index_size = u64::from(head_num) * POSITION_RECORD_SIZE;
    let (temp, temp_file) = TempIndex::create(index_path, index_size)?;

    {
        // SAFETY: the log is append-only and not appended to during startup,
        // so the mapped range does not change while mapped.
        let log_map = unsafe { Mmap::map(log)? };
        #[cfg(unix)]
        if let Err(e) = log_map.advise(memmap2::Advice::WillNeed) {
            tracing::warn!("[qc-02] madvise failed: {}", e);
        }
        // SAFETY: the temporary file was just created and nothing else maps it.
        let mut index_map = unsafe { MmapMut::map_mut(&temp_file)? };

        let mut block_num = head_num;
        let mut offset_of_block_pos = log_size - TRAILER_SIZE;

        while block_num > 0 {
            if interrupt.is_interrupt_requested() {
                report.interrupted = true;
                break;
            }

            let higher_pos = offset_of_block_pos;
            let block_pos = read_offset(&log_map, offset_of_block_pos);
            if higher_pos <= block_pos || (block_num > 1 && block_pos < TRAILER_SIZE) {
                tracing::error!(
                    "[qc-02] Bad block index at block {}: {} <= {}",
                    block_num,
                    higher_pos,
                    block_pos
                );
                return Err(StorageError::BadTrailingOffset {
                    block_num,
                    higher_pos,
                    block_pos,
                });
            }

            let slot = ((u64::from(block_num) - 1) * POSITION_RECORD_SIZE) as usize;
            index_map[slot..slot + 8].copy_from_slice(&block_pos.to_le_bytes());
            report.add_block(block_num, block_pos);

            block_num -= 1;
            if block_num == 0 {
                if block_pos != 0 {
                    return Err(StorageError::BadTrailingOffset {
                        block_num: 1,
                        higher_pos,
                        block_pos,
                    });
                }
            } else {
                offset_of_block_pos = block_pos - TRAILER_SIZE;
            }
        }

        if !report.interrupted {
            index_map.flush()?;
        }
    }

    if report.interrupted {
        tracing::info!(
            "[qc-02] Backward index extraction interrupted on request and cannot be resumed. Head block: {}",
            head_num
        );
        report.finish(started.elapsed());
        return Ok(report);
    }

    temp_file.sync_all()?;
    drop(temp_file);
    temp.persist(index_path)?;

    report.finish(started.elapsed());
    Ok(report)
}
