//! Index reconstruction driven by the file manager.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::time::Instant;

use shared_types::SignedBlock;

use super::FileManager;
use crate::domain::errors::{Result, StorageError};
use crate::domain::rebuild::{
    backward_extract, forward_replay, resume_point, RebuildReport, RebuildStrategy, ReplaySource,
};
use crate::ports::outbound::BlockSerializer;
use crate::storage::BlockIndex;

const WRITE_BUFFER_SIZE: usize = 256 * 1024;

/// Buffered writer appending to the end of an index file.
fn index_stream(index: &dyn BlockIndex) -> Result<BufWriter<File>> {
    let mut file = index.storage().file()?.try_clone()?;
    file.seek(SeekFrom::End(0))?;
    Ok(BufWriter::with_capacity(WRITE_BUFFER_SIZE, file))
}

fn finish_stream(stream: BufWriter<File>) -> Result<()> {
    let file = stream.into_inner().map_err(|e| e.into_error())?;
    file.sync_data()?;
    Ok(())
}

impl<BS: BlockSerializer> FileManager<BS> {
    /// Rebuild every index that `prepare_all` flagged.
    ///
    /// Resumes when every index is an equally long valid prefix of the log,
    /// otherwise truncates and rebuilds them all together. Appends are
    /// accepted afterwards only if the rebuild was not interrupted.
    pub fn construct_index(&mut self) -> Result<RebuildReport> {
        let head = self.block_log.head().ok_or(StorageError::MissingHead)?;
        let head_num = head.block_num();
        let started = Instant::now();

        let resume = if self.get_resume() && self.diffs_agree() {
            let indexed = self.position_index.record_count();
            let point = resume_point(
                self.block_log.storage().file()?,
                self.block_log.storage().size(),
                self.get_index_pos(),
                indexed,
                &self.serializer,
            );
            if point.is_none() {
                tracing::warn!("[qc-02] Resume point failed validation; rebuilding all indexes");
            }
            point
        } else {
            None
        };

        let strategy = if resume.is_some() {
            RebuildStrategy::ForwardReplay
        } else {
            RebuildStrategy::configured()
        };
        tracing::info!(
            "[qc-02] Reconstructing block log indexes up to block {} ({}, resume={}, index_pos={})",
            head_num,
            strategy,
            resume.is_some(),
            resume.map_or(0, |point| point.position)
        );

        let mut report = match (resume, strategy) {
            (Some(point), _) => {
                tracing::info!(
                    "[qc-02] Resuming block log indexes. Last applied: block {} ({:02x?}) at position {}",
                    point.block_num,
                    &point.block_id[..4],
                    point.position
                );
                self.replay_all(point.next, point.block_num + 1, true)?
            }
            (None, RebuildStrategy::BackwardExtraction) => self.extract_backward(head_num)?,
            (None, RebuildStrategy::ForwardReplay) => {
                for index in self.indexes_mut() {
                    index.storage_mut().truncate()?;
                }
                self.replay_all(0, 1, false)?
            }
        };

        tracing::info!("[qc-02] Opening rebuilt indexes");
        for index in self.indexes_mut() {
            index.close();
            index.open()?;
        }

        if report.interrupted {
            tracing::info!(
                "[qc-02] Index rebuild stopped after block {}; it resumes at next start",
                report.last_block_num
            );
        } else {
            for index in self.indexes() {
                index.check_consistency(head_num)?;
            }
        }

        report.finish(started.elapsed());
        self.set_ready(!report.interrupted);
        tracing::info!(
            "[qc-02] Index rebuild finished in {:.3}s ({} blocks)",
            report.duration_ms as f64 / 1000.0,
            report.blocks_indexed
        );
        Ok(report)
    }

    /// Write the records of `block` to one stream per index, in index order.
    pub fn write(
        &self,
        streams: &mut [&mut dyn Write],
        block: &SignedBlock,
        position: u64,
    ) -> Result<()> {
        let indexes = self.indexes();
        if streams.len() != indexes.len() {
            return Err(StorageError::IndexStreamMismatch {
                expected: indexes.len(),
                actual: streams.len(),
            });
        }
        for (index, stream) in indexes.iter().zip(streams.iter_mut()) {
            index.write(&mut **stream, block, position)?;
        }
        Ok(())
    }

    /// Forward replay feeding both indexes from `start`.
    fn replay_all(&self, start: u64, first_block_num: u32, resumed: bool) -> Result<RebuildReport> {
        let mut position_stream = index_stream(&self.position_index)?;
        let mut identity_stream = index_stream(&self.identity_index)?;

        let source = ReplaySource {
            log: self.block_log.storage().file()?,
            start,
            end: self.block_log.storage().size(),
            first_block_num,
        };
        let report = forward_replay(
            source,
            &self.serializer,
            &self.interrupt,
            resumed,
            |block, position| {
                let mut streams: [&mut dyn Write; 2] =
                    [&mut position_stream, &mut identity_stream];
                self.write(&mut streams, block, position)
            },
        )?;

        // Flush even when interrupted so the files hold a complete prefix
        finish_stream(position_stream)?;
        finish_stream(identity_stream)?;
        Ok(report)
    }

    /// Backward extraction of the position index, then a forward pass for
    /// the identity records the trailers cannot provide.
    fn extract_backward(&mut self, head_num: u32) -> Result<RebuildReport> {
        let index_path = self.position_index.storage().path().to_path_buf();
        self.position_index.close();

        let report = backward_extract(
            self.block_log.storage().file()?,
            self.block_log.storage().size(),
            head_num,
            &index_path,
            &self.interrupt,
        )?;
        self.position_index.open()?;
        if report.interrupted {
            // The old files may disagree with the log; leave empty prefixes
            for index in self.indexes_mut() {
                index.storage_mut().truncate()?;
            }
            return Ok(report);
        }

        self.identity_index.storage_mut().truncate()?;
        let mut identity_stream = index_stream(&self.identity_index)?;
        let source = ReplaySource {
            log: self.block_log.storage().file()?,
            start: 0,
            end: self.block_log.storage().size(),
            first_block_num: 1,
        };
        let identity_pass = forward_replay(
            source,
            &self.serializer,
            &self.interrupt,
            false,
            |block, position| {
                self.identity_index
                    .write(&mut identity_stream, block, position)
            },
        )?;
        finish_stream(identity_stream)?;

        tracing::debug!(
            "[qc-02] Identity records rebuilt for {} blocks",
            identity_pass.blocks_indexed
        );
        Ok(RebuildReport {
            interrupted: identity_pass.interrupted,
            ..report
        })
    }
}
