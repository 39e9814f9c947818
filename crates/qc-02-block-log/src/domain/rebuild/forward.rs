//! Forward replay: deserialize blocks in log order and hand each one, with
//! its start offset, to a sink that writes the index records.

use std::fs::File;
use std::io::{BufReader, Read};
use std::time::Instant;

use shared_types::{BlockId, SignedBlock};

use super::report::{RebuildReport, RebuildStrategy};
use crate::adapters::file_io::PositionedReader;
use crate::domain::errors::{Result, StorageError};
use crate::domain::interrupt::InterruptCheck;
use crate::ports::outbound::BlockSerializer;

const READ_BUFFER_SIZE: usize = 1 << 20;

/// Part of the log a replay walks.
#[derive(Debug, Clone, Copy)]
pub struct ReplaySource<'a> {
    /// The log file.
    pub log: &'a File,
    /// Offset of the first record to replay.
    pub start: u64,
    /// Log size; replay stops here.
    pub end: u64,
    /// Number the first replayed block must carry.
    pub first_block_num: u32,
}

/// Last block already present in every index, checked against the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumePoint {
    /// Number of the last indexed block.
    pub block_num: u32,
    /// Id of the last indexed block.
    pub block_id: BlockId,
    /// Offset of the last indexed block.
    pub position: u64,
    /// Offset of the first block still to index.
    pub next: u64,
}

/// Tracks how many bytes have been consumed from the underlying log.
struct CountingReader<R> {
    inner: R,
    offset: u64,
}

impl<R: Read> CountingReader<R> {
    fn new(inner: R, offset: u64) -> Self {
        Self { inner, offset }
    }

    fn read_trailer(&mut self) -> std::io::Result<u64> {
        let mut raw = [0u8; 8];
        self.read_exact(&mut raw)?;
        Ok(u64::from_le_bytes(raw))
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.offset += n as u64;
        Ok(n)
    }
}

fn log_reader(log: &File, start: u64, end: u64) -> CountingReader<BufReader<PositionedReader<'_>>> {
    CountingReader::new(
        BufReader::with_capacity(READ_BUFFER_SIZE, PositionedReader::new(log, start, end)),
        start,
    )
}

/// Check the block at `position` against an index holding `indexed` records.
///
/// The block must deserialize, carry number `indexed` and end with a trailer
/// pointing back at `position`. Returns `None` when any of that fails; the
/// caller then rebuilds from scratch.
pub fn resume_point(
    log: &File,
    log_size: u64,
    position: u64,
    indexed: u64,
    serializer: &dyn BlockSerializer,
) -> Option<ResumePoint> {
    let mut reader = log_reader(log, position, log_size);

    let block = match serializer.deserialize_from(&mut reader) {
        Ok(block) => block,
        Err(e) => {
            tracing::warn!(
                "[qc-02] Cannot resume index rebuild: block at {} does not decode: {}",
                position,
                e
            );
            return None;
        }
    };
    let trailer = match reader.read_trailer() {
        Ok(trailer) => trailer,
        Err(e) => {
            tracing::warn!(
                "[qc-02] Cannot resume index rebuild: no trailer after block at {}: {}",
                position,
                e
            );
            return None;
        }
    };

    if u64::from(block.block_num()) != indexed || trailer != position {
        tracing::warn!(
            "[qc-02] Cannot resume index rebuild: block at {} is #{} with trailer {}, expected #{}",
            position,
            block.block_num(),
            trailer,
            indexed
        );
        return None;
    }

    Some(ResumePoint {
        block_num: block.block_num(),
        block_id: block.id(),
        position,
        next: reader.offset,
    })
}

/// Replay `source`, calling `sink(block, start_offset)` for each record.
///
/// The interrupt is polled before every block. An interrupted replay returns
/// normally with `interrupted` set; everything handed to the sink so far is a
/// complete prefix.
pub fn forward_replay<F>(
    source: ReplaySource<'_>,
    serializer: &dyn BlockSerializer,
    interrupt: &dyn InterruptCheck,
    resumed: bool,
    mut sink: F,
) -> Result<RebuildReport>
where
    F: FnMut(&SignedBlock, u64) -> Result<()>,
{
    let started = Instant::now();
    let mut report = RebuildReport::new(RebuildStrategy::ForwardReplay, resumed, source.start);
    let mut reader = log_reader(source.log, source.start, source.end);
    let mut expected = source.first_block_num;

    while reader.offset < source.end {
        if interrupt.is_interrupt_requested() {
            report.interrupted = true;
            tracing::info!(
                "[qc-02] Index rebuild interrupted on request. Last applied: block {} at position {}",
                report.last_block_num,
                report.last_position
            );
            break;
        }

        let block_start = reader.offset;
        let block = serializer.deserialize_from(&mut reader)?;
        let trailer = reader.read_trailer()?;

        if trailer != block_start {
            tracing::error!(
                "[qc-02] Block {} at {} has trailing offset {}",
                block.block_num(),
                block_start,
                trailer
            );
            return Err(StorageError::TrailerMismatch {
                block_num: block.block_num(),
                offset: block_start,
                trailer,
            });
        }
        if block.block_num() != expected {
            return Err(StorageError::NonSequentialBlock {
                expected,
                actual: block.block_num(),
            });
        }

        sink(&block, block_start)?;
        report.add_block(expected, block_start);
        expected = expected.wrapping_add(1);
    }

    report.finish(started.elapsed());
    Ok(report)
}
