use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::*;
use crate::adapters::file_io;
use crate::adapters::serializer::BincodeBlockSerializer;
use crate::domain::errors::StorageError;
use crate::domain::interrupt::InterruptCheck;
use crate::ports::outbound::BlockSerializer;
use crate::storage::BlockLogFile;
use crate::test_utils::make_chain;

/// Stops after `limit` polls have answered "continue".
struct StopAfter {
    remaining: AtomicUsize,
}

impl StopAfter {
    fn new(limit: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(limit),
        }
    }
}

impl InterruptCheck for StopAfter {
    fn is_interrupt_requested(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_err()
    }
}

fn write_log(dir: &std::path::Path, count: u32) -> (BlockLogFile, Vec<u64>) {
    let mut log = BlockLogFile::new(dir.join("block_log"));
    log.open().unwrap();
    let positions = make_chain(count)
        .iter()
        .map(|block| {
            log.append(&BincodeBlockSerializer.serialize(block).unwrap())
                .unwrap()
        })
        .collect();
    (log, positions)
}

fn source(log: &BlockLogFile, start: u64, first_block_num: u32) -> ReplaySource<'_> {
    ReplaySource {
        log: log.storage().file().unwrap(),
        start,
        end: log.storage().size(),
        first_block_num,
    }
}

// =============================================================================
// FORWARD REPLAY
// =============================================================================

#[test]
fn test_forward_replay_visits_every_block() {
    let dir = tempfile::tempdir().unwrap();
    let (log, positions) = write_log(dir.path(), 6);

    let mut seen = Vec::new();
    let report = forward_replay(
        source(&log, 0, 1),
        &BincodeBlockSerializer,
        &AtomicBool::new(false),
        false,
        |block, pos| {
            seen.push((block.block_num(), pos));
            Ok(())
        },
    )
    .unwrap();

    let expected: Vec<(u32, u64)> = (1..=6).zip(positions.iter().copied()).collect();
    assert_eq!(seen, expected);
    assert_eq!(report.blocks_indexed, 6);
    assert_eq!(report.last_block_num, 6);
    assert_eq!(report.last_position, positions[5]);
    assert!(report.is_complete());
    assert_eq!(report.strategy, RebuildStrategy::ForwardReplay);
}

#[test]
fn test_forward_replay_stops_at_block_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let (log, positions) = write_log(dir.path(), 6);

    let mut seen = 0u32;
    let report = forward_replay(
        source(&log, 0, 1),
        &BincodeBlockSerializer,
        &StopAfter::new(4),
        false,
        |_, _| {
            seen += 1;
            Ok(())
        },
    )
    .unwrap();

    assert!(report.interrupted);
    assert_eq!(seen, 4);
    assert_eq!(report.last_block_num, 4);
    assert_eq!(report.last_position, positions[3]);
}

#[test]
fn test_forward_replay_from_middle() {
    let dir = tempfile::tempdir().unwrap();
    let (log, positions) = write_log(dir.path(), 5);

    let mut nums = Vec::new();
    let report = forward_replay(
        source(&log, positions[2], 3),
        &BincodeBlockSerializer,
        &AtomicBool::new(false),
        true,
        |block, _| {
            nums.push(block.block_num());
            Ok(())
        },
    )
    .unwrap();

    assert_eq!(nums, vec![3, 4, 5]);
    assert!(report.resumed);
    assert_eq!(report.start_position, positions[2]);
}

#[test]
fn test_forward_replay_rejects_bad_trailer() {
    let dir = tempfile::tempdir().unwrap();
    let (log, positions) = write_log(dir.path(), 3);

    // Trailer of block 2 sits right before block 3
    let file = log.storage().file().unwrap();
    file_io::pwrite_with_retry(file, &5u64.to_le_bytes(), positions[2] - 8).unwrap();

    let err = forward_replay(
        source(&log, 0, 1),
        &BincodeBlockSerializer,
        &AtomicBool::new(false),
        false,
        |_, _| Ok(()),
    )
    .unwrap_err();

    assert!(matches!(
        err,
        StorageError::TrailerMismatch {
            block_num: 2,
            trailer: 5,
            ..
        }
    ));
}

#[test]
fn test_resume_point_checks_block() {
    let dir = tempfile::tempdir().unwrap();
    let (log, positions) = write_log(dir.path(), 4);
    let file = log.storage().file().unwrap();
    let size = log.storage().size();

    let point = resume_point(file, size, positions[1], 2, &BincodeBlockSerializer).unwrap();
    assert_eq!(point.block_num, 2);
    assert_eq!(point.position, positions[1]);
    assert_eq!(point.next, positions[2]);

    // Wrong record count for the block found there
    assert!(resume_point(file, size, positions[1], 3, &BincodeBlockSerializer).is_none());
    // Not a record boundary
    assert!(resume_point(file, size, positions[1] + 1, 2, &BincodeBlockSerializer).is_none());
}

// =============================================================================
// BACKWARD EXTRACTION
// =============================================================================

#[test]
fn test_backward_extract_matches_positions() {
    let dir = tempfile::tempdir().unwrap();
    let (log, positions) = write_log(dir.path(), 7);
    let index_path = dir.path().join("block_log.index");

    let report = backward_extract(
        log.storage().file().unwrap(),
        log.storage().size(),
        7,
        &index_path,
        &AtomicBool::new(false),
    )
    .unwrap();

    let expected: Vec<u8> = positions.iter().flat_map(|p| p.to_le_bytes()).collect();
    assert_eq!(std::fs::read(&index_path).unwrap(), expected);
    assert_eq!(report.blocks_indexed, 7);
    assert_eq!(report.last_block_num, 1);
    assert_eq!(report.strategy, RebuildStrategy::BackwardExtraction);
    assert!(!dir.path().join("block_log.index.new").exists());
}

#[test]
fn test_backward_extract_rejects_corrupt_trailer() {
    let dir = tempfile::tempdir().unwrap();
    let (log, positions) = write_log(dir.path(), 4);
    let index_path = dir.path().join("block_log.index");
    std::fs::write(&index_path, b"previous").unwrap();

    // Point block 3's trailer past its own location
    let file = log.storage().file().unwrap();
    file_io::pwrite_with_retry(file, &u64::MAX.to_le_bytes(), positions[3] - 8).unwrap();

    let err = backward_extract(
        file,
        log.storage().size(),
        4,
        &index_path,
        &AtomicBool::new(false),
    )
    .unwrap_err();

    assert!(matches!(
        err,
        StorageError::BadTrailingOffset { block_num: 3, .. }
    ));
    assert!(err.is_corruption());
    assert_eq!(std::fs::read(&index_path).unwrap(), b"previous");
    assert!(!dir.path().join("block_log.index.new").exists());
}

#[test]
fn test_backward_extract_requires_first_block_at_zero() {
    let dir = tempfile::tempdir().unwrap();
    let (log, _) = write_log(dir.path(), 3);

    // Claiming only 2 blocks leaves block "1" starting at a non-zero offset
    let err = backward_extract(
        log.storage().file().unwrap(),
        log.storage().size(),
        2,
        &dir.path().join("block_log.index"),
        &AtomicBool::new(false),
    )
    .unwrap_err();

    assert!(matches!(err, StorageError::BadTrailingOffset { block_num: 1, .. }));
}

#[test]
fn test_backward_extract_interrupted_leaves_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let (log, _) = write_log(dir.path(), 5);
    let index_path = dir.path().join("block_log.index");

    let report = backward_extract(
        log.storage().file().unwrap(),
        log.storage().size(),
        5,
        &index_path,
        &StopAfter::new(2),
    )
    .unwrap();

    assert!(report.interrupted);
    assert!(!index_path.exists());
    assert!(!dir.path().join("block_log.index.new").exists());
}

#[test]
fn test_configured_strategy_follows_feature() {
    let expected = if cfg!(feature = "backward-index") {
        RebuildStrategy::BackwardExtraction
    } else {
        RebuildStrategy::ForwardReplay
    };
    assert_eq!(RebuildStrategy::configured(), expected);
}
