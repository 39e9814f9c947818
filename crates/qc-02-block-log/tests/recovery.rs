//! # Recovery Tests
//!
//! Startup reconciliation and index reconstruction against damaged or
//! partial files.

mod common;

use std::fs::OpenOptions;
use std::sync::atomic::AtomicBool;

use qc_02_block_log::domain::rebuild::backward_extract;
use qc_02_block_log::{BlockLogConfig, FileManager, StorageError};

const POSITION_RECORD: u64 = 8;
const IDENTITY_RECORD: u64 = 52;

fn truncate(path: &std::path::Path, len: u64) {
    OpenOptions::new()
        .write(true)
        .open(path)
        .unwrap()
        .set_len(len)
        .unwrap();
}

#[test]
fn test_resume_from_any_prefix_matches_full_build() {
    common::init_tracing();
    let blocks = common::chain(12);

    for kept in [0u64, 1, 5, 11, 12] {
        let dir = tempfile::tempdir().unwrap();
        drop(common::open_with(dir.path(), &blocks));
        let expected = common::index_bytes(dir.path());

        truncate(&dir.path().join("block_log.index"), kept * POSITION_RECORD);
        truncate(&dir.path().join("block_log_hash.index"), kept * IDENTITY_RECORD);

        let mut manager = FileManager::new(common::config(dir.path()));
        let report = manager.open().unwrap();
        match kept {
            12 => assert!(report.is_none()),
            0 => assert!(!report.unwrap().resumed),
            _ => {
                let report = report.unwrap();
                assert!(report.resumed, "prefix of {kept} blocks should resume");
                assert_eq!(report.blocks_indexed, 12 - kept);
            }
        }
        drop(manager);

        assert_eq!(common::index_bytes(dir.path()), expected, "prefix {kept}");
    }
}

#[test]
fn test_index_with_foreign_records_is_rebuilt() {
    let dir = tempfile::tempdir().unwrap();
    let blocks = common::chain(6);
    drop(common::open_with(dir.path(), &blocks));
    let expected = common::index_bytes(dir.path());

    // Same length, wrong offsets
    std::fs::write(dir.path().join("block_log.index"), vec![0xEE; 48]).unwrap();

    let mut manager = FileManager::new(common::config(dir.path()));
    let report = manager.open().unwrap().unwrap();
    assert!(!report.resumed);
    drop(manager);

    assert_eq!(common::index_bytes(dir.path()), expected);
}

#[test]
fn test_corrupt_trailer_fails_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let blocks = common::chain(5);
    let manager = common::open_with(dir.path(), &blocks);
    let block_4 = manager.read_block_location(4).unwrap().unwrap();
    drop(manager);

    // Trailer of block 3 sits right before block 4
    let log = OpenOptions::new()
        .read(true)
        .write(true)
        .open(dir.path().join("block_log"))
        .unwrap();
    qc_02_block_log::adapters::file_io::pwrite_with_retry(
        &log,
        &u64::MAX.to_le_bytes(),
        block_4.offset - 8,
    )
    .unwrap();
    std::fs::remove_file(dir.path().join("block_log.index")).unwrap();

    let mut manager = FileManager::new(common::config(dir.path()));
    let err = manager.open().unwrap_err();
    assert!(err.is_corruption(), "unexpected error: {err}");
}

#[test]
fn test_backward_extraction_gate() {
    let dir = tempfile::tempdir().unwrap();
    let blocks = common::chain(6);
    let manager = common::open_with(dir.path(), &blocks);
    let block_5 = manager.read_block_location(5).unwrap().unwrap();
    let log_size = manager.block_log().storage().size();
    drop(manager);
    let (expected, _) = common::index_bytes(dir.path());

    let log = OpenOptions::new()
        .read(true)
        .write(true)
        .open(dir.path().join("block_log"))
        .unwrap();
    let rebuilt = dir.path().join("rebuilt.index");

    backward_extract(&log, log_size, 6, &rebuilt, &AtomicBool::new(false)).unwrap();
    assert_eq!(std::fs::read(&rebuilt).unwrap(), expected);

    // Block 4's trailer now claims the block starts after block 5
    qc_02_block_log::adapters::file_io::pwrite_with_retry(
        &log,
        &(block_5.offset + 1).to_le_bytes(),
        block_5.offset - 8,
    )
    .unwrap();
    let err = backward_extract(&log, log_size, 6, &rebuilt, &AtomicBool::new(false)).unwrap_err();
    assert!(matches!(err, StorageError::BadTrailingOffset { block_num: 4, .. }));
}

#[test]
fn test_truncated_log_tail_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    drop(common::open_with(dir.path(), &common::chain(3)));

    let log_path = dir.path().join("block_log");
    let len = std::fs::metadata(&log_path).unwrap().len();
    truncate(&log_path, len - 5);

    let mut manager = FileManager::new(common::config(dir.path()));
    assert!(manager.open().is_err());
}

#[test]
fn test_config_from_env_overrides_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::env::set_var(BlockLogConfig::ENV_DATA_DIR, dir.path());
    std::env::set_var(BlockLogConfig::ENV_DROP_ORPHANED, "false");

    let config = BlockLogConfig::from_env();
    std::env::remove_var(BlockLogConfig::ENV_DATA_DIR);
    std::env::remove_var(BlockLogConfig::ENV_DROP_ORPHANED);

    assert_eq!(config.data_dir, dir.path());
    assert!(!config.drop_orphaned_indexes);
    assert_eq!(config.log_path(), dir.path().join("block_log"));
}
