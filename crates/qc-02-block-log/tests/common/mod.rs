//! Shared builders for the block log integration tests.

#![allow(dead_code)]

use std::path::Path;

use qc_02_block_log::{BlockLogConfig, FileManager};
use shared_types::{BlockHeader, BlockId, SignedBlock, SignedTransaction};

/// Block `num` on top of `previous`, carrying `tx_count` transactions.
pub fn block_after(previous: BlockId, tx_count: usize) -> SignedBlock {
    let num = shared_types::num_from_id(&previous).wrapping_add(1);
    let transactions = (0..tx_count)
        .map(|i| SignedTransaction {
            ref_block_num: num as u16,
            expiration: 10_000 + u64::from(num),
            operations: vec![(i % 251) as u8; 24],
            signatures: vec![vec![0x42; 65]],
        })
        .collect();

    let mut block = SignedBlock {
        header: BlockHeader {
            previous,
            timestamp: 1_600_000_000 + u64::from(num) * 3,
            witness: format!("witness-{}", num % 21),
            transaction_merkle_root: [0; 32],
        },
        witness_signature: [(num % 256) as u8; 64],
        signing_key: [(num % 7) as u8; 32],
        transactions,
    };
    block.header.transaction_merkle_root = block.compute_merkle_root();
    block
}

/// Chain of `count` blocks starting at block 1.
pub fn chain(count: u32) -> Vec<SignedBlock> {
    chain_with_tx_counts(&vec![2; count as usize])
}

/// Chain whose block `i + 1` holds `tx_counts[i]` transactions.
pub fn chain_with_tx_counts(tx_counts: &[usize]) -> Vec<SignedBlock> {
    let mut blocks: Vec<SignedBlock> = Vec::with_capacity(tx_counts.len());
    for tx_count in tx_counts {
        let previous = blocks.last().map(|b| b.id()).unwrap_or([0; 20]);
        blocks.push(block_after(previous, *tx_count));
    }
    blocks
}

pub fn config(dir: &Path) -> BlockLogConfig {
    BlockLogConfig::new().with_data_dir(dir)
}

/// Open a fresh manager in `dir`.
pub fn open(dir: &Path) -> FileManager {
    let mut manager = FileManager::new(config(dir));
    manager.open().expect("open block log");
    manager
}

/// Open a manager in `dir` and append every block of `blocks`.
pub fn open_with(dir: &Path, blocks: &[SignedBlock]) -> FileManager {
    let manager = open(dir);
    for block in blocks {
        manager.append(block).expect("append");
    }
    manager
}

/// Contents of both index files.
pub fn index_bytes(dir: &Path) -> (Vec<u8>, Vec<u8>) {
    (
        std::fs::read(dir.join("block_log.index")).expect("position index"),
        std::fs::read(dir.join("block_log_hash.index")).expect("identity index"),
    )
}

/// Install a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
