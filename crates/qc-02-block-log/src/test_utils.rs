use shared_types::{BlockHeader, BlockId, SignedBlock, SignedTransaction};

use crate::service::FileManager;
use crate::BlockLogConfig;

/// Build block `num` chained to `previous`.
///
/// The first 4 bytes of `previous` are forced to `num - 1` so the block
/// reports `num` regardless of the id passed in.
pub fn make_test_block(num: u32, previous: BlockId, tx_count: usize) -> SignedBlock {
    let mut previous = previous;
    previous[..4].copy_from_slice(&num.wrapping_sub(1).to_be_bytes());

    let transactions = (0..tx_count)
        .map(|i| SignedTransaction {
            ref_block_num: (num & 0xFFFF) as u16,
            expiration: 2_000 + u64::from(num),
            operations: vec![i as u8; 16 + i],
            signatures: vec![vec![0x5A; 65]],
        })
        .collect();

    let mut block = SignedBlock {
        header: BlockHeader {
            previous,
            timestamp: 1_000 + u64::from(num) * 3,
            witness: "initminer".to_string(),
            transaction_merkle_root: [0; 32],
        },
        witness_signature: [num as u8; 64],
        signing_key: [0xAB; 32],
        transactions,
    };
    block.header.transaction_merkle_root = block.compute_merkle_root();
    block
}

/// Blocks `1..=count`, each linked to the id of its predecessor.
pub fn make_chain(count: u32) -> Vec<SignedBlock> {
    let mut chain: Vec<SignedBlock> = Vec::with_capacity(count as usize);
    for num in 1..=count {
        let previous = chain.last().map(|b| b.id()).unwrap_or([0; 20]);
        chain.push(make_test_block(num, previous, (num % 4) as usize));
    }
    chain
}

/// Config rooted at `dir`.
pub fn test_config(dir: &std::path::Path) -> BlockLogConfig {
    BlockLogConfig::new().with_data_dir(dir)
}

/// Open a manager in `dir` and append `count` chained blocks.
pub fn open_with_chain(dir: &std::path::Path, count: u32) -> (FileManager, Vec<SignedBlock>) {
    let mut manager = FileManager::new(test_config(dir));
    manager.open().unwrap();
    let chain = make_chain(count);
    for block in &chain {
        manager.append(block).unwrap();
    }
    (manager, chain)
}
