//! # Core Domain Entities
//!
//! Defines the chain entities persisted by the block log.
//!
//! ## Clusters
//!
//! - **Identifiers**: `BlockId`, `Hash`, `PublicKey`, `Signature`
//! - **Chain**: `BlockHeader`, `SignedBlock`, `SignedTransaction`

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use sha2::{Digest, Sha256};

// =============================================================================
// CLUSTER A: IDENTIFIERS
// =============================================================================

/// A 32-byte hash (SHA-256).
pub type Hash = [u8; 32];

/// A 20-byte block identifier.
///
/// The first 4 bytes hold the big-endian block number, the rest is a
/// truncated digest of the signed header.
pub type BlockId = [u8; 20];

/// A 64-byte Ed25519 signature.
pub type Signature = [u8; 64];

/// A 32-byte Ed25519 public key.
pub type PublicKey = [u8; 32];

/// Block number stored in the first 4 bytes of a block id.
pub fn num_from_id(id: &BlockId) -> u32 {
    u32::from_be_bytes([id[0], id[1], id[2], id[3]])
}

// =============================================================================
// CLUSTER B: THE CHAIN
// =============================================================================

/// The header of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockHeader {
    /// Id of the previous block (all zeros for the first block).
    pub previous: BlockId,
    /// Unix timestamp when the block was produced.
    pub timestamp: u64,
    /// Name of the producer that signed this block.
    pub witness: String,
    /// Merkle root of all transactions in the block.
    pub transaction_merkle_root: Hash,
}

/// A signed transaction as included in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SignedTransaction {
    /// Lower 16 bits of the block number this transaction references.
    pub ref_block_num: u16,
    /// Expiration as unix timestamp.
    pub expiration: u64,
    /// Serialized operations.
    pub operations: Vec<u8>,
    /// Signatures over the transaction digest.
    pub signatures: Vec<Vec<u8>>,
}

impl SignedTransaction {
    /// Compute the transaction hash.
    pub fn hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.ref_block_num.to_le_bytes());
        hasher.update(self.expiration.to_le_bytes());
        hasher.update(&self.operations);
        hasher.finalize().into()
    }
}

/// A block signed by its producer.
///
/// This is the unit the block log appends and serves back.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedBlock {
    /// The block header.
    pub header: BlockHeader,
    /// Producer signature over the header.
    #[serde_as(as = "Bytes")]
    pub witness_signature: Signature,
    /// Public key the signature verifies against.
    pub signing_key: PublicKey,
    /// Transactions in inclusion order.
    pub transactions: Vec<SignedTransaction>,
}

impl SignedBlock {
    /// Number of this block: one past the number encoded in `previous`.
    pub fn block_num(&self) -> u32 {
        num_from_id(&self.header.previous).wrapping_add(1)
    }

    /// Id of this block.
    pub fn id(&self) -> BlockId {
        let mut hasher = Sha256::new();
        hasher.update(self.header.previous);
        hasher.update(self.header.timestamp.to_le_bytes());
        hasher.update(self.header.witness.as_bytes());
        hasher.update(self.header.transaction_merkle_root);
        hasher.update(self.witness_signature);
        let digest: Hash = hasher.finalize().into();

        let mut id = [0u8; 20];
        id.copy_from_slice(&digest[..20]);
        id[..4].copy_from_slice(&self.block_num().to_be_bytes());
        id
    }

    /// Key of the producer that signed this block.
    pub fn signing_key(&self) -> PublicKey {
        self.signing_key
    }

    /// Production timestamp.
    pub fn timestamp(&self) -> u64 {
        self.header.timestamp
    }

    /// Merkle root over the transaction hashes (zero for an empty block).
    pub fn compute_merkle_root(&self) -> Hash {
        if self.transactions.is_empty() {
            return [0u8; 32];
        }
        let mut layer: Vec<Hash> = self.transactions.iter().map(|tx| tx.hash()).collect();
        while layer.len() > 1 {
            layer = layer
                .chunks(2)
                .map(|pair| {
                    let mut hasher = Sha256::new();
                    hasher.update(pair[0]);
                    hasher.update(pair.get(1).unwrap_or(&pair[0]));
                    hasher.finalize().into()
                })
                .collect();
        }
        layer[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_after(previous: BlockId) -> SignedBlock {
        SignedBlock {
            header: BlockHeader {
                previous,
                timestamp: 1_000,
                witness: "initminer".to_string(),
                transaction_merkle_root: [0; 32],
            },
            witness_signature: [0x11; 64],
            signing_key: [0x22; 32],
            transactions: vec![],
        }
    }

    #[test]
    fn test_first_block_is_number_one() {
        let block = block_after([0; 20]);
        assert_eq!(block.block_num(), 1);
        assert_eq!(num_from_id(&block.id()), 1);
    }

    #[test]
    fn test_block_num_follows_previous_id() {
        let first = block_after([0; 20]);
        let second = block_after(first.id());
        let third = block_after(second.id());

        assert_eq!(second.block_num(), 2);
        assert_eq!(third.block_num(), 3);
        assert_eq!(num_from_id(&third.id()), 3);
    }

    #[test]
    fn test_id_depends_on_signature() {
        let a = block_after([0; 20]);
        let mut b = a.clone();
        b.witness_signature = [0x33; 64];
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id()[..4], b.id()[..4]);
    }

    #[test]
    fn test_merkle_root_empty_and_odd() {
        let mut block = block_after([0; 20]);
        assert_eq!(block.compute_merkle_root(), [0; 32]);

        block.transactions = (0..3)
            .map(|i| SignedTransaction {
                ref_block_num: i,
                expiration: 60,
                operations: vec![i as u8; 4],
                signatures: vec![],
            })
            .collect();
        let root = block.compute_merkle_root();
        assert_ne!(root, [0; 32]);
        assert_eq!(root, block.compute_merkle_root());
    }

    #[test]
    fn test_bincode_preserves_block() {
        let block = block_after([0; 20]);
        let bytes = bincode::serialize(&block).unwrap();
        let decoded: SignedBlock = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, block);
        assert_eq!(decoded.id(), block.id());
    }
}
