//! # Identity Index
//!
//! Block number -> (block id, signing key), so identity lookups never need
//! to deserialize a block. Fixed 52-byte records, no header.

use std::path::PathBuf;

use shared_types::{num_from_id, BlockId, PublicKey, SignedBlock};

use super::descriptor::{StorageDescription, StorageType};
use super::index::{BlockIndex, IndexKind, TailState};
use crate::adapters::file_io;
use crate::domain::errors::Result;

const ID_SIZE: usize = 20;
const KEY_SIZE: usize = 32;

/// Width of one identity record.
pub const IDENTITY_RECORD_SIZE: u64 = (ID_SIZE + KEY_SIZE) as u64;

/// Identity metadata of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockIdentity {
    /// Id of the block.
    pub block_id: BlockId,
    /// Key of the producer that signed it.
    pub signing_key: PublicKey,
}

impl BlockIdentity {
    /// Identity of `block`.
    pub fn of(block: &SignedBlock) -> Self {
        Self {
            block_id: block.id(),
            signing_key: block.signing_key(),
        }
    }

    fn to_bytes(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(IDENTITY_RECORD_SIZE as usize);
        out.extend_from_slice(&self.block_id);
        out.extend_from_slice(&self.signing_key);
        out
    }

    fn from_bytes(raw: &[u8; IDENTITY_RECORD_SIZE as usize]) -> Self {
        let mut block_id = [0u8; ID_SIZE];
        let mut signing_key = [0u8; KEY_SIZE];
        block_id.copy_from_slice(&raw[..ID_SIZE]);
        signing_key.copy_from_slice(&raw[ID_SIZE..]);
        Self {
            block_id,
            signing_key,
        }
    }
}

/// Block number -> identity index.
#[derive(Debug)]
pub struct IdentityIndex {
    storage: StorageDescription,
}

impl IdentityIndex {
    /// Create a closed index at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            storage: StorageDescription::new(StorageType::HashIdx, path),
        }
    }

    /// Identity of `block_num`, if indexed.
    pub fn read(&self, block_num: u32) -> Result<Option<BlockIdentity>> {
        if block_num == 0 || u64::from(block_num) > self.record_count() {
            return Ok(None);
        }
        let mut raw = [0u8; IDENTITY_RECORD_SIZE as usize];
        file_io::pread_with_retry(
            self.storage.file()?,
            &mut raw,
            (u64::from(block_num) - 1) * IDENTITY_RECORD_SIZE,
        )?;
        Ok(Some(BlockIdentity::from_bytes(&raw)))
    }
}

impl BlockIndex for IdentityIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::Identity
    }

    fn record_size(&self) -> u64 {
        IDENTITY_RECORD_SIZE
    }

    fn storage(&self) -> &StorageDescription {
        &self.storage
    }

    fn storage_mut(&mut self) -> &mut StorageDescription {
        &mut self.storage
    }

    fn encode_record(&self, block: &SignedBlock, _position: u64) -> Vec<u8> {
        BlockIdentity::of(block).to_bytes()
    }

    fn inspect_tail(&mut self, count: u64, head: &SignedBlock, _head_pos: u64) -> Result<TailState> {
        let last = self
            .read(count as u32)?
            .map(|identity| identity.block_id)
            .unwrap_or_default();

        // Ids carry their block number, so a record in the wrong slot shows here
        let state = if u64::from(num_from_id(&last)) != count {
            TailState::Diverged
        } else if count == u64::from(head.block_num()) {
            if last == head.id() {
                TailState::Matches
            } else {
                TailState::Diverged
            }
        } else {
            TailState::Behind
        };
        Ok(state)
    }
}
