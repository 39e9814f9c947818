//! # Outbound Ports (Driven Ports)
//!
//! Dependencies the block log requires from the chain layer.

use std::io::Read;

use shared_types::SignedBlock;

use crate::domain::errors::SerializationError;

/// Abstract interface for block serialization.
///
/// The log stores whatever bytes `serialize` produces. Forward index replay
/// needs `deserialize_from` to consume exactly one block from a stream, so the
/// encoding must be self-delimiting.
pub trait BlockSerializer: Send + Sync {
    /// Serialize a block to bytes.
    fn serialize(&self, block: &SignedBlock) -> Result<Vec<u8>, SerializationError>;

    /// Deserialize one block from a byte slice holding exactly that block.
    fn deserialize(&self, data: &[u8]) -> Result<SignedBlock, SerializationError>;

    /// Deserialize one block from a stream, leaving the stream right after it.
    fn deserialize_from(&self, reader: &mut dyn Read) -> Result<SignedBlock, SerializationError>;
}
