use std::io::Read;

use bincode::Options;
use shared_types::SignedBlock;

use crate::domain::errors::SerializationError;
use crate::ports::outbound::BlockSerializer;

/// Upper bound on one encoded block; also caps allocations driven by
/// length prefixes read from a damaged log.
pub const MAX_BLOCK_SIZE: u64 = 64 * 1024 * 1024;

/// Default block serializer using bincode.
///
/// bincode's fixed-int encoding is length-prefixed, so a block can be read
/// back from a stream without knowing its size up front.
#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeBlockSerializer;

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_limit(MAX_BLOCK_SIZE)
}

impl BlockSerializer for BincodeBlockSerializer {
    fn serialize(&self, block: &SignedBlock) -> Result<Vec<u8>, SerializationError> {
        options().serialize(block).map_err(|e| SerializationError {
            message: e.to_string(),
        })
    }

    fn deserialize(&self, data: &[u8]) -> Result<SignedBlock, SerializationError> {
        options().deserialize(data).map_err(|e| SerializationError {
            message: e.to_string(),
        })
    }

    fn deserialize_from(&self, reader: &mut dyn Read) -> Result<SignedBlock, SerializationError> {
        options().deserialize_from(reader).map_err(|e| SerializationError {
            message: e.to_string(),
        })
    }
}
