//! Wire encoding for block payloads.
//!
//! Control messages carry no payload; only [`DataBlock`]s cross the
//! transport in serialized form.

use minato_core::error::{Error, Result};
use minato_core::DataBlock;

pub fn encode_block(block: &DataBlock) -> Result<Vec<u8>> {
    bincode::serialize(block).map_err(|e| Error::Transport {
        message: format!("encode block: {}", e),
    })
}

pub fn decode_block(bytes: &[u8]) -> Result<DataBlock> {
    bincode::deserialize(bytes).map_err(|e| Error::Transport {
        message: format!("decode block: {}", e),
    })
}
