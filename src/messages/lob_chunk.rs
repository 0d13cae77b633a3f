//! LOB content chunk

use bytes::Bytes;

use crate::codec::{Decoder, Encoder, KnownType, WireType};
use crate::error::Result;

/// One piece of LOB content returned by `requestNextLobChunk`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobChunk {
    /// Content bytes (UTF-8 for character LOBs)
    pub data: Bytes,
    /// Whether this is the final chunk of the stream
    pub is_last: bool,
}

impl LobChunk {
    /// Create a chunk
    pub fn new(data: impl Into<Bytes>, is_last: bool) -> Self {
        Self {
            data: data.into(),
            is_last,
        }
    }
}

impl WireType for LobChunk {
    const KIND: KnownType = KnownType::LobChunk;

    fn write_body(&self, enc: &mut Encoder) -> Result<()> {
        enc.buffer().write_bytes_with_length(&self.data)?;
        enc.buffer().write_bool(self.is_last)
    }

    fn read_body(dec: &mut Decoder<'_>) -> Result<Self> {
        Ok(Self {
            data: dec.buffer().read_bytes_with_length()?,
            is_last: dec.buffer().read_bool()?,
        })
    }
}
