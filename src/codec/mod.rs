//! Wire frame codec
//!
//! Turns a [`Message`] into a length-prefixed frame and back:
//!
//! ```text
//! [u32 length][u8 version][tagged body] [stream 0 sub-chunks] [stream 1 sub-chunks] ...
//! ```
//!
//! The length covers the version byte and body. Every value in the body is
//! tagged either with a code from the [`KnownType`] table or with the
//! by-name sentinel and a type name checked against a [`TypeRegistry`].
//! Streamable values are replaced by placeholders and their content is
//! appended after the frame (see [`stream`]).

mod decoder;
mod encoder;
mod known_types;
pub mod stream;

pub use decoder::{Decoder, Tag};
pub use encoder::Encoder;
pub use known_types::{KnownType, TypeRegistry, BY_NAME};
pub use stream::{check_stream_total, LobKind, LobValue, StreamSlot};

use bytes::{BufMut, Bytes, BytesMut};

use crate::buffer::ReadBuffer;
use crate::constants::{
    DEFAULT_MAX_OBJECT_SIZE, FRAME_LENGTH_SIZE, MAX_SUB_CHUNK, SUB_CHUNK_LENGTH_SIZE, WIRE_VERSION,
};
use crate::error::{Error, Result};
use crate::messages::Message;

/// A type with a registered wire code and a body encoding
pub trait WireType: Sized {
    /// Registered kind
    const KIND: KnownType;

    /// Write the body (the tag is written by the caller)
    fn write_body(&self, enc: &mut Encoder) -> Result<()>;

    /// Read the body (the tag has already been consumed)
    fn read_body(dec: &mut Decoder<'_>) -> Result<Self>;
}

/// Encoder settings
#[derive(Debug, Clone, Copy)]
pub struct EncodeOptions {
    /// Write registered codes (otherwise every tag is written by name)
    pub use_known_types: bool,
    /// Largest frame payload the peer will accept
    pub max_object_size: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            use_known_types: true,
            max_object_size: DEFAULT_MAX_OBJECT_SIZE,
        }
    }
}

/// Encode a message into a complete frame, including appended streams
pub fn encode(message: &Message) -> Result<Bytes> {
    encode_with(message, &EncodeOptions::default())
}

/// Encode a message with explicit options
pub fn encode_with(message: &Message, options: &EncodeOptions) -> Result<Bytes> {
    let mut enc = Encoder::new(options.use_known_types, options.max_object_size);
    enc.buffer().write_u8(WIRE_VERSION)?;
    enc.write_message(message)?;
    let (payload, streams) = enc.finish();

    let stream_len: usize = streams
        .iter()
        .map(|s| s.len() + (s.len() / MAX_SUB_CHUNK + 2) * SUB_CHUNK_LENGTH_SIZE)
        .sum();
    let mut out = BytesMut::with_capacity(FRAME_LENGTH_SIZE + payload.len() + stream_len);
    out.put_u32(payload.len() as u32);
    out.put_slice(&payload);
    for stream in &streams {
        stream::write_sub_chunks(&mut out, stream);
    }
    Ok(out.freeze())
}

/// Decode a complete in-memory frame, including appended streams
pub fn decode(frame: Bytes, registry: &TypeRegistry) -> Result<Message> {
    decode_with(frame, registry, DEFAULT_MAX_OBJECT_SIZE)
}

/// Decode a complete in-memory frame with an explicit size limit
pub fn decode_with(frame: Bytes, registry: &TypeRegistry, max_object_size: usize) -> Result<Message> {
    let mut buf = ReadBuffer::new(frame);
    let length = buf.read_u32_be()? as usize;
    check_frame_length(length, max_object_size)?;
    let payload = buf.read_bytes_owned(length)?;

    let (message, slots) = decode_payload(payload, registry)?;
    let mut streamed = 0;
    for slot in slots {
        let content = stream::read_sub_chunks(&mut buf, &mut streamed, max_object_size)?;
        slot.bind(content)?;
    }
    if buf.remaining() != 0 {
        return Err(Error::protocol(format!(
            "{} trailing bytes after frame streams",
            buf.remaining()
        )));
    }
    Ok(message)
}

/// Decode a frame payload (`[version][body]`) without its streams
///
/// Returns the message plus one slot per stream placeholder, in the order
/// the streams follow the frame.
pub fn decode_payload(payload: Bytes, registry: &TypeRegistry) -> Result<(Message, Vec<StreamSlot>)> {
    let mut dec = Decoder::new(payload, registry);
    let version = dec.buffer().read_u8()?;
    if version != WIRE_VERSION {
        return Err(Error::UnsupportedVersion {
            expected: WIRE_VERSION,
            actual: version,
        });
    }
    let message = dec.read_message()?;
    let slots = dec.finish()?;
    Ok((message, slots))
}

/// Validate a frame length prefix
pub fn check_frame_length(length: usize, max_object_size: usize) -> Result<()> {
    if length == 0 {
        return Err(Error::protocol("empty frame"));
    }
    if length > max_object_size {
        return Err(Error::FrameTooLarge {
            size: length,
            max: max_object_size,
        });
    }
    Ok(())
}
