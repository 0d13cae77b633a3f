//! Out-of-band stream payloads
//!
//! Streamable values (CLOB/BLOB/XML content, large parameters) are never
//! written inline. The body carries a `StreamReference` placeholder and the
//! raw bytes follow the frame as a sequence of sub-chunks:
//!
//! ```text
//! [u16 len][len bytes] [u16 len][len bytes] ... [u16 0]
//! ```
//!
//! Streams are appended in the order their placeholders appear in the body,
//! and readers must consume them in that same order.

use std::fmt;
use std::sync::{Arc, OnceLock};

use bytes::{BufMut, Bytes, BytesMut};

use crate::buffer::ReadBuffer;
use crate::constants::MAX_SUB_CHUNK;
use crate::error::{Error, Result};

/// Flavor of large-object content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LobKind {
    /// Binary content
    Blob = 0,
    /// Character content (UTF-8 on the wire)
    Clob = 1,
    /// XML document (UTF-8 on the wire)
    Xml = 2,
}

impl LobKind {
    /// Check if content of this kind is character data
    pub fn is_character(&self) -> bool {
        matches!(self, LobKind::Clob | LobKind::Xml)
    }
}

impl TryFrom<u8> for LobKind {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(LobKind::Blob),
            1 => Ok(LobKind::Clob),
            2 => Ok(LobKind::Xml),
            _ => Err(Error::protocol(format!("invalid LOB kind {}", value))),
        }
    }
}

/// Large-object content carried out-of-band in a frame
///
/// On the encoding side the content is known up front. On the decoding side
/// the value is created from a placeholder and bound once the stream that
/// follows the frame has been read; until then [`LobValue::bytes`] reports
/// that the content is unavailable.
#[derive(Clone)]
pub struct LobValue {
    kind: LobKind,
    content: Arc<OnceLock<Bytes>>,
}

impl LobValue {
    fn bound(kind: LobKind, data: Bytes) -> Self {
        let content = OnceLock::new();
        let _ = content.set(data);
        Self {
            kind,
            content: Arc::new(content),
        }
    }

    /// Binary content
    pub fn blob(data: impl Into<Bytes>) -> Self {
        Self::bound(LobKind::Blob, data.into())
    }

    /// Character content
    pub fn clob(text: impl Into<String>) -> Self {
        Self::bound(LobKind::Clob, Bytes::from(text.into()))
    }

    /// XML content
    pub fn xml(text: impl Into<String>) -> Self {
        Self::bound(LobKind::Xml, Bytes::from(text.into()))
    }

    /// Create a placeholder and the slot that will later fill it
    pub(crate) fn unbound(kind: LobKind) -> (Self, StreamSlot) {
        let content = Arc::new(OnceLock::new());
        let slot = StreamSlot {
            kind,
            content: Arc::clone(&content),
        };
        (Self { kind, content }, slot)
    }

    /// Kind of content
    pub fn kind(&self) -> LobKind {
        self.kind
    }

    /// Check if the content has been read from the transport
    pub fn is_available(&self) -> bool {
        self.content.get().is_some()
    }

    /// Raw content bytes
    pub fn bytes(&self) -> Result<&Bytes> {
        self.content
            .get()
            .ok_or_else(|| Error::protocol("stream content not yet read from transport"))
    }

    /// Content decoded as UTF-8 text
    pub fn to_text(&self) -> Result<String> {
        let bytes = self.bytes()?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|e| Error::DataConversion(e.to_string()))
    }

    /// Content length in bytes, if available
    pub fn len(&self) -> Option<usize> {
        self.content.get().map(Bytes::len)
    }
}

impl fmt::Debug for LobValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LobValue")
            .field("kind", &self.kind)
            .field("len", &self.len())
            .finish()
    }
}

impl PartialEq for LobValue {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.content.get() == other.content.get()
    }
}

/// Decoder-side handle that binds a placeholder to its stream content
#[derive(Debug)]
pub struct StreamSlot {
    kind: LobKind,
    content: Arc<OnceLock<Bytes>>,
}

impl StreamSlot {
    /// Kind of the placeholder this slot fills
    pub fn kind(&self) -> LobKind {
        self.kind
    }

    /// Bind the stream content read from the transport
    pub fn bind(self, data: Bytes) -> Result<()> {
        self.content
            .set(data)
            .map_err(|_| Error::protocol("stream placeholder bound twice"))
    }
}

/// Append `data` as a terminated sub-chunk sequence
pub fn write_sub_chunks(out: &mut BytesMut, data: &[u8]) {
    for chunk in data.chunks(MAX_SUB_CHUNK) {
        out.put_u16(chunk.len() as u16);
        out.put_slice(chunk);
    }
    out.put_u16(0);
}

/// Read one terminated sub-chunk sequence from an in-memory buffer
///
/// `used` counts stream bytes already read for the same frame; the total
/// may not exceed `max`.
pub fn read_sub_chunks(buf: &mut ReadBuffer, used: &mut usize, max: usize) -> Result<Bytes> {
    let mut out = BytesMut::new();
    loop {
        let len = buf.read_u16_be()? as usize;
        if len == 0 {
            break;
        }
        *used += len;
        check_stream_total(*used, max)?;
        out.extend_from_slice(&buf.read_bytes_owned(len)?);
    }
    Ok(out.freeze())
}

/// Fail once the streams appended to one frame grow past `max` bytes
pub fn check_stream_total(total: usize, max: usize) -> Result<()> {
    if total > max {
        return Err(Error::FrameTooLarge { size: total, max });
    }
    Ok(())
}
