//! Frame reader

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::codec::{self, TypeRegistry};
use crate::error::{Error, Result};
use crate::messages::Message;

/// Reads frames and their appended streams from a byte stream
pub struct FrameReader<R> {
    inner: R,
    registry: TypeRegistry,
    max_object_size: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Create a reader that resolves type names against `registry`
    pub fn new(inner: R, registry: TypeRegistry, max_object_size: usize) -> Self {
        Self {
            inner,
            registry,
            max_object_size,
        }
    }

    /// Read the next message, binding every stream placeholder it contains
    pub async fn read_message(&mut self) -> Result<Message> {
        let length = self.inner.read_u32().await.map_err(eof_as_lost)? as usize;
        codec::check_frame_length(length, self.max_object_size)?;

        let mut payload = BytesMut::zeroed(length);
        self.inner
            .read_exact(&mut payload)
            .await
            .map_err(eof_as_lost)?;

        let (message, slots) = codec::decode_payload(payload.freeze(), &self.registry)?;
        if !slots.is_empty() {
            tracing::trace!(streams = slots.len(), "Draining appended streams");
        }
        let mut streamed = 0;
        for slot in slots {
            let content = self.read_stream(&mut streamed).await?;
            slot.bind(content)?;
        }
        tracing::trace!(kind = message.kind().name(), length, "Read frame");
        Ok(message)
    }

    /// Read one appended stream; `streamed` totals the frame's stream bytes
    async fn read_stream(&mut self, streamed: &mut usize) -> Result<Bytes> {
        let mut out = BytesMut::new();
        loop {
            let len = self.inner.read_u16().await.map_err(eof_as_lost)? as usize;
            if len == 0 {
                return Ok(out.freeze());
            }
            *streamed += len;
            codec::check_stream_total(*streamed, self.max_object_size)?;
            let start = out.len();
            out.resize(start + len, 0);
            self.inner
                .read_exact(&mut out[start..])
                .await
                .map_err(eof_as_lost)?;
        }
    }

    /// Consume the reader and return the underlying stream
    pub fn into_inner(self) -> R {
        self.inner
    }
}

fn eof_as_lost(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::ConnectionLost("server closed the connection".to_string())
    } else {
        Error::Io(e)
    }
}
