//! Frame writer

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::codec::{self, EncodeOptions};
use crate::error::Result;
use crate::messages::Message;

/// Encodes messages and writes them as frames
pub struct FrameWriter<W> {
    inner: W,
    options: EncodeOptions,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Create a writer with the given encoder options
    pub fn new(inner: W, options: EncodeOptions) -> Self {
        Self { inner, options }
    }

    /// Encode and write one message, then flush
    pub async fn write_message(&mut self, message: &Message) -> Result<()> {
        let frame = codec::encode_with(message, &self.options)?;
        tracing::trace!(kind = message.kind().name(), bytes = frame.len(), "Writing frame");
        self.write_frame(&frame).await
    }

    /// Write an already encoded frame, then flush
    pub async fn write_frame(&mut self, frame: &Bytes) -> Result<()> {
        self.inner.write_all(frame).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Shut down the write half
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}
