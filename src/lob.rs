//! LOB chunk streaming
//!
//! A [`LobStreamer`] reads the content behind a [`LobReference`] by pulling
//! chunks from the server on demand. Each streamer owns a stream id assigned
//! by its session, so several streamers can be open against one execution.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example(rs: &mut fedquery_rs::ResultSet) -> fedquery_rs::Result<()> {
//! rs.next().await?;
//! let mut doc = rs.get_lob(2)?;
//! let text = doc.read_to_string().await?;
//! doc.close().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Buf, Bytes};

use crate::error::{Error, Result};
use crate::messages::LobChunk;
use crate::row::LobReference;
use crate::transport::PendingCall;

/// An outstanding chunk request
pub type PendingChunk = Box<dyn PendingCall<LobChunk>>;

/// Server side of a LOB stream
#[async_trait]
pub trait ChunkSource: Send + Sync {
    /// Ask for the next chunk of `reference` on stream `stream_id`
    async fn request_chunk(&self, stream_id: u64, reference: &LobReference) -> Result<PendingChunk>;

    /// Release the remote stream
    async fn close_stream(&self, stream_id: u64, reference: &LobReference) -> Result<()>;
}

/// Lifecycle flags shared between a streamer and its owning execution
#[derive(Debug, Default)]
pub(crate) struct StreamState {
    closed: AtomicBool,
    released: AtomicBool,
}

impl StreamState {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Claim the right to release the remote stream; true exactly once
    pub(crate) fn claim_release(&self) -> bool {
        !self.released.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

/// Pull-based reader over a remote LOB
pub struct LobStreamer {
    source: Arc<dyn ChunkSource>,
    stream_id: u64,
    reference: LobReference,
    timeout: Duration,
    chunk: Bytes,
    last_seen: bool,
    in_flight: Option<PendingChunk>,
    state: Arc<StreamState>,
    bytes_read: u64,
}

impl LobStreamer {
    /// Create a streamer for `reference` on stream `stream_id`
    pub fn new(
        source: Arc<dyn ChunkSource>,
        stream_id: u64,
        reference: LobReference,
        timeout: Duration,
    ) -> Self {
        Self {
            source,
            stream_id,
            reference,
            timeout,
            chunk: Bytes::new(),
            last_seen: false,
            in_flight: None,
            state: Arc::new(StreamState::default()),
            bytes_read: 0,
        }
    }

    pub(crate) fn state(&self) -> Arc<StreamState> {
        self.state.clone()
    }

    /// Stream id used to correlate chunk requests
    pub fn stream_id(&self) -> u64 {
        self.stream_id
    }

    /// Reference being streamed
    pub fn reference(&self) -> &LobReference {
        &self.reference
    }

    /// Bytes handed to the caller so far
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Check if the streamer is closed
    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    /// Read one byte; `None` at end of stream
    pub async fn read_byte(&mut self) -> Result<Option<u8>> {
        if !self.fill().await? {
            return Ok(None);
        }
        let byte = self.chunk.get_u8();
        self.bytes_read += 1;
        Ok(Some(byte))
    }

    /// Read up to `buf.len()` bytes; 0 at end of stream
    ///
    /// Returns after the current chunk is drained, so a read may be short.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            self.ensure_open()?;
            return Ok(0);
        }
        if !self.fill().await? {
            return Ok(0);
        }
        let n = buf.len().min(self.chunk.len());
        self.chunk.copy_to_slice(&mut buf[..n]);
        self.bytes_read += n as u64;
        Ok(n)
    }

    /// Read one character of a character LOB; `None` at end of stream
    ///
    /// A character split across chunks is reassembled.
    pub async fn read_char(&mut self) -> Result<Option<char>> {
        if !self.reference.kind.is_character() {
            return Err(Error::DataConversion(format!(
                "{:?} content is not character data",
                self.reference.kind
            )));
        }
        let Some(lead) = self.read_byte().await? else {
            return Ok(None);
        };
        let width = match lead {
            0x00..=0x7F => return Ok(Some(lead as char)),
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => {
                return Err(Error::DataConversion(format!(
                    "invalid UTF-8 lead byte 0x{:02x}",
                    lead
                )))
            }
        };
        let mut encoded = [lead, 0, 0, 0];
        for slot in encoded.iter_mut().take(width).skip(1) {
            *slot = self.read_byte().await?.ok_or_else(|| {
                Error::DataConversion("stream ended inside a UTF-8 sequence".to_string())
            })?;
        }
        std::str::from_utf8(&encoded[..width])
            .ok()
            .and_then(|s| s.chars().next())
            .map(Some)
            .ok_or_else(|| Error::DataConversion("invalid UTF-8 sequence".to_string()))
    }

    /// Read the rest of the stream
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while self.fill().await? {
            out.extend_from_slice(&self.chunk);
            self.bytes_read += self.chunk.len() as u64;
            self.chunk.clear();
        }
        Ok(out)
    }

    /// Read the rest of a character LOB as a string
    pub async fn read_to_string(&mut self) -> Result<String> {
        if !self.reference.kind.is_character() {
            return Err(Error::DataConversion(format!(
                "{:?} content is not character data",
                self.reference.kind
            )));
        }
        let bytes = self.read_to_end().await?;
        String::from_utf8(bytes).map_err(|e| Error::DataConversion(e.to_string()))
    }

    /// Close the streamer and release the remote stream
    ///
    /// An in-flight chunk request is abandoned; its reply is discarded.
    /// Closing twice is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        if self.state.is_closed() {
            return Ok(());
        }
        self.state.mark_closed();
        self.in_flight = None;
        self.chunk.clear();
        if self.state.claim_release() {
            self.source
                .close_stream(self.stream_id, &self.reference)
                .await?;
        }
        tracing::debug!(stream_id = self.stream_id, "LOB stream closed");
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state.is_closed() {
            Err(Error::StreamClosed)
        } else {
            Ok(())
        }
    }

    /// Make buffered bytes available; false at end of stream
    async fn fill(&mut self) -> Result<bool> {
        loop {
            self.ensure_open()?;
            if self.chunk.has_remaining() {
                return Ok(true);
            }
            if self.last_seen {
                return Ok(false);
            }
            if self.in_flight.is_none() {
                let call = self
                    .source
                    .request_chunk(self.stream_id, &self.reference)
                    .await?;
                self.in_flight = Some(call);
            }
            let Some(call) = self.in_flight.as_mut() else {
                continue;
            };
            let chunk = call.wait(self.timeout).await?;
            self.in_flight = None;
            tracing::trace!(
                stream_id = self.stream_id,
                len = chunk.data.len(),
                is_last = chunk.is_last,
                "LOB chunk received"
            );
            self.chunk = chunk.data;
            if chunk.is_last {
                self.last_seen = true;
                self.release_exhausted().await;
            }
        }
    }

    /// The server drops its side once the last chunk is sent; tell it anyway
    async fn release_exhausted(&mut self) {
        if !self.state.claim_release() {
            return;
        }
        if let Err(e) = self.source.close_stream(self.stream_id, &self.reference).await {
            tracing::debug!(stream_id = self.stream_id, error = %e, "Releasing exhausted LOB stream failed");
        }
    }
}

impl std::fmt::Debug for LobStreamer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LobStreamer")
            .field("stream_id", &self.stream_id)
            .field("reference", &self.reference.reference_id)
            .field("last_seen", &self.last_seen)
            .field("closed", &self.state.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::LobKind;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct Ready(Option<LobChunk>);

    #[async_trait]
    impl PendingCall<LobChunk> for Ready {
        async fn wait(&mut self, _timeout: Duration) -> Result<LobChunk> {
            self.0
                .take()
                .ok_or_else(|| Error::protocol("reply already consumed"))
        }
    }

    #[derive(Default)]
    struct Chunks {
        queue: Mutex<VecDeque<LobChunk>>,
        closes: AtomicUsize,
    }

    impl Chunks {
        fn new(parts: &[&[u8]]) -> Arc<Self> {
            let n = parts.len();
            let queue = parts
                .iter()
                .enumerate()
                .map(|(i, p)| LobChunk::new(Bytes::copy_from_slice(p), i + 1 == n))
                .collect();
            Arc::new(Self {
                queue: Mutex::new(queue),
                closes: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ChunkSource for Chunks {
        async fn request_chunk(&self, _id: u64, _r: &LobReference) -> Result<PendingChunk> {
            let chunk = self.queue.lock().unwrap().pop_front();
            Ok(Box::new(Ready(chunk)))
        }

        async fn close_stream(&self, _id: u64, _r: &LobReference) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn streamer(source: &Arc<Chunks>, kind: LobKind) -> LobStreamer {
        LobStreamer::new(
            source.clone(),
            7,
            LobReference::new("lob-7", kind),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn test_read_across_chunks_then_eof() {
        let source = Chunks::new(&[b"ab", b"", b"cd"]);
        let mut s = streamer(&source, LobKind::Blob);
        let mut seen = Vec::new();
        while let Some(b) = s.read_byte().await.unwrap() {
            seen.push(b);
        }
        assert_eq!(seen, b"abcd");
        for _ in 0..3 {
            assert_eq!(s.read_byte().await.unwrap(), None);
        }
        assert_eq!(source.closes.load(Ordering::SeqCst), 1);
        s.close().await.unwrap();
        assert_eq!(source.closes.load(Ordering::SeqCst), 1);
        assert!(matches!(s.read_byte().await, Err(Error::StreamClosed)));
    }

    #[tokio::test]
    async fn test_char_split_across_chunks() {
        let text = "x\u{e9}\u{1f600}";
        let bytes = text.as_bytes();
        let source = Chunks::new(&[&bytes[..2], &bytes[2..4], &bytes[4..]]);
        let mut s = streamer(&source, LobKind::Clob);
        let mut out = String::new();
        while let Some(c) = s.read_char().await.unwrap() {
            out.push(c);
        }
        assert_eq!(out, text);
    }

    #[tokio::test]
    async fn test_close_before_exhaustion_releases_once() {
        let source = Chunks::new(&[b"abc", b"def"]);
        let mut s = streamer(&source, LobKind::Blob);
        let mut buf = [0u8; 2];
        assert_eq!(s.read(&mut buf).await.unwrap(), 2);
        s.close().await.unwrap();
        s.close().await.unwrap();
        assert_eq!(source.closes.load(Ordering::SeqCst), 1);
        assert!(matches!(s.read(&mut buf).await, Err(Error::StreamClosed)));
    }

    #[tokio::test]
    async fn test_blob_is_not_character_data() {
        let source = Chunks::new(&[b"abc"]);
        let mut s = streamer(&source, LobKind::Blob);
        let err = s.read_char().await.unwrap_err();
        assert!(matches!(err, Error::DataConversion(_)));
        assert!(!err.is_fatal());
        assert!(s.read_to_string().await.is_err());
        assert_eq!(s.read_to_end().await.unwrap(), b"abc");
    }
}
