//! Server-side executions and their result sets
//!
//! An [`Execution`] is the client handle of one submitted request. It serves
//! row batches to the cursor of its [`ResultSet`] and chunks to the LOB
//! streamers opened from it. Closing the execution releases every LOB stream
//! still open and then the server-side result.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::constants::{method, ServiceId};
use crate::cursor::{BatchCursor, BatchSource, CursorOptions, PendingBatch};
use crate::error::{Error, Result};
use crate::lob::{ChunkSource, LobStreamer, PendingChunk, StreamState};
use crate::messages::{CursorType, LobChunk, ResultsMessage};
use crate::row::{LobReference, Value};
use crate::transport::{Session, TypedReply};

struct OpenStream {
    state: Arc<StreamState>,
    reference: LobReference,
}

struct ExecutionInner {
    session: Session,
    id: i64,
    closed: AtomicBool,
    streams: Mutex<HashMap<u64, OpenStream>>,
}

/// Handle to one request running on the server
#[derive(Clone)]
pub struct Execution {
    inner: Arc<ExecutionInner>,
}

impl Execution {
    pub(crate) fn new(session: Session, id: i64) -> Self {
        Self {
            inner: Arc::new(ExecutionInner {
                session,
                id,
                closed: AtomicBool::new(false),
                streams: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Execution id
    pub fn id(&self) -> i64 {
        self.inner.id
    }

    /// Owning session
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Check if the execution has been closed
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Issue a fetch of `row_count` rows from `start_row`
    pub async fn process_cursor_request(
        &self,
        start_row: i64,
        row_count: u32,
    ) -> Result<TypedReply<ResultsMessage>> {
        self.ensure_open()?;
        let reply = self
            .inner
            .session
            .invoke(
                ServiceId::Dqp,
                method::PROCESS_CURSOR_REQUEST,
                vec![
                    Value::Long(self.inner.id),
                    Value::Long(start_row),
                    Value::Integer(row_count.min(i32::MAX as u32) as i32),
                ],
            )
            .await?;
        Ok(TypedReply::new(reply))
    }

    /// Ask the server to cancel the request; true if it was still running
    pub async fn cancel(&self) -> Result<bool> {
        let value = self
            .inner
            .session
            .call(
                ServiceId::Dqp,
                method::CANCEL_REQUEST,
                vec![Value::Long(self.inner.id)],
            )
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// Open a streamer over a LOB cell of this execution's results
    pub fn open_lob(&self, reference: &LobReference) -> Result<LobStreamer> {
        self.ensure_open()?;
        let stream_id = self.inner.session.next_stream_id();
        let streamer = LobStreamer::new(
            Arc::new(self.clone()),
            stream_id,
            reference.clone(),
            self.inner.session.config().call_timeout,
        );
        let mut streams = self.lock_streams();
        streams.retain(|_, open| !open.state.is_released());
        streams.insert(
            stream_id,
            OpenStream {
                state: streamer.state(),
                reference: reference.clone(),
            },
        );
        tracing::debug!(
            execution_id = self.inner.id,
            stream_id,
            reference = %reference.reference_id,
            "LOB stream opened"
        );
        Ok(streamer)
    }

    /// Release open LOB streams and the server-side result
    ///
    /// Closing twice is a no-op. On a closed session nothing is sent.
    pub async fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let streams: Vec<(u64, OpenStream)> = self.lock_streams().drain().collect();
        if self.inner.session.is_closed() {
            for (_, open) in streams {
                open.state.mark_closed();
            }
            return Ok(());
        }
        for (stream_id, open) in streams {
            open.state.mark_closed();
            if open.state.claim_release() {
                if let Err(e) = self.send_close_stream(stream_id, &open.reference).await {
                    tracing::debug!(stream_id, error = %e, "Closing LOB stream failed");
                }
            }
        }
        self.inner
            .session
            .call(
                ServiceId::Dqp,
                method::CLOSE_REQUEST,
                vec![Value::Long(self.inner.id)],
            )
            .await?;
        tracing::debug!(execution_id = self.inner.id, "Execution closed");
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::CursorClosed)
        } else {
            Ok(())
        }
    }

    fn lock_streams(&self) -> std::sync::MutexGuard<'_, HashMap<u64, OpenStream>> {
        self.inner
            .streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn send_close_stream(&self, stream_id: u64, reference: &LobReference) -> Result<()> {
        self.inner
            .session
            .call(
                ServiceId::Dqp,
                method::CLOSE_LOB_CHUNK_STREAM,
                vec![
                    Value::Long(stream_id as i64),
                    Value::Long(self.inner.id),
                    Value::from(reference.reference_id.as_str()),
                ],
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl BatchSource for Execution {
    async fn request_batch(&self, start_row: i64, row_count: u32) -> Result<PendingBatch> {
        Ok(Box::new(self.process_cursor_request(start_row, row_count).await?))
    }

    async fn close(&self) -> Result<()> {
        Execution::close(self).await
    }
}

#[async_trait]
impl ChunkSource for Execution {
    async fn request_chunk(&self, stream_id: u64, reference: &LobReference) -> Result<PendingChunk> {
        self.ensure_open()?;
        let reply = self
            .inner
            .session
            .invoke(
                ServiceId::Dqp,
                method::REQUEST_NEXT_LOB_CHUNK,
                vec![
                    Value::Long(stream_id as i64),
                    Value::Long(self.inner.id),
                    Value::from(reference.reference_id.as_str()),
                ],
            )
            .await?;
        Ok(Box::new(TypedReply::<LobChunk>::new(reply)))
    }

    async fn close_stream(&self, stream_id: u64, reference: &LobReference) -> Result<()> {
        self.lock_streams().remove(&stream_id);
        if self.is_closed() || self.inner.session.is_closed() {
            return Ok(());
        }
        self.send_close_stream(stream_id, reference).await
    }
}

impl std::fmt::Debug for Execution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Execution")
            .field("id", &self.inner.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Results of an executed request
///
/// Dereferences to its [`BatchCursor`] for navigation and row access.
///
/// # Example
///
/// ```rust,no_run
/// # async fn example(session: &fedquery_rs::Session) -> fedquery_rs::Result<()> {
/// let mut rs = session.query("SELECT id, name FROM parts").await?;
/// while rs.next().await? {
///     println!("{:?}", rs.get(1)?);
/// }
/// rs.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ResultSet {
    cursor: BatchCursor,
    execution: Execution,
}

impl ResultSet {
    pub(crate) fn new(
        execution: Execution,
        first: ResultsMessage,
        cursor_type: CursorType,
        fetch_size: u32,
    ) -> Result<Self> {
        let mut options = CursorOptions::from_config(execution.session().config(), cursor_type);
        if fetch_size > 0 {
            options = options.fetch_size(fetch_size);
        }
        let cursor = BatchCursor::new(Arc::new(execution.clone()), first, options)?;
        Ok(Self { cursor, execution })
    }

    /// The execution behind these results
    pub fn execution(&self) -> &Execution {
        &self.execution
    }

    /// Open a streamer over column `index` (0-based) of the current row
    pub fn get_lob(&self, index: usize) -> Result<LobStreamer> {
        let value = self.cursor.get(index)?;
        let reference = value.as_lob_ref().ok_or_else(|| {
            Error::DataConversion(format!(
                "column {} holds {}, not a LOB reference",
                index,
                value.type_name()
            ))
        })?;
        self.execution.open_lob(reference)
    }

    /// Open a streamer over a LOB reference
    pub fn open_lob(&self, reference: &LobReference) -> Result<LobStreamer> {
        self.execution.open_lob(reference)
    }

    /// Close the cursor, its LOB streams and the server-side result
    pub async fn close(&mut self) -> Result<()> {
        self.cursor.close().await
    }
}

impl Deref for ResultSet {
    type Target = BatchCursor;

    fn deref(&self) -> &BatchCursor {
        &self.cursor
    }
}

impl DerefMut for ResultSet {
    fn deref_mut(&mut self) -> &mut BatchCursor {
        &mut self.cursor
    }
}
