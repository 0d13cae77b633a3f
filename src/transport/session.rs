//! Session over one socket
//!
//! A [`Session`] owns one connected byte stream. Outbound frames are queued
//! to a dedicated writer task, so a caller that gives up mid-call can never
//! leave a partial frame on the wire. A single reader task decodes inbound
//! frames and hands each [`ServiceReply`] to the caller waiting on its
//! message key. Any transport or decode failure closes the session and
//! fails every outstanding call with `ConnectionLost`.

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::auth::{Credentials, TokenNegotiator, MAX_LOGON_ROUNDS};
use crate::codec;
use crate::config::Config;
use crate::constants::{method, ServiceId};
use crate::error::{Error, Result};
use crate::execution::{Execution, ResultSet};
use crate::frame::{FrameReader, FrameWriter};
use crate::messages::{
    Handshake, LogonResult, Message, RequestMessage, ResultsMessage, ServiceInvocation,
    ServiceReply,
};
use crate::row::Value;
use crate::transport::pending::{PendingMap, PendingReply};
use crate::transport::tcp::SessionStream;

/// Global counter for session IDs
static SESSION_ID_COUNTER: AtomicU32 = AtomicU32::new(1);

/// Queue depth between callers and the writer task
const OUTBOUND_CAPACITY: usize = 64;

/// Deadline for the best-effort logoff sent by `close`
const LOGOFF_TIMEOUT: Duration = Duration::from_secs(2);

enum Outbound {
    Frame(Bytes),
    Shutdown,
}

struct SessionInner {
    id: u32,
    config: Config,
    server: Handshake,
    outbound: mpsc::Sender<Outbound>,
    pending: Arc<PendingMap>,
    message_keys: AtomicU64,
    execution_ids: AtomicI64,
    stream_ids: AtomicU64,
    logon: Mutex<Option<LogonResult>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.lock().unwrap_or_else(PoisonError::into_inner).take() {
            reader.abort();
        }
    }
}

/// A connected, handshaken session
///
/// Cloning is cheap; all clones share the socket.
///
/// # Example
///
/// ```rust,no_run
/// use fedquery_rs::{Config, Session};
///
/// # async fn example() -> fedquery_rs::Result<()> {
/// let config = Config::new("dqp.internal", 31000).credentials("scott", "tiger");
/// let session = Session::connect(config).await?;
/// session.logon_with_config().await?;
///
/// let mut results = session.query("SELECT id, body FROM docs").await?;
/// while results.next().await? {
///     let id = results.get(0)?.as_i64();
///     println!("{:?}", id);
/// }
/// results.close().await?;
/// session.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Connect to the primary host in `config` and perform the handshake
    pub async fn connect(config: Config) -> Result<Self> {
        config.validate()?;
        let stream = SessionStream::connect(&config.host, &config).await?;
        Self::from_stream(stream, config).await
    }

    /// Run a session over an already connected stream
    pub async fn from_stream<S>(stream: S, config: Config) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        config.validate()?;
        let id = SESSION_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let (read_half, write_half) = tokio::io::split(stream);
        let mut reader = FrameReader::new(
            read_half,
            config.allowed_types.clone(),
            config.max_object_size,
        );
        let mut writer = FrameWriter::new(write_half, config.encode_options());

        let server = tokio::time::timeout(
            config.connect_timeout,
            handshake(&mut reader, &mut writer),
        )
        .await
        .map_err(|_| Error::ConnectionTimeout(config.connect_timeout))??;
        tracing::debug!(
            session_id = id,
            server_version = %server.product_version,
            "Handshake complete"
        );

        let pending = Arc::new(PendingMap::default());
        let (outbound, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        tokio::spawn(write_loop(writer, rx, pending.clone(), id));
        let reader_task = tokio::spawn(read_loop(reader, pending.clone(), id));

        Ok(Session {
            inner: Arc::new(SessionInner {
                id,
                config,
                server,
                outbound,
                pending,
                message_keys: AtomicU64::new(0),
                execution_ids: AtomicI64::new(0),
                stream_ids: AtomicU64::new(0),
                logon: Mutex::new(None),
                reader: Mutex::new(Some(reader_task)),
            }),
        })
    }

    /// Get the session ID
    pub fn id(&self) -> u32 {
        self.inner.id
    }

    /// Configuration this session runs with
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Handshake sent by the server
    pub fn server_handshake(&self) -> &Handshake {
        &self.inner.server
    }

    /// Result of the last successful logon
    pub fn logon_info(&self) -> Option<LogonResult> {
        self.inner
            .logon
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Check if the session is closed or lost
    pub fn is_closed(&self) -> bool {
        self.inner.pending.is_shut_down()
    }

    /// Next execution id (monotonic per session)
    pub fn next_execution_id(&self) -> i64 {
        self.inner.execution_ids.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Next LOB stream id (monotonic per session)
    pub(crate) fn next_stream_id(&self) -> u64 {
        self.inner.stream_ids.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Send an invocation and return a handle to its reply
    pub async fn invoke(
        &self,
        service: ServiceId,
        method: &'static str,
        args: Vec<Value>,
    ) -> Result<PendingReply> {
        let key = self.inner.message_keys.fetch_add(1, Ordering::Relaxed) + 1;
        let rx = self.inner.pending.register(key)?;
        let reply = PendingReply::new(
            key,
            method,
            rx,
            self.inner.pending.clone(),
            self.inner.config.socket_timeout,
        );

        let message = Message::Invocation(ServiceInvocation::new(key, service, method, args));
        let frame = codec::encode_with(&message, &self.inner.config.encode_options())?;
        tracing::trace!(
            session_id = self.inner.id,
            key,
            service = service.as_str(),
            method,
            "Invoking"
        );
        self.inner
            .outbound
            .send(Outbound::Frame(frame))
            .await
            .map_err(|_| self.inner.pending.shutdown_error())?;
        Ok(reply)
    }

    /// Invoke and wait with the configured call timeout
    pub async fn call(
        &self,
        service: ServiceId,
        method: &'static str,
        args: Vec<Value>,
    ) -> Result<Value> {
        self.call_with_timeout(service, method, args, self.inner.config.call_timeout)
            .await
    }

    /// Invoke and wait with an explicit timeout
    pub async fn call_with_timeout(
        &self,
        service: ServiceId,
        method: &'static str,
        args: Vec<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        self.invoke(service, method, args).await?.wait(timeout).await
    }

    /// Authenticate this session
    pub async fn logon(
        &self,
        credentials: Credentials,
        negotiator: Option<&dyn TokenNegotiator>,
    ) -> Result<LogonResult> {
        let needs_token = credentials.needs_initial_token();
        let mut request = credentials.into_request();
        if needs_token {
            let negotiator = negotiator.ok_or_else(|| {
                Error::AuthenticationFailed("no password, token or negotiator given".to_string())
            })?;
            request.token = Some(negotiator.initial_token().await?);
        }

        let mut result = self
            .logon_step(method::LOGON, Message::LogonRequest(request).into())
            .await?;
        let mut rounds = 0;
        while let Some(challenge) = result.continuation.take() {
            rounds += 1;
            if rounds > MAX_LOGON_ROUNDS {
                return Err(Error::AuthenticationFailed(format!(
                    "token exchange did not finish after {} rounds",
                    MAX_LOGON_ROUNDS
                )));
            }
            let negotiator = negotiator.ok_or_else(|| {
                Error::AuthenticationFailed(
                    "server requested a token exchange but no negotiator is configured"
                        .to_string(),
                )
            })?;
            let token = negotiator.next_token(&challenge).await?;
            tracing::trace!(session_id = self.inner.id, round = rounds, "Continuing logon");
            result = self
                .logon_step(method::CONTINUE_LOGON, Value::Binary(token))
                .await?;
        }

        tracing::debug!(
            session_id = self.inner.id,
            user = %result.user_name,
            remote_session = %result.session_id,
            "Logged on"
        );
        *self.inner.logon.lock().unwrap_or_else(PoisonError::into_inner) = Some(result.clone());
        Ok(result)
    }

    /// Authenticate with the user and password from the configuration
    pub async fn logon_with_config(&self) -> Result<LogonResult> {
        let credentials = self.inner.config.logon_credentials().ok_or_else(|| {
            Error::InvalidConfig("no user name configured for logon".to_string())
        })?;
        self.logon(credentials, None).await
    }

    async fn logon_step(&self, method: &'static str, arg: Value) -> Result<LogonResult> {
        let value = self
            .call(ServiceId::Logon, method, vec![arg])
            .await
            .map_err(|e| match e {
                Error::Remote(remote) => Error::AuthenticationFailed(remote.to_string()),
                other => other,
            })?;
        LogonResult::try_from(value)
    }

    /// Round-trip a liveness check
    pub async fn ping(&self) -> Result<()> {
        self.call(ServiceId::Logon, method::PING, Vec::new()).await?;
        Ok(())
    }

    /// End the remote session
    pub async fn logoff(&self) -> Result<()> {
        self.call(ServiceId::Logon, method::LOGOFF, Vec::new()).await?;
        self.inner
            .logon
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }

    /// Build a request with a fresh execution id and the configured fetch size
    pub fn new_request(&self, sql: impl Into<String>) -> RequestMessage {
        RequestMessage::new(self.next_execution_id(), sql, self.inner.config.fetch_size)
    }

    /// Execute `sql` with default settings
    pub async fn query(&self, sql: impl Into<String>) -> Result<ResultSet> {
        self.execute(self.new_request(sql)).await
    }

    /// Submit a request and return its result set, seeded with the first batch
    ///
    /// When the request carries a query timeout and no results arrive in
    /// time, a `cancelRequest` is sent for the execution and the timeout is
    /// returned.
    pub async fn execute(&self, request: RequestMessage) -> Result<ResultSet> {
        let execution = Execution::new(self.clone(), request.execution_id);
        let query_timeout = request.query_timeout;
        let cursor_type = request.cursor_type;
        let fetch_size = request.fetch_size;
        tracing::debug!(
            session_id = self.inner.id,
            execution_id = request.execution_id,
            "Executing request"
        );

        let mut reply = self
            .invoke(
                ServiceId::Dqp,
                method::EXECUTE_REQUEST,
                vec![
                    Value::Long(request.execution_id),
                    Message::Request(request).into(),
                ],
            )
            .await?;

        let outcome = reply
            .wait(query_timeout.unwrap_or(self.inner.config.call_timeout))
            .await;
        drop(reply);

        let first = match outcome {
            Err(e) if e.is_timeout() && query_timeout.is_some() => {
                tracing::debug!(
                    execution_id = execution.id(),
                    "Query timeout elapsed, cancelling"
                );
                if let Err(cancel_err) = execution.cancel().await {
                    tracing::warn!(
                        execution_id = execution.id(),
                        error = %cancel_err,
                        "Cancel request failed"
                    );
                }
                return Err(e);
            }
            other => ResultsMessage::try_from(other?)?,
        };

        ResultSet::new(execution, first, cursor_type, fetch_size)
    }

    /// Close the session
    ///
    /// Sends a best-effort `logoff` if logged on, then fails any outstanding
    /// calls with `SessionClosed` and shuts the socket down.
    pub async fn close(&self) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        if self.logon_info().is_some() {
            if let Err(e) = self
                .call_with_timeout(ServiceId::Logon, method::LOGOFF, Vec::new(), LOGOFF_TIMEOUT)
                .await
            {
                tracing::debug!(session_id = self.inner.id, error = %e, "Logoff during close failed");
            }
        }
        self.inner.pending.close();
        let _ = self.inner.outbound.send(Outbound::Shutdown).await;
        if let Some(reader) = self
            .inner
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            reader.abort();
        }
        tracing::debug!(session_id = self.inner.id, "Session closed");
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("host", &self.inner.config.host)
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn handshake<R, W>(reader: &mut FrameReader<R>, writer: &mut FrameWriter<W>) -> Result<Handshake>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let server = Handshake::try_from(reader.read_message().await?)?;
    server.validate()?;
    writer
        .write_message(&Message::Handshake(Handshake::client()))
        .await?;
    Ok(server)
}

async fn read_loop<R>(mut reader: FrameReader<R>, pending: Arc<PendingMap>, session_id: u32)
where
    R: AsyncRead + Unpin,
{
    loop {
        match reader.read_message().await {
            Ok(Message::Reply(reply)) => {
                let key = reply.message_key;
                if let Err(e) = check_reply(&reply) {
                    tracing::warn!(
                        session_id,
                        key,
                        error = %e,
                        code = e.code(),
                        "Malformed reply, session lost"
                    );
                    let reason = e.to_string();
                    pending.fail(key, e);
                    pending.fail_all(&reason);
                    return;
                }
                if !pending.complete(reply) {
                    tracing::debug!(session_id, key, "Discarding reply nobody is waiting for");
                }
            }
            Ok(other) => {
                tracing::warn!(
                    session_id,
                    kind = other.kind().name(),
                    "Ignoring unsolicited message"
                );
            }
            Err(e) => {
                if pending.is_shut_down() {
                    tracing::debug!(session_id, "Reader stopped");
                } else {
                    tracing::warn!(session_id, error = %e, code = e.code(), "Session lost");
                    pending.fail_all(&e.to_string());
                }
                return;
            }
        }
    }
}

/// Reject replies whose payload is corrupt beyond what decoding checks
fn check_reply(reply: &ServiceReply) -> Result<()> {
    if let Ok(Value::Message(message)) = &reply.outcome {
        if let Message::Results(results) = message.as_ref() {
            results.validate()?;
        }
    }
    Ok(())
}

async fn write_loop<W>(
    mut writer: FrameWriter<W>,
    mut rx: mpsc::Receiver<Outbound>,
    pending: Arc<PendingMap>,
    session_id: u32,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(item) = rx.recv().await {
        match item {
            Outbound::Frame(frame) => {
                if let Err(e) = writer.write_frame(&frame).await {
                    tracing::warn!(session_id, error = %e, "Write failed, session lost");
                    pending.fail_all(&e.to_string());
                    return;
                }
            }
            Outbound::Shutdown => {
                let _ = writer.shutdown().await;
                return;
            }
        }
    }
}
