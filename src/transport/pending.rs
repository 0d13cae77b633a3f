//! Outstanding calls
//!
//! Every invocation registers a oneshot sender under its message key. The
//! session's reader task completes it when the matching reply arrives; a
//! transport failure fails every registered call at once.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::messages::ServiceReply;
use crate::row::Value;

type ReplySender = oneshot::Sender<Result<ServiceReply>>;

#[derive(Debug, Clone)]
enum Shutdown {
    Closed,
    Lost(String),
}

impl Shutdown {
    fn to_error(&self) -> Error {
        match self {
            Shutdown::Closed => Error::SessionClosed,
            Shutdown::Lost(reason) => Error::ConnectionLost(reason.clone()),
        }
    }
}

#[derive(Default)]
struct PendingState {
    waiters: HashMap<u64, ReplySender>,
    shutdown: Option<Shutdown>,
}

/// Table of calls awaiting a reply
#[derive(Default)]
pub(crate) struct PendingMap {
    state: Mutex<PendingState>,
}

impl PendingMap {
    fn lock(&self) -> MutexGuard<'_, PendingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a call; fails once the session has shut down
    pub(crate) fn register(&self, key: u64) -> Result<oneshot::Receiver<Result<ServiceReply>>> {
        let mut state = self.lock();
        if let Some(shutdown) = &state.shutdown {
            return Err(shutdown.to_error());
        }
        let (tx, rx) = oneshot::channel();
        state.waiters.insert(key, tx);
        Ok(rx)
    }

    /// Deliver a reply; returns false if nobody is waiting for it
    pub(crate) fn complete(&self, reply: ServiceReply) -> bool {
        let sender = self.lock().waiters.remove(&reply.message_key);
        match sender {
            Some(tx) => tx.send(Ok(reply)).is_ok(),
            None => false,
        }
    }

    /// Fail one call with `error`; returns false if nobody is waiting for it
    pub(crate) fn fail(&self, key: u64, error: Error) -> bool {
        let sender = self.lock().waiters.remove(&key);
        match sender {
            Some(tx) => tx.send(Err(error)).is_ok(),
            None => false,
        }
    }

    /// Forget a call whose caller gave up
    pub(crate) fn remove(&self, key: u64) {
        self.lock().waiters.remove(&key);
    }

    /// Fail every outstanding call with `ConnectionLost`
    pub(crate) fn fail_all(&self, reason: &str) {
        self.shut_down(Shutdown::Lost(reason.to_string()));
    }

    /// Fail every outstanding call with `SessionClosed`
    pub(crate) fn close(&self) {
        self.shut_down(Shutdown::Closed);
    }

    fn shut_down(&self, shutdown: Shutdown) {
        let waiters = {
            let mut state = self.lock();
            if state.shutdown.is_none() {
                state.shutdown = Some(shutdown);
            }
            std::mem::take(&mut state.waiters)
        };
        let error = self.shutdown_error();
        if !waiters.is_empty() {
            tracing::debug!(outstanding = waiters.len(), error = %error, "Failing outstanding calls");
        }
        for (_, tx) in waiters {
            let _ = tx.send(Err(self.shutdown_error()));
        }
    }

    /// The error new calls fail with, if the session has shut down
    pub(crate) fn shutdown_error(&self) -> Error {
        self.lock()
            .shutdown
            .as_ref()
            .map(Shutdown::to_error)
            .unwrap_or(Error::SessionClosed)
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.lock().shutdown.is_some()
    }

    pub(crate) fn outstanding(&self) -> usize {
        self.lock().waiters.len()
    }
}

/// Handle to the reply of one invocation
///
/// Waiting is bounded by an explicit deadline. The wait wakes up every
/// socket timeout and compares the deadline against the monotonic clock, so
/// a wake-up never ends the call early. A timed-out call stays registered
/// and can be waited on again; dropping the handle forgets the call, and a
/// late reply is then discarded by the reader.
pub struct PendingReply {
    key: u64,
    method: &'static str,
    rx: oneshot::Receiver<Result<ServiceReply>>,
    pending: Arc<PendingMap>,
    socket_timeout: Duration,
    finished: bool,
}

impl PendingReply {
    pub(crate) fn new(
        key: u64,
        method: &'static str,
        rx: oneshot::Receiver<Result<ServiceReply>>,
        pending: Arc<PendingMap>,
        socket_timeout: Duration,
    ) -> Self {
        Self {
            key,
            method,
            rx,
            pending,
            socket_timeout,
            finished: false,
        }
    }

    /// Correlation key of the invocation
    pub fn message_key(&self) -> u64 {
        self.key
    }

    /// Remote method this reply belongs to
    pub fn method(&self) -> &'static str {
        self.method
    }

    /// Wait up to `timeout` for the reply value
    ///
    /// A remote exception surfaces as [`Error::Remote`]; an elapsed deadline
    /// as [`Error::Timeout`], after which the handle remains usable.
    pub async fn wait(&mut self, timeout: Duration) -> Result<Value> {
        if self.finished {
            return Err(Error::protocol(format!(
                "reply to {} already consumed",
                self.method
            )));
        }
        let deadline = Instant::now() + timeout;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout {
                    method: self.method,
                    timeout,
                });
            }
            let wake = (deadline - now).min(self.socket_timeout);
            match tokio::time::timeout(wake, &mut self.rx).await {
                Ok(Ok(reply)) => {
                    self.finished = true;
                    return reply?.outcome.map_err(Error::Remote);
                }
                Ok(Err(_)) => {
                    self.finished = true;
                    return Err(self.pending.shutdown_error());
                }
                Err(_) => {
                    tracing::trace!(method = self.method, key = self.key, "Wake-up before deadline");
                }
            }
        }
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        if !self.finished {
            self.pending.remove(self.key);
        }
    }
}

/// A call whose typed result can be awaited, possibly more than once
///
/// After [`Error::Timeout`] the call is still outstanding and `wait` may be
/// called again. After any other outcome the call is spent.
#[async_trait]
pub trait PendingCall<T>: Send {
    /// Wait up to `timeout` for the result
    async fn wait(&mut self, timeout: Duration) -> Result<T>;
}

/// A [`PendingReply`] whose value converts into `T`
pub struct TypedReply<T> {
    inner: PendingReply,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedReply<T> {
    pub(crate) fn new(inner: PendingReply) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Correlation key of the invocation
    pub fn message_key(&self) -> u64 {
        self.inner.message_key()
    }
}

#[async_trait]
impl<T> PendingCall<T> for TypedReply<T>
where
    T: TryFrom<Value, Error = Error> + Send,
{
    async fn wait(&mut self, timeout: Duration) -> Result<T> {
        T::try_from(self.inner.wait(timeout).await?)
    }
}

impl std::fmt::Debug for PendingReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingReply")
            .field("key", &self.key)
            .field("method", &self.method)
            .field("finished", &self.finished)
            .finish()
    }
}
