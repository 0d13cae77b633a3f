//! In-process server for integration tests
//!
//! Speaks the framed protocol over a `tokio::io::duplex` pipe: sends its
//! handshake, then answers each invocation with whatever the test's handler
//! decides.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use fedquery_rs::codec::{EncodeOptions, TypeRegistry};
use fedquery_rs::constants::{method, DEFAULT_MAX_OBJECT_SIZE};
use fedquery_rs::frame::{FrameReader, FrameWriter};
use fedquery_rs::messages::{
    ColumnInfo, Handshake, LobChunk, LogonResult, Message, RemoteException, RequestMessage,
    ResultsMessage, ServiceInvocation, ServiceReply,
};
use fedquery_rs::{Config, Row, Session, Value};
use tokio::io::{DuplexStream, WriteHalf};
use tokio::task::JoinHandle;

/// What the server does with one invocation
pub enum Action {
    /// Answer immediately
    Reply(ServiceReply),
    /// Answer after a delay, without blocking later invocations
    Delay(Duration, ServiceReply),
    /// Never answer
    Ignore,
    /// Drop the connection
    Hangup,
}

pub type Handler = Arc<dyn Fn(&ServiceInvocation) -> Action + Send + Sync>;

/// An invocation the server received
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub args: Vec<Value>,
}

pub struct FakeServer {
    pub calls: Arc<Mutex<Vec<Recorded>>>,
    task: JoinHandle<()>,
}

impl FakeServer {
    /// Invocations of `method` received so far
    pub fn calls_to(&self, method: &str) -> Vec<Recorded> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    pub fn count(&self, method: &str) -> usize {
        self.calls_to(method).len()
    }

    /// Poll until `method` has been called `n` times or a second passes
    pub async fn wait_for(&self, method: &str, n: usize) -> usize {
        for _ in 0..100 {
            if self.count(method) >= n {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.count(method)
    }

    pub fn abort(&self) {
        self.task.abort();
    }
}

type ServerWriter = Arc<tokio::sync::Mutex<FrameWriter<WriteHalf<DuplexStream>>>>;

/// Configuration suited to an in-process server
pub fn test_config() -> Config {
    Config::new("fake-engine", 31000)
        .credentials("analyst", "secret")
        .socket_timeout(Duration::from_millis(20))
        .call_timeout(Duration::from_secs(5))
        .connect_timeout(Duration::from_secs(2))
}

/// Route `tracing` output to the test harness; `RUST_LOG` selects levels
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Start a server running `handler` and connect a session to it
pub async fn connect(config: Config, handler: Handler) -> (Session, FakeServer) {
    init_tracing();
    let (client, server) = tokio::io::duplex(256 * 1024);
    let calls = Arc::new(Mutex::new(Vec::new()));
    let task = tokio::spawn(serve(server, handler, calls.clone()));
    let session = Session::from_stream(client, config).await.unwrap();
    (session, FakeServer { calls, task })
}

async fn serve(stream: DuplexStream, handler: Handler, calls: Arc<Mutex<Vec<Recorded>>>) {
    let (read_half, write_half) = tokio::io::split(stream);
    let mut reader = FrameReader::new(read_half, TypeRegistry::new(), DEFAULT_MAX_OBJECT_SIZE);
    let writer: ServerWriter = Arc::new(tokio::sync::Mutex::new(FrameWriter::new(
        write_half,
        EncodeOptions::default(),
    )));

    let hello = Message::Handshake(Handshake::client());
    if writer.lock().await.write_message(&hello).await.is_err() {
        return;
    }
    match reader.read_message().await {
        Ok(Message::Handshake(_)) => {}
        _ => return,
    }

    while let Ok(message) = reader.read_message().await {
        let Message::Invocation(invocation) = message else {
            continue;
        };
        calls.lock().unwrap().push(Recorded {
            method: invocation.method.clone(),
            args: invocation.args.clone(),
        });
        match handler(&invocation) {
            Action::Reply(reply) => {
                let _ = writer.lock().await.write_message(&Message::Reply(reply)).await;
            }
            Action::Delay(delay, reply) => {
                let writer = writer.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = writer.lock().await.write_message(&Message::Reply(reply)).await;
                });
            }
            Action::Ignore => {}
            Action::Hangup => return,
        }
    }
}

/// Answer the session-level methods every test needs
pub fn session_reply(invocation: &ServiceInvocation) -> Option<Action> {
    let key = invocation.message_key;
    let reply = match invocation.method.as_str() {
        method::LOGON => ServiceReply::ok(
            key,
            Message::LogonResult(LogonResult {
                session_id: "s-1".to_string(),
                user_name: "analyst".to_string(),
                continuation: None,
            }),
        ),
        method::PING | method::LOGOFF | method::CLOSE_REQUEST | method::CLOSE_LOB_CHUNK_STREAM => {
            ServiceReply::ok(key, Value::Null)
        }
        method::CANCEL_REQUEST => ServiceReply::ok(key, true),
        _ => return None,
    };
    Some(Action::Reply(reply))
}

/// Long argument `index` of an invocation
pub fn long_arg(invocation: &ServiceInvocation, index: usize) -> i64 {
    invocation.args[index].as_i64().unwrap()
}

/// Rows `start..start+count` of a single-column table of `total` rows
pub fn table_slice(total: i64, start: i64, count: i64) -> ResultsMessage {
    if start > total {
        return ResultsMessage::past_end(start, total);
    }
    let end = (start + count - 1).min(total);
    let rows = (start..=end)
        .map(|n| Row::new(vec![Value::Long(n), Value::String(format!("row-{}", n))]))
        .collect();
    let mut results = ResultsMessage::batch(start, rows, end >= total);
    if start == 1 {
        results.columns = vec![ColumnInfo::new("id", "long"), ColumnInfo::new("name", "string")];
    }
    results
}

/// Request carried by an `executeRequest` invocation
pub fn request_arg(invocation: &ServiceInvocation) -> RequestMessage {
    let message = invocation.args[1].as_message().cloned().unwrap();
    RequestMessage::try_from(message).unwrap()
}

/// Serve a table of `total` rows, counting batch fetches
pub fn table_handler(total: i64) -> Handler {
    Arc::new(move |invocation: &ServiceInvocation| {
        if let Some(action) = session_reply(invocation) {
            return action;
        }
        let key = invocation.message_key;
        match invocation.method.as_str() {
            method::EXECUTE_REQUEST => {
                let request = request_arg(invocation);
                let first = table_slice(total, 1, request.fetch_size as i64);
                Action::Reply(ServiceReply::ok(key, Message::Results(first)))
            }
            method::PROCESS_CURSOR_REQUEST => {
                let start = long_arg(invocation, 1);
                let count = long_arg(invocation, 2);
                let batch = table_slice(total, start, count);
                Action::Reply(ServiceReply::ok(key, Message::Results(batch)))
            }
            other => Action::Reply(ServiceReply::err(
                key,
                RemoteException::new(format!("unknown method {}", other)),
            )),
        }
    })
}

/// Chunks of `content` of at most `chunk` bytes
pub fn lob_chunks(content: &[u8], chunk: usize) -> Vec<LobChunk> {
    let parts: Vec<&[u8]> = content.chunks(chunk).collect();
    let n = parts.len();
    parts
        .into_iter()
        .enumerate()
        .map(|(i, p)| LobChunk::new(bytes::Bytes::copy_from_slice(p), i + 1 == n))
        .collect()
}
