//! Protocol constants
//!
//! Wire-level constants shared by the frame codec, the session and the
//! cursor engine.

use std::time::Duration;

/// Version byte written at the start of every frame payload
pub const WIRE_VERSION: u8 = 1;

/// Size of the big-endian frame length prefix
pub const FRAME_LENGTH_SIZE: usize = 4;

/// Size of the big-endian sub-chunk length prefix
pub const SUB_CHUNK_LENGTH_SIZE: usize = 2;

/// Maximum bytes carried by one stream sub-chunk
pub const MAX_SUB_CHUNK: usize = u16::MAX as usize;

/// Default maximum size of a single decoded frame (32 MiB)
pub const DEFAULT_MAX_OBJECT_SIZE: usize = 1 << 25;

/// Default fetch size for result batches
pub const DEFAULT_FETCH_SIZE: u32 = 2048;

/// Default number of batches a scrollable cursor keeps resident
pub const DEFAULT_SAVED_BATCHES: usize = 3;

/// Default per-call timeout
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Default socket wake-up interval used to re-check call deadlines
pub const DEFAULT_SOCKET_TIMEOUT: Duration = Duration::from_secs(1);

/// Default connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default server port
pub const DEFAULT_PORT: u16 = 31000;

/// Default TLS server port
pub const DEFAULT_TLS_PORT: u16 = 31443;

/// Row number sentinel for "final row not yet known"
pub const UNKNOWN_FINAL_ROW: i64 = -1;

/// Remote service identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ServiceId {
    /// Session establishment and liveness
    Logon = 1,
    /// Query execution and result delivery
    Dqp = 2,
}

impl ServiceId {
    /// Wire name of the service
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceId::Logon => "logon",
            ServiceId::Dqp => "dqp",
        }
    }
}

impl TryFrom<u8> for ServiceId {
    type Error = crate::error::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ServiceId::Logon),
            2 => Ok(ServiceId::Dqp),
            _ => Err(crate::error::Error::protocol(format!(
                "unknown service id {}",
                value
            ))),
        }
    }
}

/// Remote method names
pub mod method {
    /// Begin a session
    pub const LOGON: &str = "logon";
    /// Continue a multi-step credential exchange
    pub const CONTINUE_LOGON: &str = "continueLogon";
    /// End a session
    pub const LOGOFF: &str = "logoff";
    /// Liveness check
    pub const PING: &str = "ping";
    /// Submit a request for execution
    pub const EXECUTE_REQUEST: &str = "executeRequest";
    /// Fetch a batch of rows
    pub const PROCESS_CURSOR_REQUEST: &str = "processCursorRequest";
    /// Pull the next LOB chunk
    pub const REQUEST_NEXT_LOB_CHUNK: &str = "requestNextLobChunk";
    /// Release a remote LOB stream
    pub const CLOSE_LOB_CHUNK_STREAM: &str = "closeLobChunkStream";
    /// Cancel a running request
    pub const CANCEL_REQUEST: &str = "cancelRequest";
    /// Release a request and its results
    pub const CLOSE_REQUEST: &str = "closeRequest";
}
