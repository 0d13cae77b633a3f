//! Query submission

use std::time::Duration;

use crate::codec::{Decoder, Encoder, KnownType, WireType};
use crate::error::{Error, Result};
use crate::row::Value;

/// Navigation capability requested for the result cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CursorType {
    /// Rows can only be visited in ascending order
    #[default]
    ForwardOnly = 0,
    /// Random access within resident batches
    Scrollable = 1,
}

impl TryFrom<u8> for CursorType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(CursorType::ForwardOnly),
            1 => Ok(CursorType::Scrollable),
            _ => Err(Error::protocol(format!("invalid cursor type {}", value))),
        }
    }
}

/// Argument of `executeRequest`
#[derive(Debug, Clone, PartialEq)]
pub struct RequestMessage {
    /// Client-assigned execution id (monotonic per session)
    pub execution_id: i64,
    /// Query text
    pub sql: String,
    /// Bind parameter values
    pub parameters: Vec<Value>,
    /// Rows per batch
    pub fetch_size: u32,
    /// Requested cursor type
    pub cursor_type: CursorType,
    /// Maximum rows to return (0 = unlimited)
    pub row_limit: u32,
    /// Server-side timeout (None = unlimited)
    pub query_timeout: Option<Duration>,
}

impl RequestMessage {
    /// Create a forward-only request with the given fetch size
    pub fn new(execution_id: i64, sql: impl Into<String>, fetch_size: u32) -> Self {
        Self {
            execution_id,
            sql: sql.into(),
            parameters: Vec::new(),
            fetch_size,
            cursor_type: CursorType::ForwardOnly,
            row_limit: 0,
            query_timeout: None,
        }
    }
}

impl WireType for RequestMessage {
    const KIND: KnownType = KnownType::RequestMessage;

    fn write_body(&self, enc: &mut Encoder) -> Result<()> {
        enc.buffer().write_i64_be(self.execution_id)?;
        enc.buffer().write_string(&self.sql)?;
        enc.write_values(&self.parameters)?;
        let buf = enc.buffer();
        buf.write_u32_be(self.fetch_size)?;
        buf.write_u8(self.cursor_type as u8)?;
        buf.write_u32_be(self.row_limit)?;
        buf.write_u64_be(self.query_timeout.map_or(0, |t| t.as_millis() as u64))
    }

    fn read_body(dec: &mut Decoder<'_>) -> Result<Self> {
        let execution_id = dec.buffer().read_i64_be()?;
        let sql = dec.buffer().read_string()?;
        let parameters = dec.read_values()?;
        let buf = dec.buffer();
        let fetch_size = buf.read_u32_be()?;
        let cursor_type = CursorType::try_from(buf.read_u8()?)?;
        let row_limit = buf.read_u32_be()?;
        let timeout_ms = buf.read_u64_be()?;
        Ok(Self {
            execution_id,
            sql,
            parameters,
            fetch_size,
            cursor_type,
            row_limit,
            query_timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
        })
    }
}
