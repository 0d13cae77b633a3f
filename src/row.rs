//! Row and value model
//!
//! This module provides the value tree exchanged on the wire and the rows a
//! cursor exposes. Every [`Value`] variant corresponds to one entry of the
//! known-type table, plus [`Value::Named`] for allow-listed foreign types.

use bytes::Bytes;

use crate::codec::{LobKind, LobValue};
use crate::error::{Error, Result};
use crate::messages::Message;

/// A value carried in a frame body or a result row.
///
/// # Example
///
/// ```rust
/// use fedquery_rs::Value;
///
/// let v: Value = 42i64.into();
/// assert_eq!(v.as_i64(), Some(42));
/// assert!(Value::Null.is_null());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL value
    Null,
    /// Boolean value
    Boolean(bool),
    /// 32-bit integer
    Integer(i32),
    /// 64-bit integer
    Long(i64),
    /// Double precision float
    Double(f64),
    /// String value
    String(String),
    /// Inline bytes
    Binary(Bytes),
    /// Ordered list of values
    List(Vec<Value>),
    /// Large-object content sent out-of-band after the frame
    Lob(LobValue),
    /// Handle to a LOB that stays on the server until streamed
    LobRef(LobReference),
    /// Embedded protocol message
    Message(Box<Message>),
    /// Allow-listed type without a registered code
    Named(NamedValue),
}

impl Value {
    /// Check if this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as i64 (widening integers)
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i as i64),
            Value::Long(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64 (widening integers)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            Value::Long(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as inline bytes
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// Get as out-of-band LOB content
    pub fn as_lob(&self) -> Option<&LobValue> {
        match self {
            Value::Lob(l) => Some(l),
            _ => None,
        }
    }

    /// Get as a server-side LOB reference
    pub fn as_lob_ref(&self) -> Option<&LobReference> {
        match self {
            Value::LobRef(r) => Some(r),
            _ => None,
        }
    }

    /// Get as an embedded message
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Value::Message(m) => Some(m),
            _ => None,
        }
    }

    /// Consume and return the embedded message
    pub fn into_message(self) -> Option<Message> {
        match self {
            Value::Message(m) => Some(*m),
            _ => None,
        }
    }

    /// Short description of the variant, used in error messages
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "Null".to_string(),
            Value::Boolean(_) => "Boolean".to_string(),
            Value::Integer(_) => "Integer".to_string(),
            Value::Long(_) => "Long".to_string(),
            Value::Double(_) => "Double".to_string(),
            Value::String(_) => "String".to_string(),
            Value::Binary(_) => "Binary".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Lob(_) => "StreamReference".to_string(),
            Value::LobRef(_) => "LobReference".to_string(),
            Value::Message(m) => m.kind().name().to_string(),
            Value::Named(n) => n.type_name.clone(),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::Binary(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Binary(Bytes::from(v))
    }
}

impl From<LobValue> for Value {
    fn from(v: LobValue) -> Self {
        Value::Lob(v)
    }
}

impl From<LobReference> for Value {
    fn from(v: LobReference) -> Self {
        Value::LobRef(v)
    }
}

impl From<Message> for Value {
    fn from(v: Message) -> Self {
        Value::Message(Box::new(v))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Reference to a LOB held by the server
///
/// A result cell of LOB type holds one of these. Reading it drives a
/// [`LobStreamer`](crate::LobStreamer) that pulls the content chunk by chunk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LobReference {
    /// Server-side stream identifier
    pub reference_id: String,
    /// Kind of content behind the reference
    pub kind: LobKind,
    /// Total length if the server knows it
    pub length: Option<u64>,
}

impl LobReference {
    /// Create a reference with unknown length
    pub fn new(reference_id: impl Into<String>, kind: LobKind) -> Self {
        Self {
            reference_id: reference_id.into(),
            kind,
            length: None,
        }
    }

    /// Set the known length
    pub fn with_length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }
}

/// Value of an allow-listed type that has no registered code
#[derive(Debug, Clone, PartialEq)]
pub struct NamedValue {
    /// Fully qualified type name
    pub type_name: String,
    /// Positional fields
    pub fields: Vec<Value>,
}

impl NamedValue {
    /// Create a named value
    pub fn new(type_name: impl Into<String>, fields: Vec<Value>) -> Self {
        Self {
            type_name: type_name.into(),
            fields,
        }
    }
}

/// A single result row
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    /// Create a row from column values
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row has no columns
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a column value by 0-based index
    pub fn get(&self, index: usize) -> Result<&Value> {
        self.values.get(index).ok_or(Error::ColumnOutOfRange {
            index,
            count: self.values.len(),
        })
    }

    /// All column values
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Consume the row
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}
