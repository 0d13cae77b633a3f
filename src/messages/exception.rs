//! Server-side failure payload

use std::fmt;

use crate::codec::{Decoder, Encoder, KnownType, WireType};
use crate::error::Result;

/// Exception reported by the server
///
/// Carried either as the outcome of a [`ServiceReply`](super::ServiceReply)
/// or embedded in a [`ResultsMessage`](super::ResultsMessage), where it
/// applies to every row of that batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteException {
    /// Server-side exception type
    pub class_name: Option<String>,
    /// Vendor error code
    pub code: Option<String>,
    /// Human-readable message
    pub message: String,
}

impl RemoteException {
    /// Create an exception with only a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            class_name: None,
            code: None,
            message: message.into(),
        }
    }

    /// Set the vendor error code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Set the server-side exception type
    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }
}

impl fmt::Display for RemoteException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "remote failure [{}]: {}", code, self.message),
            None => write!(f, "remote failure: {}", self.message),
        }
    }
}

impl std::error::Error for RemoteException {}

impl WireType for RemoteException {
    const KIND: KnownType = KnownType::RemoteException;

    fn write_body(&self, enc: &mut Encoder) -> Result<()> {
        let buf = enc.buffer();
        buf.write_optional_string(self.class_name.as_deref())?;
        buf.write_optional_string(self.code.as_deref())?;
        buf.write_string(&self.message)
    }

    fn read_body(dec: &mut Decoder<'_>) -> Result<Self> {
        let buf = dec.buffer();
        Ok(Self {
            class_name: buf.read_optional_string()?,
            code: buf.read_optional_string()?,
            message: buf.read_string()?,
        })
    }
}
