//! Remote method call and result envelopes

use crate::codec::{Decoder, Encoder, KnownType, WireType};
use crate::constants::ServiceId;
use crate::error::Result;
use crate::messages::RemoteException;
use crate::row::Value;

/// A call to a remote service method
///
/// `message_key` is assigned by the session from a per-session counter and
/// echoed back in the matching [`ServiceReply`].
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceInvocation {
    /// Correlation key (monotonic per session)
    pub message_key: u64,
    /// Target service
    pub service: ServiceId,
    /// Method name
    pub method: String,
    /// Positional arguments
    pub args: Vec<Value>,
}

impl ServiceInvocation {
    /// Create an invocation
    pub fn new(message_key: u64, service: ServiceId, method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            message_key,
            service,
            method: method.into(),
            args,
        }
    }
}

impl WireType for ServiceInvocation {
    const KIND: KnownType = KnownType::ServiceInvocation;

    fn write_body(&self, enc: &mut Encoder) -> Result<()> {
        enc.buffer().write_u64_be(self.message_key)?;
        enc.buffer().write_u8(self.service as u8)?;
        enc.buffer().write_short_string(&self.method)?;
        enc.write_values(&self.args)
    }

    fn read_body(dec: &mut Decoder<'_>) -> Result<Self> {
        let message_key = dec.buffer().read_u64_be()?;
        let service = ServiceId::try_from(dec.buffer().read_u8()?)?;
        let method = dec.buffer().read_short_string()?;
        let args = dec.read_values()?;
        Ok(Self {
            message_key,
            service,
            method,
            args,
        })
    }
}

/// The result of a [`ServiceInvocation`]
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceReply {
    /// Correlation key of the invocation being answered
    pub message_key: u64,
    /// Returned value or raised exception
    pub outcome: std::result::Result<Value, RemoteException>,
}

impl ServiceReply {
    /// Successful reply
    pub fn ok(message_key: u64, value: impl Into<Value>) -> Self {
        Self {
            message_key,
            outcome: Ok(value.into()),
        }
    }

    /// Failed reply
    pub fn err(message_key: u64, exception: RemoteException) -> Self {
        Self {
            message_key,
            outcome: Err(exception),
        }
    }
}

impl WireType for ServiceReply {
    const KIND: KnownType = KnownType::ServiceReply;

    fn write_body(&self, enc: &mut Encoder) -> Result<()> {
        enc.buffer().write_u64_be(self.message_key)?;
        match &self.outcome {
            Ok(value) => {
                enc.buffer().write_bool(false)?;
                enc.write_value(value)
            }
            Err(exception) => {
                enc.buffer().write_bool(true)?;
                enc.write_object(exception)
            }
        }
    }

    fn read_body(dec: &mut Decoder<'_>) -> Result<Self> {
        let message_key = dec.buffer().read_u64_be()?;
        let failed = dec.buffer().read_bool()?;
        let outcome = if failed {
            Err(dec.read_object::<RemoteException>()?)
        } else {
            Ok(dec.read_value()?)
        };
        Ok(Self {
            message_key,
            outcome,
        })
    }
}
