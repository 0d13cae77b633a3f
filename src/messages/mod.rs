//! Protocol messages
//!
//! Each wire message kind lives in its own file and implements
//! [`WireType`](crate::codec::WireType). [`Message`] is the closed set of
//! kinds a frame can carry at top level or embed as a value.

mod exception;
mod handshake;
mod invocation;
mod lob_chunk;
mod logon;
mod request;
mod results;

pub use exception::RemoteException;
pub use handshake::{AuthType, Handshake};
pub use invocation::{ServiceInvocation, ServiceReply};
pub use lob_chunk::LobChunk;
pub use logon::{LogonRequest, LogonResult};
pub use request::{CursorType, RequestMessage};
pub use results::{ColumnInfo, ResultsMessage};

use crate::codec::{Decoder, Encoder, KnownType, WireType};
use crate::error::{Error, Result};
use crate::row::Value;

/// Any message that can travel in a frame
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Connection handshake
    Handshake(Handshake),
    /// Remote method call
    Invocation(ServiceInvocation),
    /// Remote method result
    Reply(ServiceReply),
    /// Query submission
    Request(RequestMessage),
    /// Row batch
    Results(ResultsMessage),
    /// LOB content piece
    LobChunk(LobChunk),
    /// Server-side failure
    Exception(RemoteException),
    /// Credential submission
    LogonRequest(LogonRequest),
    /// Session establishment result
    LogonResult(LogonResult),
}

impl Message {
    /// Registered kind of this message
    pub fn kind(&self) -> KnownType {
        match self {
            Message::Handshake(_) => Handshake::KIND,
            Message::Invocation(_) => ServiceInvocation::KIND,
            Message::Reply(_) => ServiceReply::KIND,
            Message::Request(_) => RequestMessage::KIND,
            Message::Results(_) => ResultsMessage::KIND,
            Message::LobChunk(_) => LobChunk::KIND,
            Message::Exception(_) => RemoteException::KIND,
            Message::LogonRequest(_) => LogonRequest::KIND,
            Message::LogonResult(_) => LogonResult::KIND,
        }
    }

    pub(crate) fn write_body(&self, enc: &mut Encoder) -> Result<()> {
        match self {
            Message::Handshake(m) => m.write_body(enc),
            Message::Invocation(m) => m.write_body(enc),
            Message::Reply(m) => m.write_body(enc),
            Message::Request(m) => m.write_body(enc),
            Message::Results(m) => m.write_body(enc),
            Message::LobChunk(m) => m.write_body(enc),
            Message::Exception(m) => m.write_body(enc),
            Message::LogonRequest(m) => m.write_body(enc),
            Message::LogonResult(m) => m.write_body(enc),
        }
    }

    pub(crate) fn read_body(kind: KnownType, dec: &mut Decoder<'_>) -> Result<Self> {
        let message = match kind {
            KnownType::Handshake => Message::Handshake(Handshake::read_body(dec)?),
            KnownType::ServiceInvocation => Message::Invocation(ServiceInvocation::read_body(dec)?),
            KnownType::ServiceReply => Message::Reply(ServiceReply::read_body(dec)?),
            KnownType::RequestMessage => Message::Request(RequestMessage::read_body(dec)?),
            KnownType::ResultsMessage => Message::Results(ResultsMessage::read_body(dec)?),
            KnownType::LobChunk => Message::LobChunk(LobChunk::read_body(dec)?),
            KnownType::RemoteException => Message::Exception(RemoteException::read_body(dec)?),
            KnownType::LogonRequest => Message::LogonRequest(LogonRequest::read_body(dec)?),
            KnownType::LogonResult => Message::LogonResult(LogonResult::read_body(dec)?),
            other => {
                return Err(Error::UnexpectedMessage {
                    expected: "message",
                    actual: other.name().to_string(),
                })
            }
        };
        Ok(message)
    }
}

macro_rules! message_conversions {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Message {
                fn from(m: $ty) -> Self {
                    Message::$variant(m)
                }
            }

            impl TryFrom<Message> for $ty {
                type Error = Error;

                fn try_from(m: Message) -> Result<Self> {
                    match m {
                        Message::$variant(inner) => Ok(inner),
                        other => Err(Error::UnexpectedMessage {
                            expected: <$ty as WireType>::KIND.name(),
                            actual: other.kind().name().to_string(),
                        }),
                    }
                }
            }

            impl TryFrom<Value> for $ty {
                type Error = Error;

                fn try_from(v: Value) -> Result<Self> {
                    match v {
                        Value::Message(m) => <$ty>::try_from(*m),
                        other => Err(Error::UnexpectedMessage {
                            expected: <$ty as WireType>::KIND.name(),
                            actual: other.type_name(),
                        }),
                    }
                }
            }
        )*
    };
}

message_conversions!(
    Handshake(Handshake),
    Invocation(ServiceInvocation),
    Reply(ServiceReply),
    Request(RequestMessage),
    Results(ResultsMessage),
    LobChunk(LobChunk),
    Exception(RemoteException),
    LogonRequest(LogonRequest),
    LogonResult(LogonResult),
);
