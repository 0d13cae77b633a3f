//! Value and message decoder

use bytes::Bytes;

use crate::buffer::ReadBuffer;
use crate::codec::known_types::{KnownType, TypeRegistry, BY_NAME};
use crate::codec::stream::{LobKind, LobValue, StreamSlot};
use crate::codec::WireType;
use crate::error::{Error, Result};
use crate::messages::Message;
use crate::row::{LobReference, NamedValue, Value};

/// Maximum nesting of lists, messages and named values
const MAX_DEPTH: usize = 64;

/// A decoded value tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag {
    /// Registered kind (by code or by its registered name)
    Known(KnownType),
    /// Allow-listed foreign type name
    Foreign(String),
}

/// Decodes a frame body, recording stream placeholders in encounter order
#[derive(Debug)]
pub struct Decoder<'a> {
    buf: ReadBuffer,
    registry: &'a TypeRegistry,
    slots: Vec<StreamSlot>,
    depth: usize,
}

impl<'a> Decoder<'a> {
    /// Create a decoder over a frame body
    pub fn new(body: Bytes, registry: &'a TypeRegistry) -> Self {
        Self {
            buf: ReadBuffer::new(body),
            registry,
            slots: Vec::new(),
            depth: 0,
        }
    }

    /// Access the body buffer
    pub fn buffer(&mut self) -> &mut ReadBuffer {
        &mut self.buf
    }

    /// Finish decoding, returning the stream slots to bind in order
    pub fn finish(self) -> Result<Vec<StreamSlot>> {
        if self.buf.remaining() != 0 {
            return Err(Error::protocol(format!(
                "{} trailing bytes after frame body",
                self.buf.remaining()
            )));
        }
        Ok(self.slots)
    }

    /// Read and resolve a tag
    pub fn read_tag(&mut self) -> Result<Tag> {
        let code = self.buf.read_u8()?;
        if code != BY_NAME {
            return KnownType::try_from(code).map(Tag::Known);
        }
        let name = self.buf.read_short_string()?;
        match self.registry.resolve(&name)? {
            Some(kind) => Ok(Tag::Known(kind)),
            None => Ok(Tag::Foreign(name)),
        }
    }

    /// Read a tagged object of a specific kind
    pub fn read_object<T: WireType>(&mut self) -> Result<T> {
        match self.read_tag()? {
            Tag::Known(kind) if kind == T::KIND => self.nested(T::read_body),
            other => Err(unexpected(T::KIND, &other)),
        }
    }

    /// Read an optional tagged object, `Null` meaning absent
    pub fn read_optional_object<T: WireType>(&mut self) -> Result<Option<T>> {
        match self.read_tag()? {
            Tag::Known(KnownType::Null) => Ok(None),
            Tag::Known(kind) if kind == T::KIND => self.nested(T::read_body).map(Some),
            other => Err(unexpected(T::KIND, &other)),
        }
    }

    /// Read a tagged message
    pub fn read_message(&mut self) -> Result<Message> {
        match self.read_value()? {
            Value::Message(m) => Ok(*m),
            other => Err(Error::UnexpectedMessage {
                expected: "message",
                actual: other.type_name(),
            }),
        }
    }

    /// Read a count-prefixed list of tagged values
    pub fn read_values(&mut self) -> Result<Vec<Value>> {
        let count = self.buf.read_u32_be()? as usize;
        // every value takes at least its tag byte
        if count > self.buf.remaining() {
            return Err(Error::BufferUnderflow {
                needed: count,
                available: self.buf.remaining(),
            });
        }
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.read_value()?);
        }
        Ok(values)
    }

    /// Read one tagged value
    pub fn read_value(&mut self) -> Result<Value> {
        match self.read_tag()? {
            Tag::Known(kind) => self.nested(|d| d.read_known(kind)),
            Tag::Foreign(type_name) => {
                let fields = self.nested(Decoder::read_values)?;
                Ok(Value::Named(NamedValue { type_name, fields }))
            }
        }
    }

    fn read_known(&mut self, kind: KnownType) -> Result<Value> {
        let value = match kind {
            KnownType::Null => Value::Null,
            KnownType::Boolean => Value::Boolean(self.buf.read_bool()?),
            KnownType::Integer => Value::Integer(self.buf.read_i32_be()?),
            KnownType::Long => Value::Long(self.buf.read_i64_be()?),
            KnownType::Double => Value::Double(self.buf.read_f64_be()?),
            KnownType::String => Value::String(self.buf.read_string()?),
            KnownType::Binary => Value::Binary(self.buf.read_bytes_with_length()?),
            KnownType::List => Value::List(self.read_values()?),
            KnownType::StreamReference => {
                let lob_kind = LobKind::try_from(self.buf.read_u8()?)?;
                let index = self.buf.read_u16_be()? as usize;
                if index != self.slots.len() {
                    return Err(Error::protocol(format!(
                        "stream reference {} out of order (expected {})",
                        index,
                        self.slots.len()
                    )));
                }
                let (lob, slot) = LobValue::unbound(lob_kind);
                self.slots.push(slot);
                Value::Lob(lob)
            }
            KnownType::LobReference => {
                let reference_id = self.buf.read_string()?;
                let kind = LobKind::try_from(self.buf.read_u8()?)?;
                let length = self.buf.read_i64_be()?;
                Value::LobRef(LobReference {
                    reference_id,
                    kind,
                    length: u64::try_from(length).ok(),
                })
            }
            message_kind => Value::Message(Box::new(Message::read_body(message_kind, self)?)),
        };
        Ok(value)
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_DEPTH {
            return Err(Error::protocol("value nesting too deep"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }
}

fn unexpected(expected: KnownType, actual: &Tag) -> Error {
    Error::UnexpectedMessage {
        expected: expected.name(),
        actual: match actual {
            Tag::Known(k) => k.name().to_string(),
            Tag::Foreign(n) => n.clone(),
        },
    }
}
