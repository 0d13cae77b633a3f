//! Value and message encoder

use bytes::Bytes;

use crate::buffer::WriteBuffer;
use crate::codec::known_types::{KnownType, BY_NAME};
use crate::codec::WireType;
use crate::error::{Error, Result};
use crate::messages::Message;
use crate::row::Value;

/// Encodes a value tree into a frame body, collecting streams on the side
#[derive(Debug)]
pub struct Encoder {
    buf: WriteBuffer,
    streams: Vec<Bytes>,
    use_known_types: bool,
}

impl Encoder {
    /// Create an encoder
    ///
    /// With `use_known_types == false` every tag is written by name, as a
    /// peer without the code table would.
    pub fn new(use_known_types: bool, max_object_size: usize) -> Self {
        Self {
            buf: WriteBuffer::with_max_capacity(512, max_object_size),
            streams: Vec::new(),
            use_known_types,
        }
    }

    /// Access the body buffer
    pub fn buffer(&mut self) -> &mut WriteBuffer {
        &mut self.buf
    }

    /// Finish encoding, returning the body and the streams in encounter order
    pub fn finish(self) -> (Bytes, Vec<Bytes>) {
        (self.buf.freeze(), self.streams)
    }

    fn write_tag(&mut self, kind: KnownType) -> Result<()> {
        if self.use_known_types {
            self.buf.write_u8(kind.code())
        } else {
            self.write_name_tag(kind.name())
        }
    }

    fn write_name_tag(&mut self, name: &str) -> Result<()> {
        self.buf.write_u8(BY_NAME)?;
        self.buf.write_short_string(name)
    }

    /// Write a tagged object
    pub fn write_object<T: WireType>(&mut self, object: &T) -> Result<()> {
        self.write_tag(T::KIND)?;
        object.write_body(self)
    }

    /// Write an optional tagged object, `Null` when absent
    pub fn write_optional_object<T: WireType>(&mut self, object: Option<&T>) -> Result<()> {
        match object {
            Some(o) => self.write_object(o),
            None => self.write_tag(KnownType::Null),
        }
    }

    /// Write a tagged message
    pub fn write_message(&mut self, message: &Message) -> Result<()> {
        self.write_tag(message.kind())?;
        message.write_body(self)
    }

    /// Write a count-prefixed list of tagged values
    pub fn write_values(&mut self, values: &[Value]) -> Result<()> {
        self.buf.write_u32_be(values.len() as u32)?;
        for value in values {
            self.write_value(value)?;
        }
        Ok(())
    }

    /// Write one tagged value
    pub fn write_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.write_tag(KnownType::Null),
            Value::Boolean(b) => {
                self.write_tag(KnownType::Boolean)?;
                self.buf.write_bool(*b)
            }
            Value::Integer(i) => {
                self.write_tag(KnownType::Integer)?;
                self.buf.write_i32_be(*i)
            }
            Value::Long(i) => {
                self.write_tag(KnownType::Long)?;
                self.buf.write_i64_be(*i)
            }
            Value::Double(f) => {
                self.write_tag(KnownType::Double)?;
                self.buf.write_f64_be(*f)
            }
            Value::String(s) => {
                self.write_tag(KnownType::String)?;
                self.buf.write_string(s)
            }
            Value::Binary(b) => {
                self.write_tag(KnownType::Binary)?;
                self.buf.write_bytes_with_length(b)
            }
            Value::List(items) => {
                self.write_tag(KnownType::List)?;
                self.write_values(items)
            }
            Value::Lob(lob) => {
                let content = lob.bytes()?.clone();
                let index = u16::try_from(self.streams.len())
                    .map_err(|_| Error::protocol("too many streams in one frame"))?;
                self.write_tag(KnownType::StreamReference)?;
                self.buf.write_u8(lob.kind() as u8)?;
                self.buf.write_u16_be(index)?;
                self.streams.push(content);
                Ok(())
            }
            Value::LobRef(r) => {
                self.write_tag(KnownType::LobReference)?;
                self.buf.write_string(&r.reference_id)?;
                self.buf.write_u8(r.kind as u8)?;
                self.buf
                    .write_i64_be(r.length.map(|l| l as i64).unwrap_or(-1))
            }
            Value::Message(m) => self.write_message(m),
            Value::Named(n) => {
                self.write_name_tag(&n.type_name)?;
                self.write_values(&n.fields)
            }
        }
    }
}
