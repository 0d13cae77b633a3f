//! Write buffer for encoding frame bodies
//!
//! Provides methods for writing big-endian primitives and length-prefixed
//! byte strings to a byte buffer.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

/// A buffer for writing wire data
#[derive(Debug)]
pub struct WriteBuffer {
    /// The underlying byte buffer
    data: BytesMut,
    /// Maximum capacity (frame size limit)
    max_capacity: Option<usize>,
}

impl WriteBuffer {
    /// Create a new WriteBuffer with default capacity
    pub fn new() -> Self {
        Self {
            data: BytesMut::with_capacity(512),
            max_capacity: None,
        }
    }

    /// Create a new WriteBuffer with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            max_capacity: None,
        }
    }

    /// Create a new WriteBuffer that refuses to grow past `max_capacity`
    pub fn with_max_capacity(capacity: usize, max_capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity.min(max_capacity)),
            max_capacity: Some(max_capacity),
        }
    }

    /// Get the current length of data in the buffer
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the buffer contents as a byte slice
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Freeze the buffer into immutable Bytes
    pub fn freeze(self) -> Bytes {
        self.data.freeze()
    }

    #[inline]
    fn ensure_capacity(&self, n: usize) -> Result<()> {
        if let Some(max) = self.max_capacity {
            if self.data.len() + n > max {
                return Err(Error::BufferOverflow {
                    needed: n,
                    available: max.saturating_sub(self.data.len()),
                });
            }
        }
        Ok(())
    }

    // =========================================================================
    // Raw writes
    // =========================================================================

    /// Write a single byte
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.ensure_capacity(1)?;
        self.data.put_u8(value);
        Ok(())
    }

    /// Write a boolean as one byte
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(value as u8)
    }

    /// Write raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure_capacity(bytes.len())?;
        self.data.put_slice(bytes);
        Ok(())
    }

    // =========================================================================
    // Big-endian integer writes (network byte order)
    // =========================================================================

    /// Write a 16-bit unsigned integer in big-endian format
    pub fn write_u16_be(&mut self, value: u16) -> Result<()> {
        self.ensure_capacity(2)?;
        self.data.put_u16(value);
        Ok(())
    }

    /// Write a 32-bit unsigned integer in big-endian format
    pub fn write_u32_be(&mut self, value: u32) -> Result<()> {
        self.ensure_capacity(4)?;
        self.data.put_u32(value);
        Ok(())
    }

    /// Write a 32-bit signed integer in big-endian format
    pub fn write_i32_be(&mut self, value: i32) -> Result<()> {
        self.ensure_capacity(4)?;
        self.data.put_i32(value);
        Ok(())
    }

    /// Write a 64-bit unsigned integer in big-endian format
    pub fn write_u64_be(&mut self, value: u64) -> Result<()> {
        self.ensure_capacity(8)?;
        self.data.put_u64(value);
        Ok(())
    }

    /// Write a 64-bit signed integer in big-endian format
    pub fn write_i64_be(&mut self, value: i64) -> Result<()> {
        self.ensure_capacity(8)?;
        self.data.put_i64(value);
        Ok(())
    }

    /// Write an IEEE-754 double in big-endian format
    pub fn write_f64_be(&mut self, value: f64) -> Result<()> {
        self.ensure_capacity(8)?;
        self.data.put_f64(value);
        Ok(())
    }

    // =========================================================================
    // Length-prefixed writes
    // =========================================================================

    /// Write a byte string prefixed with a 4-byte length
    pub fn write_bytes_with_length(&mut self, bytes: &[u8]) -> Result<()> {
        let len = u32::try_from(bytes.len())
            .map_err(|_| Error::protocol(format!("byte string of {} bytes too long", bytes.len())))?;
        self.write_u32_be(len)?;
        self.write_bytes(bytes)
    }

    /// Write a UTF-8 string prefixed with a 4-byte length
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_bytes_with_length(value.as_bytes())
    }

    /// Write a UTF-8 string prefixed with a 2-byte length
    pub fn write_short_string(&mut self, value: &str) -> Result<()> {
        let len = u16::try_from(value.len())
            .map_err(|_| Error::protocol(format!("name of {} bytes too long", value.len())))?;
        self.write_u16_be(len)?;
        self.write_bytes(value.as_bytes())
    }

    /// Write an optional UTF-8 string (presence byte, then 4-byte length)
    pub fn write_optional_string(&mut self, value: Option<&str>) -> Result<()> {
        match value {
            Some(s) => {
                self.write_bool(true)?;
                self.write_string(s)
            }
            None => self.write_bool(false),
        }
    }
}

impl Default for WriteBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ReadBuffer;

    #[test]
    fn test_write_big_endian() {
        let mut buf = WriteBuffer::new();
        buf.write_u16_be(0x1234).unwrap();
        buf.write_u32_be(0xDEADBEEF).unwrap();
        assert_eq!(buf.as_slice(), &[0x12, 0x34, 0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn test_max_capacity() {
        let mut buf = WriteBuffer::with_max_capacity(4, 4);
        buf.write_u32_be(1).unwrap();
        assert!(matches!(
            buf.write_u8(0),
            Err(Error::BufferOverflow { needed: 1, available: 0 })
        ));
    }

    #[test]
    fn test_strings_read_back() {
        let mut buf = WriteBuffer::new();
        buf.write_string("héllo").unwrap();
        buf.write_short_string("Handshake").unwrap();
        buf.write_optional_string(None).unwrap();
        buf.write_optional_string(Some("x")).unwrap();

        let mut read = ReadBuffer::new(buf.freeze());
        assert_eq!(read.read_string().unwrap(), "héllo");
        assert_eq!(read.read_short_string().unwrap(), "Handshake");
        assert_eq!(read.read_optional_string().unwrap(), None);
        assert_eq!(read.read_optional_string().unwrap().as_deref(), Some("x"));
    }
}
