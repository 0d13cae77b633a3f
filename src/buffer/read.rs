//! Read buffer for decoding frame bodies
//!
//! Provides methods for reading big-endian primitives and length-prefixed
//! byte strings from a byte buffer. Every read is bounds-checked and reports
//! [`Error::BufferUnderflow`] instead of panicking.

use bytes::Bytes;

use crate::error::{Error, Result};

/// A buffer for reading wire data
#[derive(Debug)]
pub struct ReadBuffer {
    /// The underlying byte data
    data: Bytes,
    /// Current read position
    pos: usize,
}

impl ReadBuffer {
    /// Create a new ReadBuffer from bytes
    pub fn new(data: Bytes) -> Self {
        Self { data, pos: 0 }
    }

    /// Create a new ReadBuffer from a byte slice
    pub fn from_slice(data: &[u8]) -> Self {
        Self {
            data: Bytes::copy_from_slice(data),
            pos: 0,
        }
    }

    /// Get the current position in the buffer
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Get the total length of the buffer
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the number of bytes remaining to be read
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Get a slice of the remaining bytes (without advancing position)
    #[inline]
    pub fn remaining_bytes(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    /// Skip `n` bytes in the buffer
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.ensure_remaining(n)?;
        self.pos += n;
        Ok(())
    }

    #[inline]
    fn ensure_remaining(&self, n: usize) -> Result<()> {
        if self.remaining() < n {
            Err(Error::BufferUnderflow {
                needed: n,
                available: self.remaining(),
            })
        } else {
            Ok(())
        }
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.ensure_remaining(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    // =========================================================================
    // Raw reads
    // =========================================================================

    /// Read a single byte
    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure_remaining(1)?;
        let value = self.data[self.pos];
        self.pos += 1;
        Ok(value)
    }

    /// Read a boolean encoded as one byte
    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::protocol(format!("invalid boolean byte {}", other))),
        }
    }

    /// Read raw bytes without copying
    pub fn read_bytes_owned(&mut self, n: usize) -> Result<Bytes> {
        self.ensure_remaining(n)?;
        let bytes = self.data.slice(self.pos..self.pos + n);
        self.pos += n;
        Ok(bytes)
    }

    // =========================================================================
    // Big-endian integer reads (network byte order)
    // =========================================================================

    /// Read a 16-bit unsigned integer in big-endian format
    pub fn read_u16_be(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    /// Read a 32-bit unsigned integer in big-endian format
    pub fn read_u32_be(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    /// Read a 32-bit signed integer in big-endian format
    pub fn read_i32_be(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    /// Read a 64-bit unsigned integer in big-endian format
    pub fn read_u64_be(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    /// Read a 64-bit signed integer in big-endian format
    pub fn read_i64_be(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.read_array()?))
    }

    /// Read an IEEE-754 double in big-endian format
    pub fn read_f64_be(&mut self) -> Result<f64> {
        Ok(f64::from_be_bytes(self.read_array()?))
    }

    // =========================================================================
    // Length-prefixed reads
    // =========================================================================

    /// Read a byte string prefixed with a 4-byte length
    pub fn read_bytes_with_length(&mut self) -> Result<Bytes> {
        let len = self.read_u32_be()? as usize;
        self.read_bytes_owned(len)
    }

    /// Read a UTF-8 string prefixed with a 4-byte length
    pub fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_bytes_with_length()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::protocol(format!("invalid UTF-8 string: {}", e)))
    }

    /// Read a UTF-8 string prefixed with a 2-byte length
    pub fn read_short_string(&mut self) -> Result<String> {
        let len = self.read_u16_be()? as usize;
        let bytes = self.read_bytes_owned(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::protocol(format!("invalid UTF-8 string: {}", e)))
    }

    /// Read an optional UTF-8 string (presence byte, then 4-byte length)
    pub fn read_optional_string(&mut self) -> Result<Option<String>> {
        if self.read_bool()? {
            self.read_string().map(Some)
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_big_endian() {
        let mut buf = ReadBuffer::from_slice(&[0x12, 0x34, 0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(buf.read_u16_be().unwrap(), 0x1234);
        assert_eq!(buf.read_u32_be().unwrap(), 0xDEADBEEF);
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn test_underflow_reports_sizes() {
        let mut buf = ReadBuffer::from_slice(&[0x00, 0x01]);
        match buf.read_u32_be() {
            Err(Error::BufferUnderflow { needed, available }) => {
                assert_eq!(needed, 4);
                assert_eq!(available, 2);
            }
            other => panic!("expected underflow, got {:?}", other),
        }
        // Position is unchanged after a failed read
        assert_eq!(buf.position(), 0);
    }

    #[test]
    fn test_short_string() {
        let mut buf = ReadBuffer::from_slice(&[0x00, 0x03, b'a', b'b', b'c']);
        assert_eq!(buf.read_short_string().unwrap(), "abc");
    }

    #[test]
    fn test_invalid_bool() {
        let mut buf = ReadBuffer::from_slice(&[7]);
        assert!(buf.read_bool().is_err());
    }
}
