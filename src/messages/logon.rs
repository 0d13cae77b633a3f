//! Credential exchange messages

use bytes::Bytes;

use crate::codec::{Decoder, Encoder, KnownType, WireType};
use crate::error::Result;

/// Credentials submitted to `logon` / `continueLogon`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogonRequest {
    /// User name
    pub user: Option<String>,
    /// Password (user/password authentication)
    pub password: Option<String>,
    /// Opaque token (token exchange)
    pub token: Option<Bytes>,
    /// Connection properties
    pub properties: Vec<(String, String)>,
}

impl WireType for LogonRequest {
    const KIND: KnownType = KnownType::LogonRequest;

    fn write_body(&self, enc: &mut Encoder) -> Result<()> {
        let buf = enc.buffer();
        buf.write_optional_string(self.user.as_deref())?;
        buf.write_optional_string(self.password.as_deref())?;
        write_optional_bytes(enc, self.token.as_ref())?;
        let buf = enc.buffer();
        buf.write_u32_be(self.properties.len() as u32)?;
        for (key, value) in &self.properties {
            buf.write_string(key)?;
            buf.write_string(value)?;
        }
        Ok(())
    }

    fn read_body(dec: &mut Decoder<'_>) -> Result<Self> {
        let user = dec.buffer().read_optional_string()?;
        let password = dec.buffer().read_optional_string()?;
        let token = read_optional_bytes(dec)?;
        let count = dec.buffer().read_u32_be()? as usize;
        let mut properties = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            let key = dec.buffer().read_string()?;
            let value = dec.buffer().read_string()?;
            properties.push((key, value));
        }
        Ok(Self {
            user,
            password,
            token,
            properties,
        })
    }
}

/// Outcome of one logon step
///
/// A result carrying `continuation` asks the client for another token.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogonResult {
    /// Server-assigned session id
    pub session_id: String,
    /// Authenticated user name
    pub user_name: String,
    /// Challenge for the next token exchange step
    pub continuation: Option<Bytes>,
}

impl WireType for LogonResult {
    const KIND: KnownType = KnownType::LogonResult;

    fn write_body(&self, enc: &mut Encoder) -> Result<()> {
        enc.buffer().write_string(&self.session_id)?;
        enc.buffer().write_string(&self.user_name)?;
        write_optional_bytes(enc, self.continuation.as_ref())
    }

    fn read_body(dec: &mut Decoder<'_>) -> Result<Self> {
        Ok(Self {
            session_id: dec.buffer().read_string()?,
            user_name: dec.buffer().read_string()?,
            continuation: read_optional_bytes(dec)?,
        })
    }
}

fn write_optional_bytes(enc: &mut Encoder, bytes: Option<&Bytes>) -> Result<()> {
    let buf = enc.buffer();
    match bytes {
        Some(b) => {
            buf.write_bool(true)?;
            buf.write_bytes_with_length(b)
        }
        None => buf.write_bool(false),
    }
}

fn read_optional_bytes(dec: &mut Decoder<'_>) -> Result<Option<Bytes>> {
    let buf = dec.buffer();
    if buf.read_bool()? {
        buf.read_bytes_with_length().map(Some)
    } else {
        Ok(None)
    }
}
