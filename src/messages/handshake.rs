//! Connection handshake
//!
//! The server opens every connection with a `Handshake`; the client checks
//! the wire version and answers with its own.

use crate::codec::{Decoder, Encoder, KnownType, WireType};
use crate::constants::WIRE_VERSION;
use crate::error::{Error, Result};

/// Authentication style announced by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum AuthType {
    /// User name and password
    #[default]
    UserPassword = 0,
    /// Multi-step opaque token exchange (GSS-style)
    Token = 1,
}

impl TryFrom<u8> for AuthType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(AuthType::UserPassword),
            1 => Ok(AuthType::Token),
            _ => Err(Error::protocol(format!("invalid auth type {}", value))),
        }
    }
}

/// Handshake exchanged before any other frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Wire version spoken by the sender
    pub version: u8,
    /// Product version string of the sender
    pub product_version: String,
    /// Authentication style (meaningful from the server)
    pub auth_type: AuthType,
}

impl Handshake {
    /// Handshake for this client
    pub fn client() -> Self {
        Self {
            version: WIRE_VERSION,
            product_version: env!("CARGO_PKG_VERSION").to_string(),
            auth_type: AuthType::UserPassword,
        }
    }

    /// Check that the peer speaks our wire version
    pub fn validate(&self) -> Result<()> {
        if self.version != WIRE_VERSION {
            return Err(Error::UnsupportedVersion {
                expected: WIRE_VERSION,
                actual: self.version,
            });
        }
        Ok(())
    }
}

impl WireType for Handshake {
    const KIND: KnownType = KnownType::Handshake;

    fn write_body(&self, enc: &mut Encoder) -> Result<()> {
        let buf = enc.buffer();
        buf.write_u8(self.version)?;
        buf.write_string(&self.product_version)?;
        buf.write_u8(self.auth_type as u8)
    }

    fn read_body(dec: &mut Decoder<'_>) -> Result<Self> {
        let buf = dec.buffer();
        Ok(Self {
            version: buf.read_u8()?,
            product_version: buf.read_string()?,
            auth_type: AuthType::try_from(buf.read_u8()?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_version() {
        assert!(Handshake::client().validate().is_ok());
        let old = Handshake {
            version: 0,
            ..Handshake::client()
        };
        assert!(matches!(
            old.validate(),
            Err(Error::UnsupportedVersion { actual: 0, .. })
        ));
    }
}
