//! Known-type table and type-name allow-list
//!
//! Every value on the wire starts with a one-byte tag. Registered kinds use a
//! fixed code from [`KnownType`]; anything else is written as the
//! [`BY_NAME`] sentinel followed by a length-prefixed UTF-8 type name. Codes
//! are stable for the lifetime of a wire version.

use std::collections::HashSet;

use crate::error::{Error, Result};

/// Tag byte announcing a by-name type encoding
pub const BY_NAME: u8 = 1;

/// Registered wire kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KnownType {
    /// SQL NULL / absent value
    Null = 0,
    /// Boolean
    Boolean = 2,
    /// 32-bit integer
    Integer = 3,
    /// 64-bit integer
    Long = 4,
    /// Double precision float
    Double = 5,
    /// UTF-8 string
    String = 6,
    /// Inline byte string
    Binary = 7,
    /// Ordered list of values
    List = 8,
    /// Placeholder for a stream appended after the frame
    StreamReference = 9,
    /// Handle to a LOB held by the server
    LobReference = 10,
    /// Connection handshake
    Handshake = 16,
    /// Remote method call
    ServiceInvocation = 17,
    /// Remote method result
    ServiceReply = 18,
    /// Query submission
    RequestMessage = 19,
    /// Row batch and result metadata
    ResultsMessage = 20,
    /// One piece of LOB content
    LobChunk = 21,
    /// Server-side failure
    RemoteException = 22,
    /// Credential submission
    LogonRequest = 23,
    /// Session establishment result
    LogonResult = 24,
}

const ALL: [KnownType; 19] = [
    KnownType::Null,
    KnownType::Boolean,
    KnownType::Integer,
    KnownType::Long,
    KnownType::Double,
    KnownType::String,
    KnownType::Binary,
    KnownType::List,
    KnownType::StreamReference,
    KnownType::LobReference,
    KnownType::Handshake,
    KnownType::ServiceInvocation,
    KnownType::ServiceReply,
    KnownType::RequestMessage,
    KnownType::ResultsMessage,
    KnownType::LobChunk,
    KnownType::RemoteException,
    KnownType::LogonRequest,
    KnownType::LogonResult,
];

impl KnownType {
    /// Wire code of this kind
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Type name used by the by-name fallback
    pub fn name(self) -> &'static str {
        match self {
            KnownType::Null => "Null",
            KnownType::Boolean => "Boolean",
            KnownType::Integer => "Integer",
            KnownType::Long => "Long",
            KnownType::Double => "Double",
            KnownType::String => "String",
            KnownType::Binary => "Binary",
            KnownType::List => "List",
            KnownType::StreamReference => "StreamReference",
            KnownType::LobReference => "LobReference",
            KnownType::Handshake => "Handshake",
            KnownType::ServiceInvocation => "ServiceInvocation",
            KnownType::ServiceReply => "ServiceReply",
            KnownType::RequestMessage => "RequestMessage",
            KnownType::ResultsMessage => "ResultsMessage",
            KnownType::LobChunk => "LobChunk",
            KnownType::RemoteException => "RemoteException",
            KnownType::LogonRequest => "LogonRequest",
            KnownType::LogonResult => "LogonResult",
        }
    }

    /// Look up a kind by wire code
    pub fn from_code(code: u8) -> Option<Self> {
        ALL.iter().copied().find(|t| t.code() == code)
    }

    /// Look up a kind by type name
    pub fn from_name(name: &str) -> Option<Self> {
        ALL.iter().copied().find(|t| t.name() == name)
    }

    /// All registered kinds
    pub fn all() -> &'static [KnownType] {
        &ALL
    }
}

impl TryFrom<u8> for KnownType {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        KnownType::from_code(code).ok_or(Error::UnknownTypeCode(code))
    }
}

/// Allow-list consulted before a foreign type name is reconstructed
///
/// Names of registered kinds always resolve. Any other name must be allowed
/// explicitly, either exactly or by a `prefix.` rule; everything else is a
/// hard decode failure.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    exact: HashSet<String>,
    prefixes: Vec<String>,
}

impl TypeRegistry {
    /// Create a registry that only resolves registered kinds
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow one exact foreign type name
    pub fn allow(mut self, name: impl Into<String>) -> Self {
        self.exact.insert(name.into());
        self
    }

    /// Allow every foreign type name under a dotted prefix
    pub fn allow_prefix(mut self, prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if !prefix.ends_with('.') {
            prefix.push('.');
        }
        self.prefixes.push(prefix);
        self
    }

    /// Check whether a foreign type name may be reconstructed
    pub fn is_allowed(&self, name: &str) -> bool {
        if !is_well_formed(name) {
            return false;
        }
        self.exact.contains(name) || self.prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }

    /// Resolve a by-name tag
    ///
    /// Returns `Some(kind)` for registered names and `None` for an allowed
    /// foreign name.
    pub fn resolve(&self, name: &str) -> Result<Option<KnownType>> {
        if let Some(kind) = KnownType::from_name(name) {
            return Ok(Some(kind));
        }
        if self.is_allowed(name) {
            Ok(None)
        } else {
            Err(Error::DisallowedType(name.to_string()))
        }
    }
}

fn is_well_formed(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.ends_with('.')
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_unique_and_avoid_sentinel() {
        let mut seen = HashSet::new();
        for kind in KnownType::all() {
            assert_ne!(kind.code(), BY_NAME);
            assert!(seen.insert(kind.code()), "duplicate code {}", kind.code());
        }
    }

    #[test]
    fn test_code_and_name_lookup() {
        for kind in KnownType::all() {
            assert_eq!(KnownType::from_code(kind.code()), Some(*kind));
            assert_eq!(KnownType::from_name(kind.name()), Some(*kind));
        }
        assert!(matches!(KnownType::try_from(200), Err(Error::UnknownTypeCode(200))));
    }

    #[test]
    fn test_registry_resolution() {
        let registry = TypeRegistry::new()
            .allow("org.example.Widget")
            .allow_prefix("org.example.types");

        assert_eq!(registry.resolve("LobChunk").unwrap(), Some(KnownType::LobChunk));
        assert_eq!(registry.resolve("org.example.Widget").unwrap(), None);
        assert_eq!(registry.resolve("org.example.types.Point").unwrap(), None);
        assert!(matches!(
            registry.resolve("java.lang.Runtime"),
            Err(Error::DisallowedType(_))
        ));
    }

    #[test]
    fn test_malformed_names_rejected() {
        let registry = TypeRegistry::new().allow_prefix("a");
        assert!(!registry.is_allowed("a..b"));
        assert!(!registry.is_allowed("a.b c"));
        assert!(!registry.is_allowed(""));
        assert!(registry.is_allowed("a.b"));
    }
}
