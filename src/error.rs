//! Error types for the federated query client
//!
//! This module defines every error that can surface from the client, from
//! wire-level corruption up to cursor misuse. Each error belongs to one
//! [`ErrorKind`] and carries a stable machine-readable code.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::messages::RemoteException;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad version/type byte, truncated or oversized frame. The session is discarded.
    ProtocolCorruption,
    /// A single call exceeded its deadline. Cursor and streamer state are unaffected.
    Timeout,
    /// The server returned an exception payload in a well-formed frame.
    RemoteFailure,
    /// Cursor misuse detected locally, no network I/O performed.
    IllegalNavigation,
    /// Operation on a closed cursor, streamer or session.
    ResourceClosed,
    /// Transport I/O failure. The session is discarded.
    Io,
    /// Invalid local configuration.
    Configuration,
    /// Credential exchange failed.
    Authentication,
    /// A value could not be converted as requested. The session stays usable.
    DataConversion,
}

/// Main error type for the client
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// Version byte did not match the supported wire version
    #[error("stream corrupted: unsupported wire version {actual} (expected {expected})")]
    UnsupportedVersion { expected: u8, actual: u8 },

    /// Type code is neither registered nor the by-name sentinel
    #[error("stream corrupted: unknown type code {0}")]
    UnknownTypeCode(u8),

    /// Type name rejected by the allow-list
    #[error("stream corrupted: type name {0:?} is not allowed")]
    DisallowedType(String),

    /// Frame length exceeds the configured maximum object size
    #[error("stream corrupted: frame of {size} bytes exceeds maximum of {max}")]
    FrameTooLarge { size: usize, max: usize },

    /// Buffer underflow - not enough data to read
    #[error("buffer underflow: need {needed} bytes but only {available} available")]
    BufferUnderflow { needed: usize, available: usize },

    /// Buffer overflow - not enough space to write
    #[error("buffer overflow: need {needed} bytes but only {available} available")]
    BufferOverflow { needed: usize, available: usize },

    /// Batch row count disagrees with its first/last row indexes
    #[error("malformed batch: rows {first_row}..={last_row} but {actual} rows present")]
    MalformedBatch {
        first_row: i64,
        last_row: i64,
        actual: usize,
    },

    /// A reply of the wrong kind arrived for a call
    #[error("unexpected message: expected {expected}, got {actual}")]
    UnexpectedMessage {
        expected: &'static str,
        actual: String,
    },

    /// General protocol error
    #[error("protocol error: {0}")]
    Protocol(String),

    // =========================================================================
    // Connection Errors
    // =========================================================================
    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The session failed while this call was outstanding
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// Connection timeout
    #[error("connection timeout after {0:?}")]
    ConnectionTimeout(std::time::Duration),

    /// TLS setup failure
    #[error("TLS error: {0}")]
    Tls(String),

    // =========================================================================
    // Call Errors
    // =========================================================================
    /// A single call exceeded its deadline
    #[error("{method} timed out after {timeout:?}")]
    Timeout {
        method: &'static str,
        timeout: Duration,
    },

    /// Exception reported by the server
    #[error("{0}")]
    Remote(RemoteException),

    // =========================================================================
    // Navigation Errors
    // =========================================================================
    /// Cursor misuse
    #[error("illegal navigation: {0}")]
    IllegalNavigation(String),

    /// Row accessor called while not positioned on a row
    #[error("cursor is not positioned on a row")]
    NoCurrentRow,

    /// Column index outside the row
    #[error("column index {index} out of range (row has {count} columns)")]
    ColumnOutOfRange { index: usize, count: usize },

    // =========================================================================
    // Closed Resources
    // =========================================================================
    /// Session is closed
    #[error("session is closed")]
    SessionClosed,

    /// Cursor is closed
    #[error("cursor is closed")]
    CursorClosed,

    /// LOB stream is closed
    #[error("stream closed")]
    StreamClosed,

    // =========================================================================
    // Configuration / Authentication
    // =========================================================================
    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Authentication failed
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    // =========================================================================
    // Data Errors
    // =========================================================================
    /// Data conversion error
    #[error("data conversion error: {0}")]
    DataConversion(String),
}

impl Error {
    /// Create a general protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol(message.into())
    }

    /// Create an illegal navigation error
    pub fn navigation(message: impl Into<String>) -> Self {
        Error::IllegalNavigation(message.into())
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnsupportedVersion { .. }
            | Error::UnknownTypeCode(_)
            | Error::DisallowedType(_)
            | Error::FrameTooLarge { .. }
            | Error::BufferUnderflow { .. }
            | Error::BufferOverflow { .. }
            | Error::MalformedBatch { .. }
            | Error::UnexpectedMessage { .. }
            | Error::Protocol(_) => ErrorKind::ProtocolCorruption,
            Error::Io(_) | Error::ConnectionLost(_) | Error::ConnectionTimeout(_) => ErrorKind::Io,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Remote(_) => ErrorKind::RemoteFailure,
            Error::IllegalNavigation(_) | Error::NoCurrentRow | Error::ColumnOutOfRange { .. } => {
                ErrorKind::IllegalNavigation
            }
            Error::SessionClosed | Error::CursorClosed | Error::StreamClosed => {
                ErrorKind::ResourceClosed
            }
            Error::InvalidConfig(_) | Error::Tls(_) => ErrorKind::Configuration,
            Error::AuthenticationFailed(_) => ErrorKind::Authentication,
            Error::DataConversion(_) => ErrorKind::DataConversion,
        }
    }

    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Error::UnsupportedVersion { .. } => "FQ-PROTO-VERSION",
            Error::UnknownTypeCode(_) => "FQ-PROTO-TYPE",
            Error::DisallowedType(_) => "FQ-PROTO-DISALLOWED",
            Error::FrameTooLarge { .. } => "FQ-PROTO-SIZE",
            Error::BufferUnderflow { .. } => "FQ-PROTO-TRUNCATED",
            Error::BufferOverflow { .. } => "FQ-PROTO-OVERFLOW",
            Error::MalformedBatch { .. } => "FQ-PROTO-BATCH",
            Error::UnexpectedMessage { .. } => "FQ-PROTO-UNEXPECTED",
            Error::Protocol(_) => "FQ-PROTO",
            Error::DataConversion(_) => "FQ-DATA",
            Error::Io(_) => "FQ-IO",
            Error::ConnectionLost(_) => "FQ-IO-LOST",
            Error::ConnectionTimeout(_) => "FQ-IO-CONNECT-TIMEOUT",
            Error::Tls(_) => "FQ-CONFIG-TLS",
            Error::Timeout { .. } => "FQ-TIMEOUT",
            Error::Remote(_) => "FQ-REMOTE",
            Error::IllegalNavigation(_) => "FQ-NAV",
            Error::NoCurrentRow => "FQ-NAV-NO-ROW",
            Error::ColumnOutOfRange { .. } => "FQ-NAV-COLUMN",
            Error::SessionClosed => "FQ-CLOSED-SESSION",
            Error::CursorClosed => "FQ-CLOSED-CURSOR",
            Error::StreamClosed => "FQ-CLOSED-STREAM",
            Error::InvalidConfig(_) => "FQ-CONFIG",
            Error::AuthenticationFailed(_) => "FQ-AUTH",
        }
    }

    /// Check if the owning session must be discarded after this error
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::ProtocolCorruption | ErrorKind::Io)
    }

    /// Check if this is a call timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Check if this error is recoverable (the same operation may be retried)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Get the remote exception if this error carries one
    pub fn remote(&self) -> Option<&RemoteException> {
        match self {
            Error::Remote(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RemoteException> for Error {
    fn from(e: RemoteException) -> Self {
        Error::Remote(e)
    }
}
