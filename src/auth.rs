//! Credential exchange
//!
//! Password logon is a single `logon` call. Token-based logon (Kerberos and
//! similar) is driven by an external [`TokenNegotiator`]: each
//! [`LogonResult`](crate::messages::LogonResult) that carries a continuation
//! challenge is answered with the negotiator's next token through
//! `continueLogon`, until the server stops asking.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::messages::LogonRequest;

/// Upper bound on `continueLogon` round trips for one logon
pub const MAX_LOGON_ROUNDS: usize = 16;

/// Produces opaque tokens for a multi-step credential exchange
#[async_trait]
pub trait TokenNegotiator: Send + Sync {
    /// Token sent with the initial `logon` call
    async fn initial_token(&self) -> Result<Bytes>;

    /// Token answering a server challenge
    async fn next_token(&self, challenge: &[u8]) -> Result<Bytes>;
}

/// What the client presents at logon
#[derive(Clone, Default)]
pub struct Credentials {
    user: Option<String>,
    password: Option<String>,
    token: Option<Bytes>,
    properties: Vec<(String, String)>,
}

impl Credentials {
    /// User name and password
    pub fn password(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            password: Some(password.into()),
            ..Self::default()
        }
    }

    /// Token exchange; the first token comes from the negotiator
    pub fn negotiated() -> Self {
        Self::default()
    }

    /// Token exchange with a pre-computed first token
    pub fn token(token: impl Into<Bytes>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    /// Set the user name
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Replace the logon properties
    pub fn with_properties(mut self, properties: Vec<(String, String)>) -> Self {
        self.properties = properties;
        self
    }

    /// User name, if any
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Check if the first token must be produced by a negotiator
    pub fn needs_initial_token(&self) -> bool {
        self.password.is_none() && self.token.is_none()
    }

    pub(crate) fn into_request(self) -> LogonRequest {
        LogonRequest {
            user: self.user,
            password: self.password,
            token: self.token,
            properties: self.properties,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("token", &self.token.as_ref().map(|t| t.len()))
            .field("properties", &self.properties)
            .finish()
    }
}
