//! Session configuration
//!
//! A [`Config`] is the settings bag a [`Session`](crate::Session) is built
//! from: where to connect, how to secure the socket, and the timeouts and
//! sizes the codec and cursor engine run with.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::auth::Credentials;
use crate::codec::{EncodeOptions, TypeRegistry};
use crate::constants::{
    DEFAULT_CALL_TIMEOUT, DEFAULT_CONNECT_TIMEOUT, DEFAULT_FETCH_SIZE, DEFAULT_MAX_OBJECT_SIZE,
    DEFAULT_PORT, DEFAULT_SAVED_BATCHES, DEFAULT_SOCKET_TIMEOUT,
};
use crate::error::{Error, Result};
use crate::transport::TlsConfig;

/// Smallest accepted maximum frame size
const MIN_MAX_OBJECT_SIZE: usize = 1024;

/// A server address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostInfo {
    /// Host name or IP address
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl HostInfo {
    /// Create a host address
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for HostInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Parse `host` or `host:port`
impl FromStr for HostInfo {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (host, port) = match s.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse()
                    .map_err(|_| Error::InvalidConfig(format!("invalid port in {:?}", s)))?;
                (host, port)
            }
            None => (s, DEFAULT_PORT),
        };
        if host.is_empty() {
            return Err(Error::InvalidConfig("missing host".to_string()));
        }
        Ok(HostInfo::new(host, port))
    }
}

/// TLS mode for connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsMode {
    /// No TLS (plain TCP)
    #[default]
    Disable,
    /// Require TLS
    Require,
}

/// Connection and result-streaming settings.
///
/// # Example
///
/// ```rust
/// use fedquery_rs::Config;
/// use std::time::Duration;
///
/// let config = Config::new("dqp.internal", 31000)
///     .credentials("scott", "tiger")
///     .fetch_size(500)
///     .call_timeout(Duration::from_secs(30));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Primary server
    pub host: HostInfo,
    /// Alternate servers, handed to the failover layer as-is
    pub failover_hosts: Vec<HostInfo>,
    /// User name for logon
    pub username: Option<String>,
    /// Password for logon
    password: Option<String>,
    /// Extra logon properties
    pub properties: Vec<(String, String)>,
    /// TLS mode
    pub tls_mode: TlsMode,
    /// TLS configuration (certificates, SNI)
    pub tls_config: Option<TlsConfig>,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Wake-up interval for re-checking call deadlines
    pub socket_timeout: Duration,
    /// Default deadline for a single call
    pub call_timeout: Duration,
    /// Rows requested per batch
    pub fetch_size: u32,
    /// Largest frame accepted from the server
    pub max_object_size: usize,
    /// Batches a scrollable cursor keeps resident
    pub saved_batches: usize,
    /// Fetch the next batch before it is needed
    pub prefetch: bool,
    /// Write registered type codes (otherwise tag everything by name)
    pub use_known_types: bool,
    /// Foreign type names the decoder may reconstruct
    pub allowed_types: TypeRegistry,
}

impl Config {
    /// Create a configuration for one server
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: HostInfo::new(host, port),
            ..Self::default()
        }
    }

    /// Set user name and password
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Add a logon property
    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }

    /// Add an alternate server
    pub fn failover_host(mut self, host: HostInfo) -> Self {
        self.failover_hosts.push(host);
        self
    }

    /// Set TLS mode
    pub fn tls(mut self, mode: TlsMode) -> Self {
        self.tls_mode = mode;
        self
    }

    /// Set TLS configuration
    pub fn tls_config(mut self, config: TlsConfig) -> Self {
        self.tls_config = Some(config);
        self.tls_mode = TlsMode::Require;
        self
    }

    /// Enable TLS with the bundled root certificates
    pub fn with_tls(mut self) -> Result<Self> {
        let tls_config = TlsConfig::new();
        tls_config.client_config()?;
        self.tls_config = Some(tls_config);
        self.tls_mode = TlsMode::Require;
        Ok(self)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls_mode == TlsMode::Require
    }

    /// Set connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the deadline re-check interval
    pub fn socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = timeout;
        self
    }

    /// Set the default per-call deadline
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Set rows per batch
    pub fn fetch_size(mut self, rows: u32) -> Self {
        self.fetch_size = rows;
        self
    }

    /// Set the largest accepted frame
    pub fn max_object_size(mut self, bytes: usize) -> Self {
        self.max_object_size = bytes;
        self
    }

    /// Set how many batches a scrollable cursor keeps
    pub fn saved_batches(mut self, batches: usize) -> Self {
        self.saved_batches = batches;
        self
    }

    /// Enable or disable prefetching
    pub fn prefetch(mut self, enabled: bool) -> Self {
        self.prefetch = enabled;
        self
    }

    /// Choose between registered codes and by-name tags when encoding
    pub fn use_known_types(mut self, enabled: bool) -> Self {
        self.use_known_types = enabled;
        self
    }

    /// Allow the decoder to reconstruct a foreign type
    pub fn allow_type(mut self, name: impl Into<String>) -> Self {
        self.allowed_types = self.allowed_types.allow(name);
        self
    }

    /// Credentials for user/password logon, if configured
    pub fn logon_credentials(&self) -> Option<Credentials> {
        let user = self.username.as_ref()?;
        Some(
            Credentials::password(user.clone(), self.password.clone().unwrap_or_default())
                .with_properties(self.properties.clone()),
        )
    }

    /// All servers in connection order: primary first
    pub fn hosts(&self) -> impl Iterator<Item = &HostInfo> {
        std::iter::once(&self.host).chain(self.failover_hosts.iter())
    }

    /// Encoder settings derived from this configuration
    pub fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            use_known_types: self.use_known_types,
            max_object_size: self.max_object_size,
        }
    }

    /// Reject settings the session cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.host.host.is_empty() {
            return Err(Error::InvalidConfig("missing host".to_string()));
        }
        if self.fetch_size == 0 {
            return Err(Error::InvalidConfig("fetch size must be positive".to_string()));
        }
        if self.saved_batches == 0 {
            return Err(Error::InvalidConfig(
                "saved batches must be at least 1".to_string(),
            ));
        }
        if self.max_object_size < MIN_MAX_OBJECT_SIZE {
            return Err(Error::InvalidConfig(format!(
                "max object size must be at least {} bytes",
                MIN_MAX_OBJECT_SIZE
            )));
        }
        if self.socket_timeout.is_zero() || self.call_timeout.is_zero() {
            return Err(Error::InvalidConfig("timeouts must be non-zero".to_string()));
        }
        if self.is_tls_enabled() && self.tls_config.is_none() {
            return Err(Error::InvalidConfig(
                "TLS required but no TLS configuration set".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: HostInfo::new("localhost", DEFAULT_PORT),
            failover_hosts: Vec::new(),
            username: None,
            password: None,
            properties: Vec::new(),
            tls_mode: TlsMode::Disable,
            tls_config: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            socket_timeout: DEFAULT_SOCKET_TIMEOUT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            fetch_size: DEFAULT_FETCH_SIZE,
            max_object_size: DEFAULT_MAX_OBJECT_SIZE,
            saved_batches: DEFAULT_SAVED_BATCHES,
            prefetch: true,
            use_known_types: true,
            allowed_types: TypeRegistry::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.fetch_size, 2048);
        assert_eq!(config.max_object_size, 32 * 1024 * 1024);
        assert_eq!(config.saved_batches, 3);
        assert!(config.prefetch);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_host_info() {
        let h: HostInfo = "dqp1:31001".parse().unwrap();
        assert_eq!(h, HostInfo::new("dqp1", 31001));
        let h: HostInfo = "dqp2".parse().unwrap();
        assert_eq!(h.port, DEFAULT_PORT);
        assert!("dqp:port".parse::<HostInfo>().is_err());
        assert!(":31000".parse::<HostInfo>().is_err());
    }

    #[test]
    fn test_hosts_order() {
        let config = Config::new("a", 1)
            .failover_host(HostInfo::new("b", 2))
            .failover_host(HostInfo::new("c", 3));
        let names: Vec<_> = config.hosts().map(|h| h.host.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(Config::default().fetch_size(0).validate().is_err());
        assert!(Config::default().saved_batches(0).validate().is_err());
        assert!(Config::default().max_object_size(10).validate().is_err());
        assert!(Config::default()
            .socket_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(Config::default().tls(TlsMode::Require).validate().is_err());
    }

    #[test]
    fn test_logon_credentials() {
        assert!(Config::default().logon_credentials().is_none());
        let creds = Config::default()
            .credentials("scott", "tiger")
            .property("app", "report")
            .logon_credentials()
            .unwrap();
        assert_eq!(creds.user(), Some("scott"));
    }

    #[test]
    fn test_encode_options() {
        let opts = Config::default().use_known_types(false).encode_options();
        assert!(!opts.use_known_types);
    }
}
