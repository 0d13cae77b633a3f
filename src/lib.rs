#![warn(missing_docs)]

//! # fedquery-rs
//!
//! Async client transport and result streaming for a federated query engine.
//!
//! The crate speaks the engine's framed wire protocol over TCP or TLS,
//! multiplexes concurrent calls over one session, and exposes query results
//! through a batch-fetching cursor with lazily streamed large objects.
//!
//! ## Features
//!
//! - **Async/await** - Built on Tokio; one reader and one writer task per session
//! - **Call multiplexing** - Replies are matched to callers by message key, in any order
//! - **Batch cursors** - Forward-only and scrollable navigation with background prefetch
//! - **LOB streaming** - CLOB/BLOB/XML content pulled chunk by chunk on demand
//! - **TLS** - rustls with system roots, a custom CA or client certificates
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fedquery_rs::{Config, Session};
//!
//! #[tokio::main]
//! async fn main() -> fedquery_rs::Result<()> {
//!     let config = Config::new("localhost", 31000).credentials("analyst", "secret");
//!     let session = Session::connect(config).await?;
//!     session.logon_with_config().await?;
//!
//!     let mut rs = session.query("SELECT id, name FROM parts").await?;
//!     while rs.next().await? {
//!         println!("{:?} {:?}", rs.get(0)?, rs.get(1)?);
//!     }
//!     rs.close().await?;
//!     session.close().await
//! }
//! ```
//!
//! ## Scrollable Cursors
//!
//! ```rust,no_run
//! use fedquery_rs::{CursorType, Session};
//!
//! # async fn example(session: &Session) -> fedquery_rs::Result<()> {
//! let mut request = session.new_request("SELECT * FROM orders");
//! request.cursor_type = CursorType::Scrollable;
//! request.fetch_size = 400;
//!
//! let mut rs = session.execute(request).await?;
//! rs.last().await?;
//! println!("{} rows", rs.get_row());
//! rs.absolute(290).await?;
//! rs.previous().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## TLS
//!
//! ```rust,no_run
//! use fedquery_rs::{Config, Session, TlsConfig};
//!
//! # async fn example() -> fedquery_rs::Result<()> {
//! let config = Config::new("engine.internal", 31443)
//!     .tls_config(TlsConfig::new().trust_anchors("/etc/fedquery/ca.pem"))
//!     .credentials("analyst", "secret");
//! let session = Session::connect(config).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod buffer;
pub mod codec;
pub mod config;
pub mod constants;
pub mod cursor;
pub mod error;
pub mod execution;
pub mod frame;
pub mod lob;
pub mod messages;
pub mod row;
pub mod transport;

// Re-export commonly used types
pub use auth::{Credentials, TokenNegotiator};
pub use codec::{LobKind, LobValue};
pub use config::{Config, HostInfo, TlsMode};
pub use cursor::{BatchCursor, BatchSource, CursorOptions, Position};
pub use error::{Error, ErrorKind, Result};
pub use execution::{Execution, ResultSet};
pub use lob::{ChunkSource, LobStreamer};
pub use messages::{ColumnInfo, CursorType, Message, RemoteException, RequestMessage, ResultsMessage};
pub use row::{LobReference, NamedValue, Row, Value};
pub use transport::{ClientIdentity, PendingCall, Session, TlsConfig};
