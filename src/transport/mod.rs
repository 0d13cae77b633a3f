//! Transport layer
//!
//! Socket setup (plain or TLS), the [`Session`] that multiplexes calls over
//! one connection, and the handles callers wait on for replies.

mod pending;
mod session;
mod tcp;
pub mod tls;

pub use pending::{PendingCall, PendingReply, TypedReply};
pub use session::Session;
pub use tcp::SessionStream;
pub use tls::{connect_tls, ClientIdentity, TlsConfig};
