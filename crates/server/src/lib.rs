//! WebSocket work-dispatch server.
//!
//! Producer threads fabricate payloads into a bounded queue; the acceptor
//! spawns one session task per client connection; each session runs a
//! strictly serial request/response loop handing queued payloads to workers
//! until the served-count threshold trips and the server drains.

mod controller;
mod producer;
mod server;
mod session;

pub use controller::{Controller, SessionContext};
pub use producer::PayloadKind;
pub use server::{Server, ServerConfig, ServerReport};
pub use session::SessionError;

/// Errors that abort the server run.
///
/// Per-session failures are logged and handled inside the session; only
/// process-level faults surface here.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
