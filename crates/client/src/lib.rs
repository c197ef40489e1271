//! Worker client for the workhive dispatch service.
//!
//! The client opens the conversation with `get_data` and then alternates
//! strictly with the server: every `compute` it receives is processed on a
//! blocking thread and returned as `result`; every `no_data` triggers a
//! short random backoff before the next request. A read is kept outstanding
//! at all times so ping and close frames are answered promptly.

mod pumps;
mod worker;

pub use worker::run;

use tokio_tungstenite::tungstenite;

use workhive_protocol::constants::{DEFAULT_HOST, DEFAULT_PORT};
use workhive_protocol::{CodecError, PayloadCommand};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// IP or name of the host running the server.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Informational id distinguishing this client in the output.
    pub client_id: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            client_id: 0,
        }
    }
}

/// Summary of a finished client run.
#[derive(Debug, Clone, Copy)]
pub struct ClientReport {
    /// Number of `compute` payloads processed and returned.
    pub items_processed: usize,
}

/// Errors fatal to the client.
///
/// Everything except an orderly close (which ends the run normally) is
/// fatal: the worker exits rather than retrying.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("unexpected command {0} from server")]
    UnexpectedCommand(PayloadCommand),

    #[error("background task failed")]
    TaskFailed,
}
