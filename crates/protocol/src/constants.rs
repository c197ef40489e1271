//! Shared protocol and configuration constants.

/// Default server bind address and client target.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 10000;

/// Default number of elements in a random container payload.
pub const DEFAULT_CONTAINER_SIZE: usize = 1000;

/// Default sleep payload duration in seconds.
pub const DEFAULT_PAYLOAD_SLEEP_TIME: f64 = 1.0;

/// Default number of packages served before the server shuts down.
pub const DEFAULT_MAX_N_SERVED: usize = 10_000;

/// Default producer backoff when the work queue is full, in milliseconds.
pub const DEFAULT_FULL_QUEUE_SLEEP_MS: u64 = 5;

/// Default work queue capacity.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 5000;

/// Lower bound of the client backoff after a `no_data` reply, in milliseconds.
pub const CLIENT_BACKOFF_MIN_MS: u64 = 10;

/// Upper bound (inclusive) of the client backoff, in milliseconds.
pub const CLIENT_BACKOFF_MAX_MS: u64 = 50;

/// The server logs the served count every this many packages.
pub const SERVED_LOG_INTERVAL: usize = 10;

/// Maximum WebSocket message size in bytes (16 MB).
///
/// A million-element container is ~20 MB as XML; anything beyond this limit
/// indicates a misbehaving peer rather than legitimate work.
pub const WS_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// `User-Agent` header value sent by the client during the handshake.
pub fn client_agent() -> String {
    format!("workhive/{} async_websocket_client", env!("CARGO_PKG_VERSION"))
}

/// `Server` header value sent by a server session during the handshake.
pub fn server_agent() -> String {
    format!(
        "workhive/{} async_websocket_server_session",
        env!("CARGO_PKG_VERSION")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_strings_identify_the_roles() {
        assert!(client_agent().ends_with("async_websocket_client"));
        assert!(server_agent().ends_with("async_websocket_server_session"));
    }

    #[test]
    fn backoff_window_is_ordered() {
        assert!(CLIENT_BACKOFF_MIN_MS < CLIENT_BACKOFF_MAX_MS);
    }
}
