//! Command-line interface definitions and parsing.

use clap::{Parser, ValueEnum};

use workhive_protocol::constants::{
    DEFAULT_CONTAINER_SIZE, DEFAULT_FULL_QUEUE_SLEEP_MS, DEFAULT_HOST, DEFAULT_MAX_N_SERVED,
    DEFAULT_MAX_QUEUE_SIZE, DEFAULT_PAYLOAD_SLEEP_TIME, DEFAULT_PORT,
};

/// Distributed work dispatch over WebSocket.
///
/// Runs the dispatch server by default, or a worker client with `--client`.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as a worker client instead of the server
    #[arg(long)]
    pub client: bool,

    /// The type of payload fabricated by the server
    #[arg(short = 'p', long, value_enum, default_value = "container")]
    pub payload_type: PayloadTypeArg,

    /// Elements per random container payload
    #[arg(short = 's', long, default_value_t = DEFAULT_CONTAINER_SIZE)]
    pub container_size: usize,

    /// Seconds each sleep payload blocks its worker
    #[arg(short = 't', long, default_value_t = DEFAULT_PAYLOAD_SLEEP_TIME)]
    pub payload_sleep_time: f64,

    /// Payload producer threads; 0 uses the hardware concurrency
    #[arg(short = 'n', long, default_value_t = 0)]
    pub n_producer_threads: usize,

    /// Runtime worker threads; 0 uses the hardware concurrency
    #[arg(short = 'l', long, default_value_t = 0)]
    pub n_context_threads: usize,

    /// Total number of packages served before the server shuts down
    #[arg(short = 'm', long, default_value_t = DEFAULT_MAX_N_SERVED)]
    pub max_n_served: usize,

    /// Milliseconds a producer pauses when the queue is full
    #[arg(short = 'f', long, default_value_t = DEFAULT_FULL_QUEUE_SLEEP_MS)]
    pub full_queue_sleep_ms: u64,

    /// Capacity of the payload queue
    #[arg(short = 'q', long, default_value_t = DEFAULT_MAX_QUEUE_SIZE)]
    pub max_queue_size: usize,

    /// Port the server listens on or the client connects to
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// IP or name of the host running the server
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Informational id distinguishing this client in the output
    #[arg(long, default_value_t = 0)]
    pub client_id: usize,
}

/// Fabrication modes selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PayloadTypeArg {
    /// Containers of random numbers, sorted by the worker
    Container,
    /// Timed sleeps
    Sleep,
    /// Bare command traffic; rejected by the server
    Command,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let cli = Cli::parse_from(["workhive"]);
        assert!(!cli.client);
        assert_eq!(cli.payload_type, PayloadTypeArg::Container);
        assert_eq!(cli.container_size, 1000);
        assert_eq!(cli.payload_sleep_time, 1.0);
        assert_eq!(cli.n_producer_threads, 0);
        assert_eq!(cli.n_context_threads, 0);
        assert_eq!(cli.max_n_served, 10_000);
        assert_eq!(cli.full_queue_sleep_ms, 5);
        assert_eq!(cli.max_queue_size, 5000);
        assert_eq!(cli.port, 10000);
        assert_eq!(cli.host, "127.0.0.1");
        assert_eq!(cli.client_id, 0);
    }

    #[test]
    fn short_flags_parse() {
        let cli = Cli::parse_from([
            "workhive", "-p", "sleep", "-s", "16", "-t", "0.05", "-n", "4", "-l", "2", "-m", "20",
            "-f", "10", "-q", "2",
        ]);
        assert_eq!(cli.payload_type, PayloadTypeArg::Sleep);
        assert_eq!(cli.container_size, 16);
        assert_eq!(cli.payload_sleep_time, 0.05);
        assert_eq!(cli.n_producer_threads, 4);
        assert_eq!(cli.n_context_threads, 2);
        assert_eq!(cli.max_n_served, 20);
        assert_eq!(cli.full_queue_sleep_ms, 10);
        assert_eq!(cli.max_queue_size, 2);
    }

    #[test]
    fn client_mode_flags_parse() {
        let cli = Cli::parse_from([
            "workhive",
            "--client",
            "--host",
            "10.0.0.5",
            "--port",
            "10001",
            "--client-id",
            "7",
        ]);
        assert!(cli.client);
        assert_eq!(cli.host, "10.0.0.5");
        assert_eq!(cli.port, 10001);
        assert_eq!(cli.client_id, 7);
    }
}
