//! Workhive entry point: dispatch server by default, worker with `--client`.

mod cli;

use std::num::NonZeroUsize;
use std::time::Duration;

use anyhow::bail;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use workhive_server::{PayloadKind, Server, ServerConfig};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();

    let n_context_threads = resolve_threads(cli.n_context_threads);
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(n_context_threads)
        .enable_all()
        .build()?;

    if cli.client {
        run_client(&rt, &cli)
    } else {
        run_server(&rt, &cli)
    }
}

fn run_client(rt: &tokio::runtime::Runtime, cli: &cli::Cli) -> anyhow::Result<()> {
    tracing::info!(client_id = cli.client_id, "client is starting up");

    let config = workhive_client::ClientConfig {
        host: cli.host.clone(),
        port: cli.port,
        client_id: cli.client_id,
    };
    let report = rt.block_on(workhive_client::run(&config))?;

    tracing::info!(
        client_id = cli.client_id,
        items_processed = report.items_processed,
        "client has terminated"
    );
    Ok(())
}

fn run_server(rt: &tokio::runtime::Runtime, cli: &cli::Cli) -> anyhow::Result<()> {
    let payload = match cli.payload_type {
        cli::PayloadTypeArg::Container => PayloadKind::Container {
            size: cli.container_size,
        },
        cli::PayloadTypeArg::Sleep => PayloadKind::Sleep {
            seconds: cli.payload_sleep_time,
        },
        cli::PayloadTypeArg::Command => {
            bail!("payload type \"command\" is not valid for the server")
        }
    };

    let config = ServerConfig {
        host: cli.host.clone(),
        port: cli.port,
        payload,
        max_n_served: cli.max_n_served,
        n_producer_threads: resolve_threads(cli.n_producer_threads),
        full_queue_sleep: Duration::from_millis(cli.full_queue_sleep_ms),
        max_queue_size: cli.max_queue_size,
    };

    let server = Server::new(config);
    let report = rt.block_on(async move { server.run().await })?;

    let elapsed_ms = report.elapsed.as_millis() as u64;
    tracing::info!(elapsed_ms, "server run complete");
    tracing::info!(
        "this amounts to {:.1} packages/s",
        report.packages_served as f64 / report.elapsed.as_secs_f64().max(f64::EPSILON)
    );
    Ok(())
}

/// Resolves a thread-count flag: 0 means hardware concurrency.
fn resolve_threads(requested: usize) -> usize {
    if requested > 0 {
        requested
    } else {
        std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_thread_counts_are_kept() {
        assert_eq!(resolve_threads(3), 3);
    }

    #[test]
    fn zero_resolves_to_hardware_concurrency() {
        assert!(resolve_threads(0) >= 1);
    }
}
