//! The dispatch server: acceptor loop, producer pool, lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use workhive_protocol::constants::{
    DEFAULT_FULL_QUEUE_SLEEP_MS, DEFAULT_HOST, DEFAULT_MAX_N_SERVED, DEFAULT_MAX_QUEUE_SIZE,
    DEFAULT_PORT,
};

use crate::controller::{Controller, SessionContext};
use crate::producer::{PayloadKind, ProducerPool};
use crate::{ServerError, session};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (name or IP).
    pub host: String,
    /// TCP port to listen on (0 = OS-assigned).
    pub port: u16,
    /// What the producer pool fabricates.
    pub payload: PayloadKind,
    /// Packages served before the server shuts down.
    pub max_n_served: usize,
    /// Fabrication threads.
    pub n_producer_threads: usize,
    /// Producer backoff while the queue is full.
    pub full_queue_sleep: Duration,
    /// Work queue capacity.
    pub max_queue_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            payload: PayloadKind::Sleep { seconds: 1.0 },
            max_n_served: DEFAULT_MAX_N_SERVED,
            n_producer_threads: 1,
            full_queue_sleep: Duration::from_millis(DEFAULT_FULL_QUEUE_SLEEP_MS),
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Copy)]
pub struct ServerReport {
    pub packages_served: usize,
    pub elapsed: Duration,
}

/// The work-dispatch server.
///
/// [`run`](Self::run) drives the whole lifecycle: bind, fabricate, accept,
/// dispatch, drain, join. It returns once the served-count threshold has
/// tripped and every session and producer has finished.
pub struct Server {
    config: ServerConfig,
    controller: Arc<Controller>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let controller = Controller::new(config.max_queue_size, config.max_n_served);
        Arc::new(Self {
            config,
            controller,
            local_addr: Mutex::new(None),
        })
    }

    /// Returns the bound listen address once [`run`](Self::run) has bound it.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().await
    }

    pub fn n_packages_served(&self) -> usize {
        self.controller.n_packages_served()
    }

    pub fn n_active_sessions(&self) -> usize {
        self.controller.n_active_sessions()
    }

    /// Trips the stop flag, as if the served-count threshold had been
    /// reached. Live sessions drain, then [`run`](Self::run) returns.
    pub fn shutdown(&self) {
        self.controller.stop();
    }

    pub async fn run(self: &Arc<Self>) -> Result<ServerReport, ServerError> {
        let start = Instant::now();

        let listener =
            TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let local_addr = listener.local_addr()?;
        *self.local_addr.lock().await = Some(local_addr);
        info!(
            %local_addr,
            format = ?workhive_protocol::WIRE_FORMAT,
            max_n_served = self.config.max_n_served,
            "dispatch server listening"
        );

        let producers = ProducerPool::spawn(
            &self.controller,
            self.config.payload,
            self.config.n_producer_threads,
            self.config.full_queue_sleep,
        );

        let shutdown = self.controller.shutdown_token();
        let mut sessions: Vec<JoinHandle<()>> = Vec::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("acceptor shutting down");
                    break;
                }

                result = listener.accept() => match result {
                    Ok((stream, peer_addr)) => {
                        debug!(%peer_addr, "connection accepted");
                        let ctx = SessionContext::new(Arc::clone(&self.controller));
                        sessions.push(tokio::spawn(session::run_session(stream, peer_addr, ctx)));
                    }
                    Err(e) => {
                        if self.controller.server_stopped() {
                            debug!("accept interrupted by shutdown: {e}");
                            break;
                        }
                        warn!("accept error: {e}");
                    }
                },
            }
        }
        drop(listener);

        // Drain: live sessions exit after their next completed write or on
        // the cancelled read.
        for session in sessions {
            if session.await.is_err() {
                warn!("session task panicked");
            }
        }

        // Producers observe the stop flag within one backoff period; join
        // them off the runtime.
        if tokio::task::spawn_blocking(move || producers.join())
            .await
            .is_err()
        {
            warn!("producer join task panicked");
        }

        let elapsed = start.elapsed();
        let packages_served = self.controller.n_packages_served();
        info!(
            packages_served,
            elapsed_ms = elapsed.as_millis() as u64,
            "server finished"
        );
        Ok(ServerReport {
            packages_served,
            elapsed,
        })
    }
}
