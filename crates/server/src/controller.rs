//! Shared run state: served-count accounting, stop flag, session registry.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::info;

use workhive_protocol::Payload;
use workhive_protocol::constants::SERVED_LOG_INTERVAL;
use workhive_queue::WorkQueue;

/// Process-wide dispatch state shared by the acceptor, the producer pool and
/// every session.
pub struct Controller {
    queue: WorkQueue<Payload>,
    max_n_served: usize,
    n_packages_served: AtomicUsize,
    n_active_sessions: AtomicUsize,
    server_stopped: AtomicBool,
    shutdown: CancellationToken,
}

impl Controller {
    pub fn new(max_queue_size: usize, max_n_served: usize) -> Arc<Self> {
        Arc::new(Self {
            queue: WorkQueue::with_capacity(max_queue_size),
            max_n_served,
            n_packages_served: AtomicUsize::new(0),
            n_active_sessions: AtomicUsize::new(0),
            server_stopped: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        })
    }

    /// Token cancelled exactly once, when the server enters its stopped state.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn server_stopped(&self) -> bool {
        self.server_stopped.load(Ordering::SeqCst)
    }

    /// Trips the stop flag and cancels the acceptor. Idempotent.
    pub fn stop(&self) {
        if !self.server_stopped.swap(true, Ordering::SeqCst) {
            info!(
                served = self.n_packages_served(),
                "server stop requested"
            );
            self.shutdown.cancel();
        }
    }

    /// Offers a freshly fabricated payload to the queue.
    ///
    /// A full queue hands the payload back so the producer can re-offer the
    /// same item after its backoff.
    pub fn offer_payload(&self, payload: Payload) -> Result<(), Payload> {
        self.queue.push(payload)
    }

    /// Pops the next work item and accounts for it.
    ///
    /// Every successfully popped item is dispatched, including the one that
    /// crosses the served-count threshold; crossing the threshold trips the
    /// stop flag for the requests that follow, not for this one. Returns
    /// `None` only when the queue is empty.
    pub fn next_payload(&self) -> Option<Payload> {
        let item = self.queue.pop()?;

        let previous = self.n_packages_served.fetch_add(1, Ordering::SeqCst);
        if previous < self.max_n_served {
            let served = previous + 1;
            if served % SERVED_LOG_INTERVAL == 0 {
                info!(served, "served packages");
            }
        } else {
            self.stop();
        }

        Some(item)
    }

    pub fn n_packages_served(&self) -> usize {
        self.n_packages_served.load(Ordering::SeqCst)
    }

    pub fn n_active_sessions(&self) -> usize {
        self.n_active_sessions.load(Ordering::SeqCst)
    }

    fn sign_on(&self) {
        let active = self.n_active_sessions.fetch_add(1, Ordering::SeqCst) + 1;
        info!(active, "session signed on");
    }

    fn sign_off(&self) {
        let previous = self
            .n_active_sessions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match previous {
            Ok(p) => info!(active = p - 1, "session signed off"),
            Err(_) => panic!("session registry underflow: signed off more sessions than signed on"),
        }
    }
}

/// Shared handle a session uses to reach the controller: fetch the next work
/// item, observe the stop flag, register itself.
#[derive(Clone)]
pub struct SessionContext {
    controller: Arc<Controller>,
}

impl SessionContext {
    pub fn new(controller: Arc<Controller>) -> Self {
        Self { controller }
    }

    pub fn next_payload(&self) -> Option<Payload> {
        self.controller.next_payload()
    }

    pub fn server_stopped(&self) -> bool {
        self.controller.server_stopped()
    }

    /// Registers (`joined = true`) or unregisters a session.
    pub fn sign_on(&self, joined: bool) {
        if joined {
            self.controller.sign_on();
        } else {
            self.controller.sign_off();
        }
    }

    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        self.controller.shutdown_token()
    }
}
