//! Payload fabrication threads.
//!
//! Fabrication is CPU-bound and runs on dedicated OS threads outside the
//! async runtime. Each thread keeps at most one item on hand: when the queue
//! is full the same item is re-offered after a short sleep, so queue
//! pressure never turns into allocation churn.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use tracing::debug;

use workhive_protocol::Payload;

use crate::controller::Controller;

/// What the producer pool fabricates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PayloadKind {
    /// Containers of `size` Gaussian samples, sorted by the worker.
    Container { size: usize },
    /// Timed sleeps of `seconds` each.
    Sleep { seconds: f64 },
}

/// Handle to the running fabrication threads.
pub(crate) struct ProducerPool {
    handles: Vec<JoinHandle<()>>,
}

impl ProducerPool {
    pub(crate) fn spawn(
        controller: &Arc<Controller>,
        kind: PayloadKind,
        n_threads: usize,
        full_queue_sleep: Duration,
    ) -> Self {
        let handles = (0..n_threads)
            .map(|i| {
                let controller = Arc::clone(controller);
                thread::Builder::new()
                    .name(format!("producer-{i}"))
                    .spawn(move || produce(&controller, kind, full_queue_sleep))
                    .expect("failed to spawn producer thread")
            })
            .collect();
        Self { handles }
    }

    /// Blocks until every producer thread has exited.
    pub(crate) fn join(self) {
        for handle in self.handles {
            if handle.join().is_err() {
                tracing::error!("producer thread panicked");
            }
        }
    }
}

fn produce(controller: &Controller, kind: PayloadKind, full_queue_sleep: Duration) {
    // One non-deterministically seeded source per thread.
    let mut rng = StdRng::from_entropy();
    let normal = Normal::new(0.0, 1.0).expect("standard normal parameters");

    let mut pending: Option<Payload> = None;
    debug!(?kind, "producer started");

    while !controller.server_stopped() {
        let item = match pending.take() {
            Some(item) => item,
            None => fabricate(kind, &normal, &mut rng),
        };

        if let Err(item) = controller.offer_payload(item) {
            if controller.server_stopped() {
                break;
            }
            // Retain the item across the backoff; fabricate nothing new.
            pending = Some(item);
            thread::sleep(full_queue_sleep);
        }
    }

    debug!("producer stopped");
}

fn fabricate(kind: PayloadKind, normal: &Normal<f64>, rng: &mut StdRng) -> Payload {
    match kind {
        PayloadKind::Container { size } => Payload::RandomContainer {
            data: normal.sample_iter(rng).take(size).collect(),
        },
        PayloadKind::Sleep { seconds } => Payload::Sleep { duration: seconds },
    }
}
