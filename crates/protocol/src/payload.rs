//! Work item payloads.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A unit of work dispatched to a client worker.
///
/// Processing happens on the worker and blocks the calling thread; run it on
/// a blocking-capable thread, never directly on an async executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    /// A container of floating-point values; processing sorts them ascending.
    RandomContainer { data: Vec<f64> },
    /// A timed sleep; processing blocks for `duration` seconds.
    Sleep { duration: f64 },
}

impl Payload {
    /// Performs the work this payload describes.
    ///
    /// Idempotent: sorting sorted data or sleeping again yields a payload for
    /// which [`is_processed`](Self::is_processed) still holds.
    pub fn process(&mut self) {
        match self {
            Payload::RandomContainer { data } => data.sort_by(f64::total_cmp),
            Payload::Sleep { duration } => {
                std::thread::sleep(Duration::from_secs_f64(duration.max(0.0)));
            }
        }
    }

    /// Whether the work has been carried out.
    pub fn is_processed(&self) -> bool {
        match self {
            Payload::RandomContainer { data } => data.windows(2).all(|w| w[0] <= w[1]),
            Payload::Sleep { .. } => true,
        }
    }
}
