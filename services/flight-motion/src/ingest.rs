//! Observation queue between producers and the tick loop
//!
//! Producers (network adapters, the replay reader) run on their own threads or
//! tasks and push observations into a bounded queue; only the tick loop pulls
//! from it and mutates the engine. A full queue drops the observation instead
//! of blocking the producer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use tracing::warn;

use crate::observation::Observation;

/// Producer side; cheap to clone, one per adapter
#[derive(Debug, Clone)]
pub struct ObservationSender {
    tx: Sender<Observation>,
    dropped: Arc<AtomicU64>,
}

/// Consumer side, owned by the tick loop
#[derive(Debug)]
pub struct ObservationReceiver {
    rx: Receiver<Observation>,
    dropped: Arc<AtomicU64>,
}

/// Create a bounded observation queue
pub fn ingest_channel(capacity: usize) -> (ObservationSender, ObservationReceiver) {
    let (tx, rx) = bounded(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    (
        ObservationSender {
            tx,
            dropped: Arc::clone(&dropped),
        },
        ObservationReceiver { rx, dropped },
    )
}

impl ObservationSender {
    /// Queue an observation without blocking.
    ///
    /// Returns `false` if the queue was full or the receiver is gone.
    pub fn send(&self, observation: Observation) -> bool {
        match self.tx.try_send(observation) {
            Ok(()) => true,
            Err(TrySendError::Full(observation)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                // Log the first drop and then every thousandth
                if dropped % 1000 == 1 {
                    warn!(
                        aircraft = %observation.aircraft_id,
                        dropped,
                        "Observation queue full, dropping"
                    );
                }
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

impl ObservationReceiver {
    /// Next queued observation, if any
    pub fn try_recv(&self) -> Option<Observation> {
        match self.rx.try_recv() {
            Ok(observation) => Some(observation),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Observations dropped because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
