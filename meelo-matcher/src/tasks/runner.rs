//! Task runner
//!
//! A fetch loop pulls deliveries from a [`TaskSource`] with a bounded
//! prefetch; a single consumer hands them to the coordinator in delivery
//! order and acknowledges each one once its match returned. Priority applies
//! when a delivery is taken from the source: a task pushed after the
//! prefetch window filled up runs after the deliveries already held.

use std::sync::Arc;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use super::{Delivery, TaskSource};
use crate::matching::MatchCoordinator;

/// Upper bound on deliveries held ahead of the running match
const MAX_PREFETCH: usize = 64;

pub struct TaskRunner {
    source: Arc<dyn TaskSource>,
    coordinator: Arc<MatchCoordinator>,
    prefetch: usize,
}

impl TaskRunner {
    pub fn new(
        source: Arc<dyn TaskSource>,
        coordinator: Arc<MatchCoordinator>,
        prefetch: usize,
    ) -> Self {
        Self {
            source,
            coordinator,
            prefetch: prefetch.clamp(1, MAX_PREFETCH),
        }
    }

    /// Consume the source until it is closed and drained
    pub async fn run(self) {
        info!(prefetch = self.prefetch, "Task runner started");
        let (tx, mut rx) = mpsc::unbounded_channel::<(Delivery, OwnedSemaphorePermit)>();
        let fetcher = tokio::spawn(fetch(
            Arc::clone(&self.source),
            Arc::new(Semaphore::new(self.prefetch)),
            tx,
        ));

        while let Some((delivery, permit)) = rx.recv().await {
            self.source.start(&delivery);
            // Failures are already logged by the coordinator
            let _ = self.coordinator.match_entity(&delivery.task).await;
            self.source.ack(&delivery).await;
            drop(permit);
        }

        if let Err(e) = fetcher.await {
            warn!(error = %e, "Task fetch loop ended abnormally");
        }
        info!("Task runner stopped");
    }
}

/// Each delivery holds a permit until acknowledged
async fn fetch(
    source: Arc<dyn TaskSource>,
    permits: Arc<Semaphore>,
    tx: mpsc::UnboundedSender<(Delivery, OwnedSemaphorePermit)>,
) {
    loop {
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };
        let Some(delivery) = source.next().await else {
            break;
        };
        debug!(tag = delivery.tag, entity_id = delivery.task.entity_id, "Task received");
        if tx.send((delivery, permit)).is_err() {
            break;
        }
    }
}
