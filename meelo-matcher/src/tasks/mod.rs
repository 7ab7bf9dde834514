//! Inbound match requests

mod memory_queue;
mod runner;

pub use memory_queue::MemoryQueue;
pub use runner::TaskRunner;

use async_trait::async_trait;

use crate::matching::MatchTask;

/// A task handed out by a [`TaskSource`], to be acknowledged once handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub tag: u64,
    pub task: MatchTask,
}

#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Wait for the next task; `None` once the source is closed and drained
    async fn next(&self) -> Option<Delivery>;

    /// The delivery was handed to the coordinator and stops counting as pending
    fn start(&self, delivery: &Delivery);

    /// Acknowledge a delivery, whatever the match outcome
    async fn ack(&self, delivery: &Delivery);

    /// Tasks not started yet: queued ones plus deliveries held by a consumer
    fn pending_count(&self) -> usize;
}
