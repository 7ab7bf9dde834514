//! In-process priority queue
//!
//! Highest priority first, FIFO within a priority.

use async_trait::async_trait;
use meelo_common::Result;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::{debug, warn};

use super::{Delivery, TaskSource};
use crate::matching::MatchTask;

#[derive(Debug)]
struct Queued {
    priority: u8,
    seq: u64,
    task: MatchTask,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Queued {}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
struct QueueState {
    heap: BinaryHeap<Queued>,
    next_seq: u64,
    /// Delivered, not handed to the coordinator yet
    waiting: HashSet<u64>,
    unacked: HashSet<u64>,
    closed: bool,
}

#[derive(Debug, Default)]
pub struct MemoryQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a task; rejects out-of-range priorities
    pub fn push(&self, task: MatchTask) -> Result<()> {
        task.validate()?;
        {
            let mut state = self.state();
            let seq = state.next_seq;
            state.next_seq += 1;
            debug!(
                entity_type = %task.entity_type,
                entity_id = task.entity_id,
                priority = task.priority,
                "Task queued"
            );
            state.heap.push(Queued {
                priority: task.priority,
                seq,
                task,
            });
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Stop handing out tasks once the queue is drained
    pub fn close(&self) {
        self.state().closed = true;
        self.notify.notify_one();
    }

    /// Deliveries handed out but not acknowledged yet
    pub fn unacked_count(&self) -> usize {
        self.state().unacked.len()
    }
}

#[async_trait]
impl TaskSource for MemoryQueue {
    async fn next(&self) -> Option<Delivery> {
        loop {
            {
                let mut state = self.state();
                if let Some(queued) = state.heap.pop() {
                    state.waiting.insert(queued.seq);
                    state.unacked.insert(queued.seq);
                    return Some(Delivery {
                        tag: queued.seq,
                        task: queued.task,
                    });
                }
                if state.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    fn start(&self, delivery: &Delivery) {
        self.state().waiting.remove(&delivery.tag);
    }

    async fn ack(&self, delivery: &Delivery) {
        let mut state = self.state();
        state.waiting.remove(&delivery.tag);
        if !state.unacked.remove(&delivery.tag) {
            warn!(tag = delivery.tag, "Acknowledging unknown delivery");
        }
    }

    fn pending_count(&self) -> usize {
        let state = self.state();
        state.heap.len() + state.waiting.len()
    }
}
