//! Registry mapping task ids to their live event queues.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::event_queue::EventQueue;

/// A queue already exists for this task id.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Queue already exists for this task")]
pub struct TaskQueueExists;

/// No queue exists for this task id.
#[derive(Debug, Clone, thiserror::Error)]
#[error("No queue exists for this task")]
pub struct NoTaskQueue;

/// Manages per-task event queue lifecycles.
///
/// A task has at most one primary queue at a time; any number of taps may
/// coexist. `tap` returns `None` once the task has finished and its queue
/// was removed.
#[async_trait]
pub trait QueueManager: Send + Sync {
    /// Registers a queue for a task id; fails if one is already present.
    async fn add(&self, task_id: &str, queue: EventQueue) -> Result<(), TaskQueueExists>;

    /// The active queue for a task id, if any.
    async fn get(&self, task_id: &str) -> Option<EventQueue>;

    /// A new tap on the task's queue, or `None` when the task is finished.
    async fn tap(&self, task_id: &str) -> Option<EventQueue>;

    /// Closes and removes the queue for a task id.
    async fn close(&self, task_id: &str) -> Result<(), NoTaskQueue>;

    /// Registers a fresh queue, or taps the existing one.
    async fn create_or_tap(&self, task_id: &str) -> EventQueue;
}

/// In-process [`QueueManager`] for single-instance deployments: every
/// interaction with a given task id must reach this process.
pub struct InMemoryQueueManager {
    queues: RwLock<HashMap<String, EventQueue>>,
}

impl InMemoryQueueManager {
    /// An empty manager.
    pub fn new() -> Self {
        InMemoryQueueManager {
            queues: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryQueueManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueManager for InMemoryQueueManager {
    async fn add(&self, task_id: &str, queue: EventQueue) -> Result<(), TaskQueueExists> {
        let mut queues = self.queues.write().await;
        if queues.contains_key(task_id) {
            return Err(TaskQueueExists);
        }
        queues.insert(task_id.to_string(), queue);
        Ok(())
    }

    async fn get(&self, task_id: &str) -> Option<EventQueue> {
        self.queues.read().await.get(task_id).cloned()
    }

    async fn tap(&self, task_id: &str) -> Option<EventQueue> {
        let queues = self.queues.read().await;
        match queues.get(task_id) {
            Some(queue) => Some(queue.tap().await),
            None => None,
        }
    }

    async fn close(&self, task_id: &str) -> Result<(), NoTaskQueue> {
        let mut queues = self.queues.write().await;
        match queues.remove(task_id) {
            Some(queue) => {
                queue.close().await;
                Ok(())
            }
            None => Err(NoTaskQueue),
        }
    }

    async fn create_or_tap(&self, task_id: &str) -> EventQueue {
        let mut queues = self.queues.write().await;
        if let Some(existing) = queues.get(task_id) {
            debug!(task_id, "Tapping existing queue");
            existing.tap().await
        } else {
            debug!(task_id, "Creating new queue");
            let queue = EventQueue::with_default_capacity();
            queues.insert(task_id.to_string(), queue.clone());
            queue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_get_and_duplicate() {
        let mgr = InMemoryQueueManager::new();
        mgr.add("t1", EventQueue::new(8)).await.unwrap();
        assert!(mgr.get("t1").await.is_some());
        assert!(mgr.add("t1", EventQueue::new(8)).await.is_err());
    }

    #[tokio::test]
    async fn tap_missing_task_is_none() {
        let mgr = InMemoryQueueManager::new();
        assert!(mgr.tap("nope").await.is_none());
    }

    #[tokio::test]
    async fn close_removes_and_closes() {
        let mgr = InMemoryQueueManager::new();
        let queue = EventQueue::new(8);
        mgr.add("t1", queue.clone()).await.unwrap();
        mgr.close("t1").await.unwrap();
        assert!(queue.is_closed());
        assert!(mgr.get("t1").await.is_none());
        assert!(mgr.close("t1").await.is_err());
    }

    #[tokio::test]
    async fn create_or_tap_creates_then_taps() {
        let mgr = InMemoryQueueManager::new();
        let primary = mgr.create_or_tap("t1").await;
        let tap = mgr.create_or_tap("t1").await;

        primary
            .enqueue_event(crate::types::StreamResponse::Message(
                crate::types::Message::agent("m1", "hi"),
            ))
            .await;
        assert!(tap.dequeue_event().await.is_ok());
    }
}
