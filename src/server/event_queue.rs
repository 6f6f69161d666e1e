//! Event queue — the bounded, closable FIFO between an agent producer and
//! its consumers.
//!
//! A queue has exactly one primary read cursor. Resubscribers get their own
//! cursor by [`tap`](EventQueue::tap)ping the queue: every future enqueue on
//! the parent is fanned out to each tap, and taps close when the parent
//! closes. `enqueue` applies backpressure when the queue is full.
//!
//! Dequeuing distinguishes "open but momentarily empty" from "drained and
//! closed" via [`DequeueError`]; only the latter terminates a consumer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, Mutex, Notify, RwLock};
use tracing::{debug, warn};

use crate::error::A2AError;
use crate::types::StreamResponse;

/// Default per-queue capacity.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 1024;

/// Why a dequeue produced no event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DequeueError {
    /// The queue is open but has nothing buffered right now. A transient
    /// outcome; the consumer should retry.
    #[error("queue is empty")]
    Empty,

    /// The queue is closed and fully drained. The consumer is done.
    #[error("queue is closed")]
    Closed,
}

struct QueueInner {
    tx: mpsc::Sender<StreamResponse>,
    rx: Mutex<mpsc::Receiver<StreamResponse>>,
    children: RwLock<Vec<EventQueue>>,
    closed: AtomicBool,
    close_notify: Notify,
    /// Exception recorded by the producer's completion callback; surfaced by
    /// the consumer in place of the next event.
    exception: Mutex<Option<A2AError>>,
    capacity: usize,
}

/// Bounded FIFO connecting an agent execution to the handler consuming its
/// events.
///
/// Cloning is cheap and shares the queue: clones see the same buffer,
/// cursor, and closed flag.
#[derive(Clone)]
pub struct EventQueue {
    inner: Arc<QueueInner>,
}

impl std::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("closed", &self.is_closed())
            .field("capacity", &self.inner.capacity)
            .finish()
    }
}

impl EventQueue {
    /// Queue with the given capacity.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0");
        let (tx, rx) = mpsc::channel(capacity);
        EventQueue {
            inner: Arc::new(QueueInner {
                tx,
                rx: Mutex::new(rx),
                children: RwLock::new(Vec::new()),
                closed: AtomicBool::new(false),
                close_notify: Notify::new(),
                exception: Mutex::new(None),
                capacity,
            }),
        }
    }

    /// Queue with the default capacity.
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_MAX_QUEUE_SIZE)
    }

    /// Enqueues an event, blocking while the queue is full.
    ///
    /// A closed queue drops the event with a warning; enqueue never fails.
    /// The event is fanned out to every tap.
    pub async fn enqueue_event(&self, event: StreamResponse) {
        if self.is_closed() {
            warn!("Queue is closed. Event will not be enqueued.");
            return;
        }

        debug!(task_id = ?event.task_id(), "Enqueuing event");
        if self.inner.tx.send(event.clone()).await.is_err() {
            // Receiver half lives in inner, so this only happens during
            // teardown.
            warn!("Queue receiver dropped; event discarded.");
            return;
        }

        let children = self.inner.children.read().await;
        for child in children.iter() {
            Box::pin(child.enqueue_event(event.clone())).await;
        }
    }

    /// Waits for the next event.
    ///
    /// Returns [`DequeueError::Closed`] once the queue is closed *and* every
    /// buffered event has been handed out.
    pub async fn dequeue_event(&self) -> Result<StreamResponse, DequeueError> {
        let mut rx = self.inner.rx.lock().await;
        loop {
            // Register for the close notification before checking the flag,
            // so a close landing between the check and the wait still wakes
            // this waiter.
            let notified = self.inner.close_notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match rx.try_recv() {
                Ok(event) => return Ok(event),
                Err(TryRecvError::Disconnected) => return Err(DequeueError::Closed),
                Err(TryRecvError::Empty) => {
                    if self.is_closed() {
                        return Err(DequeueError::Closed);
                    }
                }
            }

            tokio::select! {
                maybe = rx.recv() => match maybe {
                    Some(event) => return Ok(event),
                    None => return Err(DequeueError::Closed),
                },
                _ = &mut notified => {
                    // Loop back: drain anything buffered before reporting
                    // closure.
                }
            }
        }
    }

    /// Non-waiting dequeue: an event, [`DequeueError::Empty`], or
    /// [`DequeueError::Closed`].
    pub async fn try_dequeue_event(&self) -> Result<StreamResponse, DequeueError> {
        let mut rx = self.inner.rx.lock().await;
        match rx.try_recv() {
            Ok(event) => Ok(event),
            Err(TryRecvError::Disconnected) => Err(DequeueError::Closed),
            Err(TryRecvError::Empty) => {
                if self.is_closed() {
                    Err(DequeueError::Closed)
                } else {
                    Err(DequeueError::Empty)
                }
            }
        }
    }

    /// Creates a child queue that receives every event enqueued on this
    /// queue from now on.
    ///
    /// A tap of a closed queue is born closed.
    pub async fn tap(&self) -> EventQueue {
        debug!("Tapping EventQueue to create a child queue.");
        let child = EventQueue::new(self.inner.capacity);
        if self.is_closed() {
            child.close().await;
            return child;
        }
        self.inner.children.write().await.push(child.clone());
        child
    }

    /// Closes the queue and all taps. Idempotent.
    ///
    /// Buffered events stay dequeueable; waiters observe
    /// [`DequeueError::Closed`] after the drain.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("Closing EventQueue.");
        self.inner.close_notify.notify_waiters();

        let children = self.inner.children.read().await;
        for child in children.iter() {
            Box::pin(child.close()).await;
        }
    }

    /// Whether the queue has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Records a producer-side failure to be surfaced by the consumer in
    /// place of the next event.
    pub async fn set_exception(&self, error: A2AError) {
        let mut exc = self.inner.exception.lock().await;
        *exc = Some(error);
        // Wake a waiting consumer so it notices promptly.
        self.inner.close_notify.notify_waiters();
    }

    /// Takes the recorded producer exception, if any.
    pub async fn take_exception(&self) -> Option<A2AError> {
        self.inner.exception.lock().await.take()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TaskState, TaskStatus, TaskStatusUpdateEvent};

    fn status_event(state: TaskState) -> StreamResponse {
        StreamResponse::StatusUpdate(TaskStatusUpdateEvent {
            task_id: "t1".to_string(),
            context_id: "c1".to_string(),
            kind: "status-update".to_string(),
            status: TaskStatus::new(state),
            r#final: false,
            metadata: None,
        })
    }

    #[tokio::test]
    async fn enqueue_then_dequeue() {
        let queue = EventQueue::new(8);
        queue.enqueue_event(status_event(TaskState::Working)).await;
        let event = queue.dequeue_event().await.unwrap();
        assert_eq!(event.task_id(), Some("t1"));
    }

    #[tokio::test]
    async fn dequeue_drains_before_reporting_closed() {
        let queue = EventQueue::new(8);
        queue.enqueue_event(status_event(TaskState::Working)).await;
        queue.enqueue_event(status_event(TaskState::Completed)).await;
        queue.close().await;

        assert!(queue.dequeue_event().await.is_ok());
        assert!(queue.dequeue_event().await.is_ok());
        assert!(matches!(queue.dequeue_event().await, Err(DequeueError::Closed)));
    }

    #[tokio::test]
    async fn try_dequeue_distinguishes_empty_from_closed() {
        let queue = EventQueue::new(8);
        assert!(matches!(queue.try_dequeue_event().await, Err(DequeueError::Empty)));
        queue.close().await;
        assert!(matches!(queue.try_dequeue_event().await, Err(DequeueError::Closed)));
    }

    #[tokio::test]
    async fn dequeue_wakes_on_close() {
        let queue = EventQueue::new(8);
        let waiter = queue.clone();
        let handle = tokio::spawn(async move { waiter.dequeue_event().await });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        queue.close().await;
        assert!(matches!(handle.await.unwrap(), Err(DequeueError::Closed)));
    }

    #[tokio::test]
    async fn taps_receive_future_events() {
        let parent = EventQueue::new(8);
        let tap = parent.tap().await;
        parent.enqueue_event(status_event(TaskState::Working)).await;

        assert!(tap.dequeue_event().await.is_ok());
        assert!(parent.dequeue_event().await.is_ok());
    }

    #[tokio::test]
    async fn closing_parent_closes_taps() {
        let parent = EventQueue::new(8);
        let tap = parent.tap().await;
        parent.close().await;
        assert!(parent.is_closed());
        assert!(tap.is_closed());
    }

    #[tokio::test]
    async fn tap_of_closed_queue_is_closed() {
        let parent = EventQueue::new(8);
        parent.close().await;
        let tap = parent.tap().await;
        assert!(tap.is_closed());
    }

    #[tokio::test]
    async fn closed_queue_drops_enqueues() {
        let queue = EventQueue::new(8);
        queue.close().await;
        queue.enqueue_event(status_event(TaskState::Working)).await;
        assert!(matches!(queue.try_dequeue_event().await, Err(DequeueError::Closed)));
    }

    #[tokio::test]
    async fn exception_is_stored_and_taken_once() {
        let queue = EventQueue::new(8);
        queue
            .set_exception(A2AError::internal_error("agent crashed"))
            .await;
        assert!(queue.take_exception().await.is_some());
        assert!(queue.take_exception().await.is_none());
    }
}
