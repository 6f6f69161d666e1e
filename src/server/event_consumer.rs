//! Consumer for the read side of an [`EventQueue`] within one handler call.

use std::time::Duration;

use futures::Stream;
use tracing::{debug, warn};

use crate::error::{A2AError, A2AResult};
use crate::types::StreamResponse;

use super::event_queue::{DequeueError, EventQueue};

/// Reads events from an agent's queue until the stream finishes.
///
/// The consumer polls with a short timeout so that a producer exception
/// recorded on the queue is noticed even while no events arrive. A
/// "transient empty" outcome never terminates consumption; only a drained,
/// closed queue does.
pub struct EventConsumer {
    queue: EventQueue,
    timeout: Duration,
}

impl EventConsumer {
    /// Consumer over the given queue with the default ~500 ms poll interval.
    pub fn new(queue: EventQueue) -> Self {
        debug!("EventConsumer initialized");
        EventConsumer {
            queue,
            timeout: Duration::from_millis(500),
        }
    }

    /// Overrides the poll timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The queue this consumer reads.
    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    /// Waits up to the poll timeout for a single event.
    ///
    /// # Errors
    ///
    /// `InternalError` when nothing arrives in time or the queue closed
    /// without producing anything; a recorded producer exception is
    /// propagated as-is.
    pub async fn consume_one(&self) -> A2AResult<StreamResponse> {
        debug!("Attempting to consume one event.");
        if let Some(exc) = self.queue.take_exception().await {
            return Err(exc);
        }

        match tokio::time::timeout(self.timeout, self.queue.dequeue_event()).await {
            Ok(Ok(event)) => Ok(event),
            Ok(Err(DequeueError::Closed)) => Err(A2AError::internal_error(
                "Event queue closed before producing a response",
            )),
            Ok(Err(DequeueError::Empty)) | Err(_) => Err(A2AError::internal_error(
                "Agent did not return any response",
            )),
        }
    }

    /// Consumes events until a final event arrives, the queue closes, or the
    /// producer records an exception.
    ///
    /// The returned stream is finite and single-pass. A final event (terminal
    /// or interruptible snapshot, final status update, or standalone message)
    /// closes the queue after being yielded.
    pub fn consume_all(self) -> impl Stream<Item = A2AResult<StreamResponse>> {
        debug!("Starting to consume all events from the queue.");
        let EventConsumer { queue, timeout } = self;

        async_stream::stream! {
            loop {
                if let Some(exc) = queue.take_exception().await {
                    warn!(error = %exc, "Agent exception surfaced to consumer");
                    yield Err(exc);
                    break;
                }

                match tokio::time::timeout(timeout, queue.dequeue_event()).await {
                    Ok(Ok(event)) => {
                        let is_final = event.is_final();
                        if is_final {
                            debug!("Final event reached; stopping consumption.");
                            queue.close().await;
                        }
                        yield Ok(event);
                        if is_final {
                            break;
                        }
                    }
                    Ok(Err(DequeueError::Closed)) => break,
                    Ok(Err(DequeueError::Empty)) | Err(_) => {
                        // Transient empty or poll timeout; retry so the
                        // exception check above runs.
                        continue;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, TaskState, TaskStatus, TaskStatusUpdateEvent};
    use futures::StreamExt;

    fn status_event(state: TaskState, is_final: bool) -> StreamResponse {
        StreamResponse::StatusUpdate(TaskStatusUpdateEvent {
            task_id: "t1".to_string(),
            context_id: "c1".to_string(),
            kind: "status-update".to_string(),
            status: TaskStatus::new(state),
            r#final: is_final,
            metadata: None,
        })
    }

    #[tokio::test]
    async fn consume_one_returns_buffered_event() {
        let queue = EventQueue::new(8);
        queue.enqueue_event(status_event(TaskState::Working, false)).await;
        let consumer = EventConsumer::new(queue);
        assert!(consumer.consume_one().await.is_ok());
    }

    #[tokio::test]
    async fn consume_one_times_out_on_silence() {
        let queue = EventQueue::new(8);
        let consumer = EventConsumer::new(queue).with_timeout(Duration::from_millis(30));
        assert!(consumer.consume_one().await.is_err());
    }

    #[tokio::test]
    async fn consume_all_stops_at_final_and_closes_queue() {
        let queue = EventQueue::new(8);
        let producer = queue.clone();
        tokio::spawn(async move {
            producer.enqueue_event(status_event(TaskState::Working, false)).await;
            producer.enqueue_event(status_event(TaskState::Completed, true)).await;
        });

        let consumer = EventConsumer::new(queue.clone());
        let events: Vec<_> = consumer.consume_all().collect().await;
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(Result::is_ok));
        assert!(queue.is_closed());
    }

    #[tokio::test]
    async fn standalone_message_terminates_stream() {
        let queue = EventQueue::new(8);
        queue
            .enqueue_event(StreamResponse::Message(Message::agent("m1", "done")))
            .await;

        let consumer = EventConsumer::new(queue.clone());
        let events: Vec<_> = consumer.consume_all().collect().await;
        assert_eq!(events.len(), 1);
        assert!(queue.is_closed());
    }

    #[tokio::test]
    async fn producer_exception_surfaces_in_stream() {
        let queue = EventQueue::new(8);
        queue
            .set_exception(A2AError::internal_error("agent blew up"))
            .await;

        let consumer = EventConsumer::new(queue).with_timeout(Duration::from_millis(30));
        let events: Vec<_> = consumer.consume_all().collect().await;
        assert_eq!(events.len(), 1);
        assert!(events[0].is_err());
    }
}
