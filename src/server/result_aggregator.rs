//! Drives an [`EventConsumer`] and reconciles every event through a
//! [`TaskManager`], producing either a final result or a lazily yielded
//! event stream.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::error::{A2AError, A2AResult};
use crate::types::{Message, StreamResponse, Task};

use super::event_consumer::EventConsumer;
use super::task_manager::TaskManager;

/// The settled outcome of an agent execution.
#[derive(Clone, Debug)]
pub enum AggregatedResult {
    /// The task snapshot as of the last folded event.
    Task(Task),
    /// A standalone message; no task exists.
    Message(Message),
}

impl AggregatedResult {
    fn is_terminal(&self) -> bool {
        match self {
            AggregatedResult::Task(task) => task.status.state.is_terminal(),
            AggregatedResult::Message(_) => true,
        }
    }

    fn is_interrupt(&self) -> bool {
        match self {
            AggregatedResult::Task(task) => task.status.state.is_interruptible(),
            AggregatedResult::Message(_) => false,
        }
    }
}

/// Folds a consumer's events through a [`TaskManager`].
///
/// Two consumption modes: [`consume_all`](ResultAggregator::consume_all)
/// drains to the final result, and
/// [`consume_and_break_on_interrupt`](ResultAggregator::consume_and_break_on_interrupt)
/// stops early on an interruptible state while leaving the producer
/// running. [`consume_and_emit`](ResultAggregator::consume_and_emit) yields
/// each event for streaming handlers, folding as it goes.
pub struct ResultAggregator {
    task_manager: Mutex<TaskManager>,
    current_result: Mutex<Option<AggregatedResult>>,
}

impl ResultAggregator {
    /// Aggregator over the given manager.
    pub fn new(task_manager: TaskManager) -> Self {
        ResultAggregator {
            task_manager: Mutex::new(task_manager),
            current_result: Mutex::new(None),
        }
    }

    /// The most recently folded result.
    pub async fn current_result(&self) -> Option<AggregatedResult> {
        self.current_result.lock().await.clone()
    }

    /// Folds a new inbound message into the tracked snapshot and persists
    /// it, keeping this aggregator's manager authoritative across
    /// continuation sends. `None` when no task exists yet.
    pub async fn append_message(&self, message: Message) -> A2AResult<Option<Task>> {
        self.task_manager.lock().await.append_message(message).await
    }

    async fn process_event(&self, event: StreamResponse) -> A2AResult<AggregatedResult> {
        let mut task_manager = self.task_manager.lock().await;
        match event {
            StreamResponse::Message(message) => Ok(AggregatedResult::Message(message)),
            other => {
                task_manager.process(other).await?;
                let task = task_manager.get_task().await?.ok_or_else(|| {
                    A2AError::internal_error("Event folding produced no task snapshot")
                })?;
                Ok(AggregatedResult::Task(task))
            }
        }
    }

    /// Drains the consumer to completion and returns the final result.
    pub async fn consume_all(&self, consumer: EventConsumer) -> A2AResult<AggregatedResult> {
        let mut last_result = None;
        let stream = consumer.consume_all();
        futures::pin_mut!(stream);

        while let Some(event) = stream.next().await {
            let result = self.process_event(event?).await?;
            let terminal = result.is_terminal();
            *self.current_result.lock().await = Some(result.clone());
            last_result = Some(result);
            if terminal {
                debug!("Terminal result reached; stopping consumption");
                break;
            }
        }

        last_result.ok_or_else(|| A2AError::internal_error("No events received from agent"))
    }

    /// Drains events until the stream ends or the task enters an
    /// interruptible state (`input-required` / `auth-required`).
    ///
    /// On interrupt the aggregator detaches without closing the queue or
    /// cancelling the producer, so a later `subscribe` can tap the still
    /// registered queue. Returns the last result and whether an interrupt
    /// occurred.
    pub async fn consume_and_break_on_interrupt(
        &self,
        consumer: EventConsumer,
    ) -> A2AResult<(Option<AggregatedResult>, bool)> {
        let mut last_result = None;
        let mut interrupted = false;
        let stream = consumer.consume_all();
        futures::pin_mut!(stream);

        while let Some(event) = stream.next().await {
            let result = self.process_event(event?).await?;
            let terminal = result.is_terminal();
            let interrupt = result.is_interrupt();
            *self.current_result.lock().await = Some(result.clone());
            last_result = Some(result);

            if terminal {
                debug!("Terminal result reached; stopping consumption");
                break;
            }
            if interrupt {
                debug!("Interruptible state reached; detaching without closing the queue");
                interrupted = true;
                break;
            }
        }

        Ok((last_result, interrupted))
    }

    /// Yields each event as it arrives, folding task events into the store
    /// along the way. Events that fail to fold end the stream with the
    /// error.
    pub fn consume_and_emit(
        self: Arc<Self>,
        consumer: EventConsumer,
    ) -> impl Stream<Item = A2AResult<StreamResponse>> {
        async_stream::stream! {
            let stream = consumer.consume_all();
            futures::pin_mut!(stream);

            while let Some(event) = stream.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                };

                match self.process_event(event.clone()).await {
                    Ok(result) => {
                        *self.current_result.lock().await = Some(result);
                        yield Ok(event);
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to fold event");
                        yield Err(e);
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::event_queue::EventQueue;
    use crate::server::task_store::{InMemoryTaskStore, TaskStore};
    use crate::types::{TaskState, TaskStatus, TaskStatusUpdateEvent};

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

    fn aggregator(store: Arc<dyn TaskStore>) -> ResultAggregator {
        ResultAggregator::new(TaskManager::new(store, None, None, None).unwrap())
    }

    #[tokio::test]
    async fn consume_all_returns_terminal_task() {
        let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
        let queue = EventQueue::new(8);
        queue.enqueue_event(status_event(TaskState::Working, false)).await;
        queue.enqueue_event(status_event(TaskState::Completed, true)).await;

        let agg = aggregator(store.clone());
        let result = agg.consume_all(EventConsumer::new(queue)).await.unwrap();

        match result {
            AggregatedResult::Task(task) => {
                assert_eq!(task.status.state, TaskState::Completed);
            }
            _ => panic!("expected task"),
        }
        let persisted = store.get("t1").await.unwrap().unwrap();
        assert_eq!(persisted.status.state, TaskState::Completed);
    }

    #[tokio::test]
    async fn break_on_interrupt_leaves_queue_open() {
        let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
        let queue = EventQueue::new(8);
        queue.enqueue_event(status_event(TaskState::Working, false)).await;
        queue.enqueue_event(status_event(TaskState::InputRequired, false)).await;

        let agg = aggregator(store);
        let (result, interrupted) = agg
            .consume_and_break_on_interrupt(EventConsumer::new(queue.clone()))
            .await
            .unwrap();

        assert!(interrupted);
        match result.unwrap() {
            AggregatedResult::Task(task) => {
                assert_eq!(task.status.state, TaskState::InputRequired)
            }
            _ => panic!("expected task"),
        }
        assert!(!queue.is_closed());
    }

    #[tokio::test]
    async fn auth_required_also_interrupts() {
        let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
        let queue = EventQueue::new(8);
        queue.enqueue_event(status_event(TaskState::AuthRequired, false)).await;

        let agg = aggregator(store);
        let (_, interrupted) = agg
            .consume_and_break_on_interrupt(EventConsumer::new(queue))
            .await
            .unwrap();
        assert!(interrupted);
    }

    #[tokio::test]
    async fn message_is_terminal_result() {
        let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
        let queue = EventQueue::new(8);
        queue
            .enqueue_event(StreamResponse::Message(Message::agent("m1", "direct reply")))
            .await;

        let agg = aggregator(store);
        let result = agg.consume_all(EventConsumer::new(queue)).await.unwrap();
        assert!(matches!(result, AggregatedResult::Message(_)));
    }

    #[tokio::test]
    async fn consume_and_emit_yields_each_event() {
        let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
        let queue = EventQueue::new(8);
        queue.enqueue_event(status_event(TaskState::Working, false)).await;
        queue.enqueue_event(status_event(TaskState::Completed, true)).await;

        let agg = Arc::new(aggregator(store));
        let events: Vec<_> = agg
            .consume_and_emit(EventConsumer::new(queue))
            .collect()
            .await;
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(Result::is_ok));
    }
}
