//! Shared fixtures: scripted agent executors and card builders.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

use a2a_sdk::builders::AgentCardBuilder;
use a2a_sdk::server::{AgentExecutor, EventQueue, RequestContext, TaskUpdater};
use a2a_sdk::types::{AgentCard, Message, Part, StreamResponse, Task, TaskState, TaskStatus};
use a2a_sdk::A2AResult;

/// An agent card for tests.
pub fn test_card(streaming: bool, push: bool) -> AgentCard {
    AgentCardBuilder::new("Test Agent", "A scripted test agent", "0.0.1")
        .url("http://localhost:7420")
        .streaming(streaming)
        .push_notifications(push)
        .build()
        .expect("card builds")
}

/// A user message with a single text part.
pub fn user_message(id: &str, text: &str) -> Message {
    Message::user(id, text)
}

/// Emits `submitted → working → completed` with a closing text message, the
/// shape of a simple one-shot agent.
pub struct CompletingExecutor {
    pub final_text: String,
    pub execute_calls: AtomicUsize,
}

impl CompletingExecutor {
    pub fn new(final_text: impl Into<String>) -> Self {
        CompletingExecutor {
            final_text: final_text.into(),
            execute_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AgentExecutor for CompletingExecutor {
    async fn execute(&self, ctx: RequestContext, queue: EventQueue) -> A2AResult<()> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);
        let updater = TaskUpdater::new(queue, ctx.task_id.clone(), ctx.context_id.clone());
        updater.submit(None).await?;
        updater.start_work(None).await?;
        let done = updater.new_agent_message(vec![Part::text(self.final_text.clone())], None);
        updater.complete(Some(done)).await
    }

    async fn cancel(&self, ctx: RequestContext, queue: EventQueue) -> A2AResult<()> {
        let updater = TaskUpdater::new(queue, ctx.task_id, ctx.context_id);
        updater.cancel(None).await
    }
}

/// Emits a full task snapshot, two artifact chunks for the same artifact id,
/// and a final completed status — the streaming-with-artifact shape.
pub struct ArtifactExecutor;

#[async_trait]
impl AgentExecutor for ArtifactExecutor {
    async fn execute(&self, ctx: RequestContext, queue: EventQueue) -> A2AResult<()> {
        let snapshot = Task {
            id: ctx.task_id.clone(),
            context_id: ctx.context_id.clone(),
            kind: "task".to_string(),
            status: TaskStatus::now(TaskState::Working),
            artifacts: None,
            history: None,
            metadata: None,
        };
        queue.enqueue_event(StreamResponse::Task(snapshot)).await;

        let updater = TaskUpdater::new(queue, ctx.task_id, ctx.context_id);
        updater
            .add_artifact(
                vec![Part::text("chunk1")],
                Some("a1".to_string()),
                None,
                Some(false),
                None,
            )
            .await?;
        updater
            .add_artifact(
                vec![Part::text("chunk2")],
                Some("a1".to_string()),
                None,
                Some(true),
                Some(true),
            )
            .await?;
        updater.complete(None).await
    }

    async fn cancel(&self, ctx: RequestContext, queue: EventQueue) -> A2AResult<()> {
        let updater = TaskUpdater::new(queue, ctx.task_id, ctx.context_id);
        updater.cancel(None).await
    }
}

/// First run: `working → input-required`, then stays alive until released;
/// once released: `working → completed`. Counts executions so tests can
/// assert the producer was spawned exactly once.
pub struct InterruptingExecutor {
    pub release: Arc<Notify>,
    pub execute_calls: AtomicUsize,
}

impl InterruptingExecutor {
    pub fn new() -> Self {
        InterruptingExecutor {
            release: Arc::new(Notify::new()),
            execute_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AgentExecutor for InterruptingExecutor {
    async fn execute(&self, ctx: RequestContext, queue: EventQueue) -> A2AResult<()> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);
        let updater = TaskUpdater::new(queue, ctx.task_id.clone(), ctx.context_id.clone());
        updater.start_work(None).await?;
        let prompt = updater.new_agent_message(vec![Part::text("need key")], None);
        updater.requires_input(Some(prompt), false).await?;

        // Wait for the follow-up message before finishing.
        self.release.notified().await;
        updater.start_work(None).await?;
        updater.complete(None).await
    }

    async fn cancel(&self, ctx: RequestContext, queue: EventQueue) -> A2AResult<()> {
        let updater = TaskUpdater::new(queue, ctx.task_id, ctx.context_id);
        updater.cancel(None).await
    }
}

/// Goes to `working` and then blocks until cancelled; `cancel` publishes the
/// terminal `canceled` status.
pub struct HangingExecutor;

#[async_trait]
impl AgentExecutor for HangingExecutor {
    async fn execute(&self, ctx: RequestContext, queue: EventQueue) -> A2AResult<()> {
        let updater = TaskUpdater::new(queue, ctx.task_id, ctx.context_id);
        updater.start_work(None).await?;
        // Hang until the handler aborts this producer.
        std::future::pending::<()>().await;
        Ok(())
    }

    async fn cancel(&self, ctx: RequestContext, queue: EventQueue) -> A2AResult<()> {
        let updater = TaskUpdater::new(queue, ctx.task_id, ctx.context_id);
        updater.cancel(None).await
    }
}

/// Replies with a standalone message; no task is created.
pub struct DirectReplyExecutor;

#[async_trait]
impl AgentExecutor for DirectReplyExecutor {
    async fn execute(&self, _ctx: RequestContext, queue: EventQueue) -> A2AResult<()> {
        queue
            .enqueue_event(StreamResponse::Message(Message::agent("m-reply", "direct reply")))
            .await;
        Ok(())
    }

    async fn cancel(&self, _ctx: RequestContext, _queue: EventQueue) -> A2AResult<()> {
        Ok(())
    }
}

/// Fails without emitting any event.
pub struct CrashingExecutor;

#[async_trait]
impl AgentExecutor for CrashingExecutor {
    async fn execute(&self, _ctx: RequestContext, _queue: EventQueue) -> A2AResult<()> {
        Err(a2a_sdk::A2AError::internal_error("agent blew up"))
    }

    async fn cancel(&self, _ctx: RequestContext, _queue: EventQueue) -> A2AResult<()> {
        Ok(())
    }
}

/// Activates one extension, then completes.
pub struct ExtensionActivatingExecutor {
    pub uri: String,
}

#[async_trait]
impl AgentExecutor for ExtensionActivatingExecutor {
    async fn execute(&self, ctx: RequestContext, queue: EventQueue) -> A2AResult<()> {
        ctx.add_activated_extension(self.uri.clone());
        let updater = TaskUpdater::new(queue, ctx.task_id, ctx.context_id);
        updater.complete(None).await
    }

    async fn cancel(&self, ctx: RequestContext, queue: EventQueue) -> A2AResult<()> {
        let updater = TaskUpdater::new(queue, ctx.task_id, ctx.context_id);
        updater.cancel(None).await
    }
}
