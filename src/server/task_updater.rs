//! Agent-side helper for publishing task state transitions and artifacts.
//!
//! Wraps an [`EventQueue`] and enforces the state machine from the agent's
//! side: once a terminal status has been published, further status updates
//! are rejected. Artifact chunks are not guarded; they may be emitted
//! independently of status.

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{A2AError, A2AResult};
use crate::types::{
    Artifact, Message, Part, Role, StreamResponse, TaskArtifactUpdateEvent, TaskState, TaskStatus,
    TaskStatusUpdateEvent,
};

use super::event_queue::EventQueue;

/// Publishes status and artifact events for one task.
///
/// Safe to share as `Arc<TaskUpdater>`; the terminal flag sits behind a
/// mutex.
pub struct TaskUpdater {
    event_queue: EventQueue,
    task_id: String,
    context_id: String,
    terminal_reached: Mutex<bool>,
}

impl TaskUpdater {
    /// Updater bound to the given task and context ids.
    pub fn new(event_queue: EventQueue, task_id: String, context_id: String) -> Self {
        TaskUpdater {
            event_queue,
            task_id,
            context_id,
            terminal_reached: Mutex::new(false),
        }
    }

    /// The task id this updater publishes for.
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// The context id this updater publishes for.
    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    /// Whether a terminal status has been published.
    pub async fn is_terminal(&self) -> bool {
        *self.terminal_reached.lock().await
    }

    /// Publishes a status update.
    ///
    /// Terminal states force `final = true`. The status is stamped with the
    /// current time unless `timestamp` is given.
    ///
    /// # Errors
    ///
    /// `InvalidState` when a terminal status was already published.
    pub async fn update_status(
        &self,
        state: TaskState,
        message: Option<Message>,
        r#final: bool,
        metadata: Option<serde_json::Value>,
    ) -> A2AResult<()> {
        self.update_status_with_timestamp(state, message, r#final, None, metadata)
            .await
    }

    /// [`update_status`](Self::update_status) with an explicit timestamp.
    pub async fn update_status_with_timestamp(
        &self,
        state: TaskState,
        message: Option<Message>,
        r#final: bool,
        timestamp: Option<String>,
        metadata: Option<serde_json::Value>,
    ) -> A2AResult<()> {
        let is_terminal = state.is_terminal();
        let is_final = is_terminal || r#final;

        {
            let mut terminal = self.terminal_reached.lock().await;
            if *terminal {
                warn!(
                    task_id = %self.task_id,
                    requested = %state,
                    "Attempted status update after terminal state"
                );
                return Err(A2AError::InvalidState(format!(
                    "Task {} has already reached a terminal state",
                    self.task_id
                )));
            }
            if is_terminal {
                *terminal = true;
            }
        }

        let event = StreamResponse::StatusUpdate(TaskStatusUpdateEvent {
            task_id: self.task_id.clone(),
            context_id: self.context_id.clone(),
            kind: "status-update".to_string(),
            status: TaskStatus {
                state,
                message,
                timestamp: Some(timestamp.unwrap_or_else(|| Utc::now().to_rfc3339())),
            },
            r#final: is_final,
            metadata,
        });

        self.event_queue.enqueue_event(event).await;
        debug!(task_id = %self.task_id, state = %state, terminal = is_terminal, "Status update published");
        Ok(())
    }

    /// Publishes an artifact chunk. The artifact id is generated when not
    /// supplied.
    pub async fn add_artifact(
        &self,
        parts: Vec<Part>,
        artifact_id: Option<String>,
        name: Option<String>,
        append: Option<bool>,
        last_chunk: Option<bool>,
    ) -> A2AResult<()> {
        let artifact_id = artifact_id.unwrap_or_else(|| Uuid::new_v4().to_string());

        let event = StreamResponse::ArtifactUpdate(TaskArtifactUpdateEvent {
            task_id: self.task_id.clone(),
            context_id: self.context_id.clone(),
            kind: "artifact-update".to_string(),
            artifact: Artifact {
                artifact_id: artifact_id.clone(),
                parts,
                name,
                description: None,
                metadata: None,
                extensions: None,
            },
            append,
            last_chunk,
            metadata: None,
        });

        self.event_queue.enqueue_event(event).await;
        debug!(task_id = %self.task_id, artifact_id = %artifact_id, "Artifact update published");
        Ok(())
    }

    /// Publishes a standalone message event.
    pub async fn send_message(&self, message: Message) -> A2AResult<()> {
        self.event_queue
            .enqueue_event(StreamResponse::Message(message))
            .await;
        Ok(())
    }

    // ---- Convenience transitions ----

    /// `submitted`.
    pub async fn submit(&self, message: Option<Message>) -> A2AResult<()> {
        self.update_status(TaskState::Submitted, message, false, None).await
    }

    /// `working`.
    pub async fn start_work(&self, message: Option<Message>) -> A2AResult<()> {
        self.update_status(TaskState::Working, message, false, None).await
    }

    /// `completed` (terminal).
    pub async fn complete(&self, message: Option<Message>) -> A2AResult<()> {
        self.update_status(TaskState::Completed, message, true, None).await
    }

    /// `failed` (terminal).
    pub async fn fail(&self, message: Option<Message>) -> A2AResult<()> {
        self.update_status(TaskState::Failed, message, true, None).await
    }

    /// `canceled` (terminal).
    pub async fn cancel(&self, message: Option<Message>) -> A2AResult<()> {
        self.update_status(TaskState::Canceled, message, true, None).await
    }

    /// `rejected` (terminal).
    pub async fn reject(&self, message: Option<Message>) -> A2AResult<()> {
        self.update_status(TaskState::Rejected, message, true, None).await
    }

    /// `input-required`; the task becomes reattachable.
    pub async fn requires_input(&self, message: Option<Message>, r#final: bool) -> A2AResult<()> {
        self.update_status(TaskState::InputRequired, message, r#final, None).await
    }

    /// `auth-required`; the task becomes reattachable.
    pub async fn requires_auth(&self, message: Option<Message>, r#final: bool) -> A2AResult<()> {
        self.update_status(TaskState::AuthRequired, message, r#final, None).await
    }

    /// Builds (without publishing) an agent message bound to this task.
    pub fn new_agent_message(
        &self,
        parts: Vec<Part>,
        metadata: Option<serde_json::Value>,
    ) -> Message {
        Message {
            message_id: Uuid::new_v4().to_string(),
            role: Role::Agent,
            kind: "message".to_string(),
            parts,
            context_id: Some(self.context_id.clone()),
            task_id: Some(self.task_id.clone()),
            metadata,
            extensions: None,
            reference_task_ids: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn updater() -> (TaskUpdater, EventQueue) {
        let queue = EventQueue::new(16);
        (
            TaskUpdater::new(queue.clone(), "t1".to_string(), "c1".to_string()),
            queue,
        )
    }

    #[tokio::test]
    async fn complete_publishes_final_terminal_status() {
        let (updater, queue) = updater();
        updater.complete(None).await.unwrap();

        match queue.dequeue_event().await.unwrap() {
            StreamResponse::StatusUpdate(u) => {
                assert_eq!(u.status.state, TaskState::Completed);
                assert!(u.r#final);
                assert!(u.status.timestamp.is_some());
            }
            _ => panic!("expected status update"),
        }
        assert!(updater.is_terminal().await);
    }

    #[tokio::test]
    async fn updates_after_terminal_are_rejected() {
        let (updater, _queue) = updater();
        updater.complete(None).await.unwrap();
        assert!(updater.start_work(None).await.is_err());
    }

    #[tokio::test]
    async fn artifact_id_is_generated() {
        let (updater, queue) = updater();
        updater
            .add_artifact(vec![Part::text("chunk")], None, None, None, None)
            .await
            .unwrap();

        match queue.dequeue_event().await.unwrap() {
            StreamResponse::ArtifactUpdate(u) => {
                assert!(Uuid::parse_str(&u.artifact.artifact_id).is_ok());
            }
            _ => panic!("expected artifact update"),
        }
    }

    #[tokio::test]
    async fn requires_input_is_not_terminal() {
        let (updater, _queue) = updater();
        updater.requires_input(None, false).await.unwrap();
        assert!(!updater.is_terminal().await);
        // Can still complete afterwards.
        updater.complete(None).await.unwrap();
    }
}
