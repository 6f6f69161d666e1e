//! Folds pipeline events into the authoritative task snapshot and persists
//! it through the [`TaskStore`].
//!
//! One `TaskManager` serves one task for the duration of a handler call;
//! `save_task_event` calls are serialized by the owner (the result
//! aggregator holds the manager behind a mutex), so persistence is
//! sequential per task id.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{A2AError, A2AResult};
use crate::types::{
    Message, StreamResponse, Task, TaskArtifactUpdateEvent, TaskState, TaskStatus,
    TaskStatusUpdateEvent,
};

use super::task_store::TaskStore;

/// A task-mutating event: everything on the pipeline except standalone
/// messages.
pub enum TaskEvent {
    /// A complete snapshot.
    Task(Task),
    /// A status update.
    StatusUpdate(TaskStatusUpdateEvent),
    /// An artifact update.
    ArtifactUpdate(TaskArtifactUpdateEvent),
}

impl TaskEvent {
    fn ids(&self) -> (&str, &str) {
        match self {
            TaskEvent::Task(t) => (&t.id, &t.context_id),
            TaskEvent::StatusUpdate(e) => (&e.task_id, &e.context_id),
            TaskEvent::ArtifactUpdate(e) => (&e.task_id, &e.context_id),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            TaskEvent::Task(_) => "Task",
            TaskEvent::StatusUpdate(_) => "TaskStatusUpdateEvent",
            TaskEvent::ArtifactUpdate(_) => "TaskArtifactUpdateEvent",
        }
    }
}

/// Server-side folding of events into a persisted [`Task`].
pub struct TaskManager {
    task_id: Option<String>,
    context_id: Option<String>,
    task_store: Arc<dyn TaskStore>,
    /// Message that initiated the task; seeds the history of a synthesized
    /// snapshot.
    initial_message: Option<Message>,
    current_task: Option<Task>,
}

impl TaskManager {
    /// Manager bound to the ids known from the request, if any.
    ///
    /// # Errors
    ///
    /// `InvalidParams` when a supplied task id is empty.
    pub fn new(
        task_store: Arc<dyn TaskStore>,
        task_id: Option<String>,
        context_id: Option<String>,
        initial_message: Option<Message>,
    ) -> A2AResult<Self> {
        if let Some(ref id) = task_id {
            if id.is_empty() {
                return Err(A2AError::invalid_params(
                    "Task ID must be a non-empty string",
                ));
            }
        }

        debug!(?task_id, ?context_id, "TaskManager initialized");

        Ok(TaskManager {
            task_id,
            context_id,
            task_store,
            initial_message,
            current_task: None,
        })
    }

    /// The bound task id, once known.
    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    /// The bound context id, once known.
    pub fn context_id(&self) -> Option<&str> {
        self.context_id.as_deref()
    }

    /// The current snapshot: from memory, or loaded from the store.
    pub async fn get_task(&mut self) -> A2AResult<Option<Task>> {
        let Some(ref task_id) = self.task_id else {
            debug!("task_id is not set, cannot get task");
            return Ok(None);
        };

        if self.current_task.is_some() {
            return Ok(self.current_task.clone());
        }

        let task = self.task_store.get(task_id).await?;
        self.current_task = task.clone();
        Ok(task)
    }

    /// Folds one task event into the snapshot and persists the result.
    ///
    /// Binds task/context ids on first sight and rejects events whose ids
    /// conflict with the bound ones. Status updates that arrive after the
    /// task is terminal are persisted (history moves, metadata merges) but
    /// never change the terminal state.
    pub async fn save_task_event(&mut self, event: TaskEvent) -> A2AResult<Task> {
        let (event_task_id, event_context_id) = {
            let (t, c) = event.ids();
            (t.to_string(), c.to_string())
        };

        if let Some(ref bound) = self.task_id {
            if *bound != event_task_id {
                return Err(A2AError::invalid_params(format!(
                    "Task id in event does not match bound id {} : {}",
                    bound, event_task_id
                )));
            }
        } else {
            self.task_id = Some(event_task_id.clone());
        }

        if let Some(ref bound) = self.context_id {
            if *bound != event_context_id {
                return Err(A2AError::invalid_params(format!(
                    "Context id in event does not match bound id {} : {}",
                    bound, event_context_id
                )));
            }
        } else {
            self.context_id = Some(event_context_id.clone());
        }

        debug!(
            event_type = event.type_name(),
            task_id = %event_task_id,
            "Processing save of task event"
        );

        match event {
            TaskEvent::Task(task) => {
                self.save_task(task.clone()).await?;
                Ok(task)
            }
            TaskEvent::StatusUpdate(update) => {
                let mut task = self.ensure_task(&event_task_id, &event_context_id).await?;
                self.apply_status_update(&mut task, update);
                self.save_task(task.clone()).await?;
                Ok(task)
            }
            TaskEvent::ArtifactUpdate(update) => {
                let mut task = self.ensure_task(&event_task_id, &event_context_id).await?;
                append_artifact_to_task(&mut task, &update);
                self.save_task(task.clone()).await?;
                Ok(task)
            }
        }
    }

    /// Applies a pipeline event, persisting task mutations; standalone
    /// messages pass through untouched.
    pub async fn process(&mut self, event: StreamResponse) -> A2AResult<StreamResponse> {
        match &event {
            StreamResponse::Task(task) => {
                self.save_task_event(TaskEvent::Task(task.clone())).await?;
            }
            StreamResponse::StatusUpdate(update) => {
                self.save_task_event(TaskEvent::StatusUpdate(update.clone()))
                    .await?;
            }
            StreamResponse::ArtifactUpdate(update) => {
                self.save_task_event(TaskEvent::ArtifactUpdate(update.clone()))
                    .await?;
            }
            StreamResponse::Message(_) => {}
        }
        Ok(event)
    }

    /// Adds a new inbound message to the task's history, moving any message
    /// held by the current status into history first.
    pub fn update_with_message(&mut self, message: Message, task: &mut Task) {
        if let Some(status_msg) = task.status.message.take() {
            task.history.get_or_insert_with(Vec::new).push(status_msg);
        }
        task.history.get_or_insert_with(Vec::new).push(message);
        self.current_task = Some(task.clone());
    }

    /// [`update_with_message`](Self::update_with_message) against the
    /// current snapshot, persisted. `None` when no task exists yet.
    pub async fn append_message(&mut self, message: Message) -> A2AResult<Option<Task>> {
        let Some(mut task) = self.get_task().await? else {
            return Ok(None);
        };
        self.update_with_message(message, &mut task);
        self.task_store.save(task.clone()).await?;
        Ok(Some(task))
    }

    fn apply_status_update(&self, task: &mut Task, update: TaskStatusUpdateEvent) {
        debug!(
            task_id = %task.id,
            new_state = %update.status.state,
            "Updating task status"
        );

        // The previous status message joins the history; the new status
        // keeps its own.
        if let Some(previous) = task.status.message.take() {
            task.history.get_or_insert_with(Vec::new).push(previous);
        }

        if let Some(event_meta) = update.metadata {
            merge_metadata(task, event_meta);
        }

        if task.status.state.is_terminal() {
            warn!(
                task_id = %task.id,
                current = %task.status.state,
                requested = %update.status.state,
                "Status update after terminal state; keeping terminal state (protocol violation)"
            );
            // History and metadata above were still applied; the state is
            // frozen.
            if let Some(message) = update.status.message {
                task.history.get_or_insert_with(Vec::new).push(message);
            }
            return;
        }

        task.status = update.status;
    }

    async fn ensure_task(&mut self, task_id: &str, context_id: &str) -> A2AResult<Task> {
        if let Some(ref task) = self.current_task {
            return Ok(task.clone());
        }

        if let Some(task) = self.task_store.get(task_id).await? {
            self.current_task = Some(task.clone());
            return Ok(task);
        }

        info!(task_id, context_id, "Task not found; synthesizing a submitted snapshot");
        let task = self.init_task_obj(task_id.to_string(), context_id.to_string());
        self.save_task(task.clone()).await?;
        Ok(task)
    }

    fn init_task_obj(&self, task_id: String, context_id: String) -> Task {
        let history = self.initial_message.as_ref().map(|msg| vec![msg.clone()]);
        Task {
            id: task_id,
            context_id,
            kind: "task".to_string(),
            status: TaskStatus::now(TaskState::Submitted),
            artifacts: None,
            history,
            metadata: None,
        }
    }

    async fn save_task(&mut self, task: Task) -> A2AResult<()> {
        debug!(task_id = %task.id, "Saving task");
        self.task_store.save(task.clone()).await?;

        if self.task_id.is_none() {
            info!(task_id = %task.id, "New task created");
            self.task_id = Some(task.id.clone());
            self.context_id = Some(task.context_id.clone());
        }

        self.current_task = Some(task);
        Ok(())
    }
}

fn merge_metadata(task: &mut Task, event_meta: serde_json::Value) {
    let task_meta = task
        .metadata
        .get_or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
    if let (Some(task_obj), Some(event_obj)) = (task_meta.as_object_mut(), event_meta.as_object())
    {
        for (k, v) in event_obj {
            task_obj.insert(k.clone(), v.clone());
        }
    }
}

pub use crate::utils::task::append_artifact_to_task;
