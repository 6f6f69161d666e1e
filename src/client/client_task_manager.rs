//! Client-side folding of a streaming response sequence into a task
//! snapshot, mirroring the server-side `TaskManager` rules.

use tracing::{debug, info, warn};

use crate::error::{A2AError, A2AResult};
use crate::types::{Message, StreamResponse, Task, TaskState, TaskStatus};
use crate::utils::task::append_artifact_to_task;

/// Tracks one task's state while consuming a client stream.
///
/// The first event may be a full [`Task`] snapshot or an update (a snapshot
/// is synthesized for updates). A second full snapshot is a contract
/// violation, as is asking for the task before any task event arrived.
#[derive(Default)]
pub struct ClientTaskManager {
    current_task: Option<Task>,
    task_id: Option<String>,
    context_id: Option<String>,
}

impl ClientTaskManager {
    /// An empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// The tracked task, if any task event has been folded.
    pub fn get_task(&self) -> Option<&Task> {
        if self.task_id.is_none() {
            debug!("task_id is not set, cannot get task");
            return None;
        }
        self.current_task.as_ref()
    }

    /// The tracked task.
    ///
    /// # Errors
    ///
    /// `InvalidState` when no task event has been folded yet; either the
    /// caller misused the tracker or the server sent updates without a
    /// task.
    pub fn get_task_or_raise(&self) -> A2AResult<&Task> {
        self.get_task()
            .ok_or_else(|| A2AError::InvalidState("no current Task".to_string()))
    }

    /// Folds one stream event; messages pass through untouched.
    ///
    /// # Errors
    ///
    /// `InvalidArgs` when a second full `Task` snapshot arrives for a
    /// tracker that already holds one.
    pub fn process(&mut self, event: &StreamResponse) -> A2AResult<Option<&Task>> {
        match event {
            StreamResponse::Message(_) => Ok(None),
            StreamResponse::Task(task) => {
                if self.current_task.is_some() {
                    return Err(A2AError::InvalidArgs(
                        "Task is already set, create new manager for new tasks".to_string(),
                    ));
                }
                self.save_task(task.clone());
                Ok(self.current_task.as_ref())
            }
            StreamResponse::StatusUpdate(update) => {
                let mut task = self
                    .current_task
                    .take()
                    .unwrap_or_else(|| synthesized(&update.task_id, &update.context_id));

                debug!(
                    task_id = %update.task_id,
                    state = %update.status.state,
                    "Updating tracked task status"
                );

                // The previous status message joins the history; the new
                // status keeps its own (same rule as the server folder).
                if let Some(previous) = task.status.message.take() {
                    task.history.get_or_insert_with(Vec::new).push(previous);
                }
                if let Some(ref event_meta) = update.metadata {
                    merge_metadata(&mut task, event_meta);
                }
                task.status = update.status.clone();

                self.save_task(task);
                Ok(self.current_task.as_ref())
            }
            StreamResponse::ArtifactUpdate(update) => {
                let mut task = self
                    .current_task
                    .take()
                    .unwrap_or_else(|| synthesized(&update.task_id, &update.context_id));

                debug!(task_id = %task.id, "Appending artifact to tracked task");
                append_artifact_to_task(&mut task, update);

                self.save_task(task);
                Ok(self.current_task.as_ref())
            }
        }
    }

    /// Adds a new outbound message to the tracked task's history, moving
    /// any current status message into history first.
    pub fn update_with_message(&mut self, message: Message, task: &mut Task) {
        if let Some(status_msg) = task.status.message.take() {
            task.history.get_or_insert_with(Vec::new).push(status_msg);
        }
        task.history.get_or_insert_with(Vec::new).push(message);
        self.current_task = Some(task.clone());
    }

    fn save_task(&mut self, task: Task) {
        debug!(task_id = %task.id, "Saving tracked task");
        if self.task_id.is_none() {
            info!(task_id = %task.id, "New task tracked");
            self.task_id = Some(task.id.clone());
            self.context_id = Some(task.context_id.clone());
        } else if self.task_id.as_deref() != Some(task.id.as_str()) {
            warn!(
                expected = ?self.task_id,
                actual = %task.id,
                "Stream switched task ids mid-flight"
            );
        }
        self.current_task = Some(task);
    }
}

fn synthesized(task_id: &str, context_id: &str) -> Task {
    Task {
        id: task_id.to_string(),
        context_id: context_id.to_string(),
        kind: "task".to_string(),
        status: TaskStatus::new(TaskState::Unknown),
        artifacts: None,
        history: None,
        metadata: None,
    }
}

fn merge_metadata(task: &mut Task, event_meta: &serde_json::Value) {
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
