//! Task construction, history trimming, and list pagination tokens.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{A2AError, A2AResult};
use crate::types::{
    Artifact, Message, Part, Task, TaskArtifactUpdateEvent, TaskState, TaskStatus,
};

/// Creates a new task from an initial user message.
///
/// Task and context ids are generated when the message does not carry them.
/// The message becomes the first history entry and the task starts in
/// `submitted`.
///
/// # Errors
///
/// Rejects messages with no parts, or with an empty text part.
///
/// # Example
///
/// ```
/// use a2a_sdk::types::Message;
/// use a2a_sdk::utils::new_task;
///
/// let task = new_task(Message::user("m1", "run it")).unwrap();
/// assert_eq!(task.status.state, a2a_sdk::types::TaskState::Submitted);
/// ```
pub fn new_task(request: Message) -> A2AResult<Task> {
    if request.parts.is_empty() {
        return Err(A2AError::invalid_params("Message parts cannot be empty"));
    }
    for part in &request.parts {
        if let Part::Text { text, .. } = part {
            if text.is_empty() {
                return Err(A2AError::invalid_params("Message text cannot be empty"));
            }
        }
    }

    let task_id = request
        .task_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let context_id = request
        .context_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    Ok(Task {
        id: task_id,
        context_id,
        kind: "task".to_string(),
        status: TaskStatus::now(TaskState::Submitted),
        artifacts: None,
        history: Some(vec![request]),
        metadata: None,
    })
}

/// Creates a task already in the `completed` state, carrying the given
/// artifacts.
///
/// # Errors
///
/// Rejects an empty artifact list.
pub fn completed_task(
    task_id: impl Into<String>,
    context_id: impl Into<String>,
    artifacts: Vec<Artifact>,
    history: Option<Vec<Message>>,
) -> A2AResult<Task> {
    if artifacts.is_empty() {
        return Err(A2AError::invalid_params(
            "artifacts must be a non-empty list",
        ));
    }

    Ok(Task {
        id: task_id.into(),
        context_id: context_id.into(),
        kind: "task".to_string(),
        status: TaskStatus::now(TaskState::Completed),
        artifacts: Some(artifacts),
        history,
        metadata: None,
    })
}

/// Trims a task's history to the most recent `history_length` messages.
///
/// `None` or 0 leaves the history untouched.
pub fn apply_history_length(mut task: Task, history_length: Option<usize>) -> Task {
    if let Some(length) = history_length {
        if length > 0 {
            if let Some(ref mut history) = task.history {
                let total = history.len();
                if total > length {
                    *history = history.split_off(total - length);
                }
            }
        }
    }
    task
}

/// Applies an artifact-update event to a task.
///
/// `append=false` (or absent) inserts a new artifact or wholesale replaces
/// the one with the same id; `append=true` extends the existing artifact's
/// parts and is ignored when no artifact with that id exists yet.
pub fn append_artifact_to_task(task: &mut Task, event: &TaskArtifactUpdateEvent) {
    let artifacts = task.artifacts.get_or_insert_with(Vec::new);

    let new_artifact: &Artifact = &event.artifact;
    let artifact_id = &new_artifact.artifact_id;
    let append_parts = event.append.unwrap_or(false);

    let existing_idx = artifacts.iter().position(|a| a.artifact_id == *artifact_id);

    if !append_parts {
        if let Some(idx) = existing_idx {
            debug!(artifact_id = %artifact_id, task_id = %task.id, "Replacing artifact");
            artifacts[idx] = new_artifact.clone();
        } else {
            debug!(artifact_id = %artifact_id, task_id = %task.id, "Adding new artifact");
            artifacts.push(new_artifact.clone());
        }
    } else if let Some(idx) = existing_idx {
        debug!(artifact_id = %artifact_id, task_id = %task.id, "Appending parts to artifact");
        artifacts[idx].parts.extend(new_artifact.parts.clone());
    } else {
        warn!(
            artifact_id = %artifact_id,
            task_id = %task.id,
            "Received append=true for nonexistent artifact. Ignoring chunk."
        );
    }
}

/// Encodes a task id into an opaque list-pagination token.
pub fn encode_page_token(task_id: &str) -> String {
    BASE64.encode(task_id.as_bytes())
}

/// Decodes a list-pagination token back into the task id it was built from.
///
/// Missing base64 padding is tolerated, so padded and unpadded variants of
/// the same token decode identically.
///
/// # Errors
///
/// `InvalidParams` when the token is not valid base64 or not valid UTF-8.
pub fn decode_page_token(page_token: &str) -> A2AResult<String> {
    let mut encoded = page_token.to_string();
    let missing_padding = encoded.len() % 4;
    if missing_padding != 0 {
        encoded.push_str(&"=".repeat(4 - missing_padding));
    }
    let bytes = BASE64
        .decode(encoded.as_bytes())
        .map_err(|_| A2AError::invalid_params("Token is not a valid base64-encoded cursor"))?;
    String::from_utf8(bytes)
        .map_err(|_| A2AError::invalid_params("Token is not a valid base64-encoded cursor"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_starts_submitted_with_history() {
        let task = new_task(Message::user("m1", "hello")).unwrap();
        assert_eq!(task.status.state, TaskState::Submitted);
        assert_eq!(task.history.as_ref().unwrap().len(), 1);
        assert!(Uuid::parse_str(&task.id).is_ok());
        assert!(Uuid::parse_str(&task.context_id).is_ok());
    }

    #[test]
    fn new_task_keeps_supplied_ids() {
        let mut msg = Message::user("m1", "hello");
        msg.task_id = Some("t1".into());
        msg.context_id = Some("c1".into());
        let task = new_task(msg).unwrap();
        assert_eq!(task.id, "t1");
        assert_eq!(task.context_id, "c1");
    }

    #[test]
    fn new_task_rejects_empty_parts() {
        let mut msg = Message::user("m1", "x");
        msg.parts.clear();
        assert!(new_task(msg).is_err());
    }

    #[test]
    fn new_task_rejects_empty_text() {
        let msg = Message::user("m1", "");
        assert!(new_task(msg).is_err());
    }

    #[test]
    fn completed_task_requires_artifacts() {
        assert!(completed_task("t", "c", vec![], None).is_err());
    }

    #[test]
    fn history_trim_keeps_tail() {
        let history: Vec<Message> = (0..10).map(|i| Message::user(format!("m{i}"), "x")).collect();
        let task = Task {
            id: "t".into(),
            context_id: "c".into(),
            kind: "task".into(),
            status: TaskStatus::new(TaskState::Working),
            artifacts: None,
            history: Some(history),
            metadata: None,
        };
        let trimmed = apply_history_length(task, Some(3));
        let history = trimmed.history.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].message_id, "m7");
        assert_eq!(history[2].message_id, "m9");
    }

    #[test]
    fn page_token_round_trip() {
        let token = encode_page_token("task-abc-123");
        assert_eq!(decode_page_token(&token).unwrap(), "task-abc-123");
    }

    #[test]
    fn page_token_tolerates_stripped_padding() {
        let token = encode_page_token("task-1");
        let unpadded = token.trim_end_matches('=');
        assert_eq!(decode_page_token(unpadded).unwrap(), "task-1");
        assert_eq!(decode_page_token(&token).unwrap(), "task-1");
    }

    #[test]
    fn page_token_rejects_garbage() {
        assert!(decode_page_token("!!!not-base64!!!").is_err());
    }
}
