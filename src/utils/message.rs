//! Message construction and inspection helpers.

use crate::types::{Message, Part, Role};
use crate::utils::parts::get_text_parts;
use uuid::Uuid;

/// Creates an agent message with a single text part and a generated id.
///
/// # Example
///
/// ```
/// use a2a_sdk::utils::new_agent_text_message;
///
/// let message = new_agent_text_message("Hello from the agent", None::<String>, None::<String>);
/// assert_eq!(message.role, a2a_sdk::types::Role::Agent);
/// ```
pub fn new_agent_text_message(
    text: impl Into<String>,
    context_id: Option<impl Into<String>>,
    task_id: Option<impl Into<String>>,
) -> Message {
    new_agent_parts_message(vec![Part::text(text)], context_id, task_id)
}

/// Creates an agent message from a list of parts and a generated id.
pub fn new_agent_parts_message(
    parts: Vec<Part>,
    context_id: Option<impl Into<String>>,
    task_id: Option<impl Into<String>>,
) -> Message {
    Message {
        message_id: Uuid::new_v4().to_string(),
        role: Role::Agent,
        kind: "message".to_string(),
        parts,
        context_id: context_id.map(|id| id.into()),
        task_id: task_id.map(|id| id.into()),
        metadata: None,
        extensions: None,
        reference_task_ids: None,
    }
}

/// Joins all text content of a message's parts with the given delimiter.
///
/// Returns an empty string when the message has no text parts.
pub fn get_message_text(message: &Message, delimiter: &str) -> String {
    get_text_parts(&message.parts).join(delimiter)
}
