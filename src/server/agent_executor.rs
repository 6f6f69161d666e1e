//! The agent execution contract and the context handed to it.
//!
//! The request handler treats the executor as an opaque producer: `execute`
//! must eventually publish a terminal status, publish a standalone message,
//! or fail; `cancel` is best-effort and should publish a `canceled`
//! terminal status.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::A2AResult;
use crate::types::{Message, Part, SendMessageConfiguration, SendMessageParams, Task};

use super::context::ServerCallContext;
use super::event_queue::EventQueue;
use super::task_store::TaskStore;

/// Everything an agent needs to process one request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// The task being executed.
    pub task_id: String,

    /// The conversation context grouping related tasks.
    pub context_id: String,

    /// The inbound message; `None` for cancel requests.
    pub message: Option<Message>,

    /// The existing task when this continues a previous exchange.
    pub current_task: Option<Task>,

    /// Tasks referenced by the message's `reference_task_ids`.
    pub related_tasks: Vec<Task>,

    /// Client-supplied send configuration.
    pub configuration: Option<SendMessageConfiguration>,

    /// Request metadata.
    pub metadata: Option<Value>,

    /// The per-request server context, when the adapter supplied one.
    pub call_context: Option<ServerCallContext>,
}

impl RequestContext {
    /// All text content of the inbound message, joined by `delimiter`.
    pub fn get_user_input(&self, delimiter: &str) -> String {
        let Some(ref message) = self.message else {
            return String::new();
        };
        message
            .parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(delimiter)
    }

    /// Attaches another task to this context.
    pub fn attach_related_task(&mut self, task: Task) {
        self.related_tasks.push(task);
    }

    /// Extension URIs the client asked to activate.
    pub fn requested_extensions(&self) -> HashSet<String> {
        self.call_context
            .as_ref()
            .map(|ctx| ctx.requested_extensions.clone())
            .unwrap_or_default()
    }

    /// Marks an extension as activated; the adapter echoes it back to the
    /// client.
    pub fn add_activated_extension(&self, uri: String) {
        if let Some(ref ctx) = self.call_context {
            ctx.add_activated_extension(uri);
        }
    }
}

/// Builds [`RequestContext`]s from request parameters.
#[async_trait]
pub trait RequestContextBuilder: Send + Sync {
    /// Builds a context for the given request.
    async fn build(
        &self,
        params: Option<&SendMessageParams>,
        task_id: Option<&str>,
        context_id: Option<&str>,
        task: Option<&Task>,
        call_context: Option<ServerCallContext>,
    ) -> A2AResult<RequestContext>;
}

/// Default [`RequestContextBuilder`]; optionally resolves
/// `reference_task_ids` into `related_tasks` via a [`TaskStore`].
pub struct SimpleRequestContextBuilder {
    task_store: Option<Arc<dyn TaskStore>>,
    should_populate_referred_tasks: bool,
}

impl SimpleRequestContextBuilder {
    /// Builder that fetches referred tasks from `task_store` when
    /// `should_populate_referred_tasks` is set.
    pub fn new(task_store: Option<Arc<dyn TaskStore>>, should_populate_referred_tasks: bool) -> Self {
        SimpleRequestContextBuilder {
            task_store,
            should_populate_referred_tasks,
        }
    }
}

impl Default for SimpleRequestContextBuilder {
    fn default() -> Self {
        Self::new(None, false)
    }
}

#[async_trait]
impl RequestContextBuilder for SimpleRequestContextBuilder {
    async fn build(
        &self,
        params: Option<&SendMessageParams>,
        task_id: Option<&str>,
        context_id: Option<&str>,
        task: Option<&Task>,
        call_context: Option<ServerCallContext>,
    ) -> A2AResult<RequestContext> {
        let mut related_tasks = Vec::new();
        if self.should_populate_referred_tasks {
            if let (Some(store), Some(params)) = (&self.task_store, params) {
                if let Some(ref ref_ids) = params.message.reference_task_ids {
                    for ref_id in ref_ids {
                        if let Ok(Some(t)) = store.get(ref_id).await {
                            related_tasks.push(t);
                        }
                    }
                }
            }
        }

        let resolved_task_id = task_id
            .map(String::from)
            .or_else(|| params.and_then(|p| p.message.task_id.clone()))
            .or_else(|| task.map(|t| t.id.clone()))
            .unwrap_or_default();

        let resolved_context_id = context_id
            .map(String::from)
            .or_else(|| params.and_then(|p| p.message.context_id.clone()))
            .or_else(|| task.map(|t| t.context_id.clone()))
            .unwrap_or_default();

        Ok(RequestContext {
            task_id: resolved_task_id,
            context_id: resolved_context_id,
            message: params.map(|p| p.message.clone()),
            current_task: task.cloned(),
            related_tasks,
            configuration: params.and_then(|p| p.configuration.clone()),
            metadata: params.and_then(|p| p.metadata.clone()),
            call_context,
        })
    }
}

/// The agent's business logic, as consumed by the request handler.
///
/// Implementations must be parallel-safe: several executions may run
/// concurrently for different tasks.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    /// Processes a request, publishing events to the queue.
    ///
    /// Must eventually publish a terminal status update, publish a
    /// standalone [`Message`], or return an error. Returning while the task
    /// is in an interruptible state is allowed; the task can be resumed by
    /// a later message.
    async fn execute(&self, context: RequestContext, event_queue: EventQueue) -> A2AResult<()>;

    /// Requests cancellation of the task in `context.task_id`.
    ///
    /// Best-effort; should publish a `canceled` terminal status or return
    /// an error.
    async fn cancel(&self, context: RequestContext, event_queue: EventQueue) -> A2AResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::task_store::InMemoryTaskStore;
    use crate::types::Role;

    #[tokio::test]
    async fn builder_resolves_ids_from_message() {
        let mut message = Message::user("m1", "hi");
        message.task_id = Some("t1".into());
        message.context_id = Some("c1".into());
        let params = SendMessageParams {
            message,
            configuration: None,
            metadata: None,
        };

        let builder = SimpleRequestContextBuilder::default();
        let ctx = builder.build(Some(&params), None, None, None, None).await.unwrap();
        assert_eq!(ctx.task_id, "t1");
        assert_eq!(ctx.context_id, "c1");
    }

    #[tokio::test]
    async fn builder_populates_referred_tasks() {
        let store = Arc::new(InMemoryTaskStore::new());
        let referred = crate::utils::new_task(Message::user("m0", "earlier")).unwrap();
        store.save(referred.clone()).await.unwrap();

        let mut message = Message::user("m1", "follow-up");
        message.reference_task_ids = Some(vec![referred.id.clone(), "missing".into()]);
        let params = SendMessageParams {
            message,
            configuration: None,
            metadata: None,
        };

        let builder = SimpleRequestContextBuilder::new(Some(store), true);
        let ctx = builder
            .build(Some(&params), Some("t1"), Some("c1"), None, None)
            .await
            .unwrap();
        assert_eq!(ctx.related_tasks.len(), 1);
        assert_eq!(ctx.related_tasks[0].id, referred.id);
    }

    #[test]
    fn user_input_joins_text_parts() {
        let ctx = RequestContext {
            task_id: "t".into(),
            context_id: "c".into(),
            message: Some(Message {
                message_id: "m".into(),
                role: Role::User,
                kind: "message".into(),
                parts: vec![Part::text("one"), Part::text("two")],
                context_id: None,
                task_id: None,
                metadata: None,
                extensions: None,
                reference_task_ids: None,
            }),
            current_task: None,
            related_tasks: vec![],
            configuration: None,
            metadata: None,
            call_context: None,
        };
        assert_eq!(ctx.get_user_input(" "), "one two");
    }
}
