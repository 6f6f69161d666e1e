//! The client transport seam: one trait covering every A2A operation, a
//! per-call context, and the interceptor chain applied to outbound
//! requests.

use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;

use crate::error::{A2AError, A2AResult};
use crate::types::{
    AgentCard, CancelTaskParams, DeleteTaskPushNotificationConfigParams, GetTaskParams,
    GetTaskPushNotificationConfigParams, ListTaskPushNotificationConfigParams, ListTasksParams,
    ListTasksResponse, SendMessageParams, SendMessageResponse, StreamResponse,
    SubscribeToTaskParams, Task, TaskPushNotificationConfig,
};

/// Lazy, single-pass sequence of streaming responses from the server.
pub type ResponseStream = Pin<Box<dyn Stream<Item = A2AResult<StreamResponse>> + Send>>;

/// Per-call client context threaded through interceptors.
///
/// `state` carries interceptor inputs such as the credential session id
/// under `"sessionId"`.
#[derive(Debug, Clone, Default)]
pub struct ClientCallContext {
    /// Arbitrary per-call state.
    pub state: HashMap<String, Value>,
}

impl ClientCallContext {
    /// Context carrying a credential session id.
    pub fn with_session_id(session_id: impl Into<String>) -> Self {
        let mut state = HashMap::new();
        state.insert("sessionId".to_string(), Value::String(session_id.into()));
        ClientCallContext { state }
    }
}

/// Intercepts outbound requests, typically to attach credentials or headers.
#[async_trait]
pub trait ClientCallInterceptor: Send + Sync {
    /// Inspects one outbound call and may add HTTP headers.
    async fn intercept(
        &self,
        method_name: &str,
        request_payload: &Value,
        headers: &mut HashMap<String, String>,
        agent_card: Option<&AgentCard>,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<()>;
}

/// Wire plumbing for one transport binding.
///
/// Implementations exist for JSON-RPC ([`JsonRpcTransport`]), REST
/// ([`RestTransport`]), and subprocess stdio ([`StdioTransport`]); the gRPC
/// label participates in negotiation but its binding is supplied
/// externally through the factory registry.
///
/// [`JsonRpcTransport`]: super::jsonrpc::JsonRpcTransport
/// [`RestTransport`]: super::rest::RestTransport
/// [`StdioTransport`]: super::stdio::StdioTransport
#[async_trait]
pub trait ClientTransport: Send + Sync {
    /// `message/send`.
    async fn send_message(
        &self,
        params: SendMessageParams,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<SendMessageResponse>;

    /// `message/stream`.
    async fn send_message_streaming(
        &self,
        params: SendMessageParams,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<ResponseStream>;

    /// `tasks/get`.
    async fn get_task(
        &self,
        params: GetTaskParams,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<Task>;

    /// `tasks/list`.
    async fn list_tasks(
        &self,
        params: ListTasksParams,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<ListTasksResponse>;

    /// `tasks/cancel`.
    async fn cancel_task(
        &self,
        params: CancelTaskParams,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<Task>;

    /// `tasks/pushNotificationConfig/set`.
    async fn set_task_callback(
        &self,
        params: crate::types::SetTaskPushNotificationConfigParams,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<TaskPushNotificationConfig>;

    /// `tasks/pushNotificationConfig/get`.
    async fn get_task_callback(
        &self,
        params: GetTaskPushNotificationConfigParams,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<TaskPushNotificationConfig>;

    /// `tasks/pushNotificationConfig/list`.
    async fn list_task_callbacks(
        &self,
        params: ListTaskPushNotificationConfigParams,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<Vec<TaskPushNotificationConfig>>;

    /// `tasks/pushNotificationConfig/delete`.
    async fn delete_task_callback(
        &self,
        params: DeleteTaskPushNotificationConfigParams,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<()>;

    /// `tasks/subscribe` / `tasks/resubscribe`.
    async fn subscribe(
        &self,
        params: SubscribeToTaskParams,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<ResponseStream>;

    /// `agent/authenticatedExtendedCard`.
    async fn get_extended_agent_card(
        &self,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<AgentCard>;

    /// Releases held resources. Default is a no-op.
    async fn close(&self) -> A2AResult<()> {
        Ok(())
    }
}

/// Builds an [`A2AError::Http`] from a non-success response, extracting the
/// most useful message the body offers: `title: detail`, then the first of
/// `message`/`detail`/`error`/`title`, then the first string in a list
/// payload, then the raw body, then the status reason.
pub(crate) async fn http_error_from_response(response: reqwest::Response) -> A2AError {
    let status = response.status();
    let headers: HashMap<String, String> = response
        .headers()
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
        .collect();
    let body = response.text().await.ok().filter(|b| !b.is_empty());

    let json_payload: Option<Value> = body
        .as_deref()
        .and_then(|text| serde_json::from_str(text).ok());
    let message = extract_error_message(
        json_payload.as_ref(),
        body.as_deref(),
        status.canonical_reason().unwrap_or("HTTP error"),
    );

    A2AError::Http {
        status: status.as_u16(),
        message,
        body,
        headers,
    }
}

pub(crate) fn extract_error_message(
    json_payload: Option<&Value>,
    body_text: Option<&str>,
    reason: &str,
) -> String {
    fn coerce(value: Option<&Value>) -> Option<String> {
        value
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    }

    let mut message = None;
    match json_payload {
        Some(Value::Object(map)) => {
            let title = coerce(map.get("title"));
            let detail = coerce(map.get("detail"));
            message = match (title, detail) {
                (Some(title), Some(detail)) => Some(format!("{title}: {detail}")),
                _ => ["message", "detail", "error", "title"]
                    .iter()
                    .find_map(|key| coerce(map.get(*key))),
            };
        }
        Some(Value::Array(items)) => {
            message = items.iter().find_map(|item| coerce(Some(item)));
        }
        _ => {}
    }

    message
        .or_else(|| {
            body_text
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        })
        .unwrap_or_else(|| reason.to_string())
}

/// Runs the interceptor chain over one outbound call, collecting headers.
pub(crate) async fn run_interceptors(
    interceptors: &[std::sync::Arc<dyn ClientCallInterceptor>],
    method_name: &str,
    payload: &Value,
    agent_card: Option<&AgentCard>,
    context: Option<&ClientCallContext>,
) -> A2AResult<HashMap<String, String>> {
    let mut headers = HashMap::new();
    for interceptor in interceptors {
        interceptor
            .intercept(method_name, payload, &mut headers, agent_card, context)
            .await?;
    }
    Ok(headers)
}
