//! REST (HTTP+JSON) client transport.
//!
//! Resource-oriented binding against the server's `/v1` routes. Before a
//! streaming response is parsed as SSE, the transport confirms a 2xx status
//! *and* a `text/event-stream` content type; anything else drains the body
//! and surfaces an HTTP error with the best message the body offers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{A2AError, A2AResult};
use crate::types::{
    AgentCard, CancelTaskParams, DeleteTaskPushNotificationConfigParams, GetTaskParams,
    GetTaskPushNotificationConfigParams, ListTaskPushNotificationConfigParams, ListTasksParams,
    ListTasksResponse, SendMessageParams, SendMessageResponse,
    SetTaskPushNotificationConfigParams, SubscribeToTaskParams, Task, TaskPushNotificationConfig,
};

use super::sse::SseStream;
use super::transport::{
    extract_error_message, http_error_from_response, run_interceptors, ClientCallContext,
    ClientCallInterceptor, ClientTransport, ResponseStream,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// REST client transport.
#[derive(Clone)]
pub struct RestTransport {
    client: reqwest::Client,
    base_url: String,
    agent_card: Option<AgentCard>,
    interceptors: Vec<Arc<dyn ClientCallInterceptor>>,
    timeout: Duration,
}

impl std::fmt::Debug for RestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestTransport")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RestTransport {
    /// Transport rooted at the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), None, base_url, Vec::new())
    }

    /// Transport with a shared HTTP client, an agent card for the
    /// interceptors, and an interceptor chain.
    pub fn with_client(
        client: reqwest::Client,
        agent_card: Option<AgentCard>,
        base_url: impl Into<String>,
        interceptors: Vec<Arc<dyn ClientCallInterceptor>>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        RestTransport {
            client,
            base_url,
            agent_card,
            interceptors,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the unary request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn map_send_error(e: reqwest::Error) -> A2AError {
        if e.is_timeout() {
            A2AError::Timeout(format!("request timed out: {e}"))
        } else if e.is_connect() {
            A2AError::Transport(format!("connection failed: {e}"))
        } else {
            A2AError::Transport(format!("HTTP request failed: {e}"))
        }
    }

    async fn send(
        &self,
        method_name: &str,
        mut request: reqwest::RequestBuilder,
        payload: &Value,
        context: Option<&ClientCallContext>,
        streaming: bool,
    ) -> A2AResult<reqwest::Response> {
        let headers = run_interceptors(
            &self.interceptors,
            method_name,
            payload,
            self.agent_card.as_ref(),
            context,
        )
        .await?;
        for (key, value) in headers {
            request = request.header(key, value);
        }
        if streaming {
            request = request.header("Accept", "text/event-stream");
        } else {
            request = request.timeout(self.timeout);
        }

        request.send().await.map_err(Self::map_send_error)
    }

    async fn unary<T: DeserializeOwned>(
        &self,
        method_name: &str,
        request: reqwest::RequestBuilder,
        payload: Value,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<T> {
        let response = self
            .send(method_name, request, &payload, context, false)
            .await?;
        if !response.status().is_success() {
            return Err(http_error_from_response(response).await);
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| A2AError::Transport(format!("failed to read response body: {e}")))?;
        if bytes.is_empty() {
            // 204-style responses deserialize from null.
            return serde_json::from_value(Value::Null)
                .map_err(|e| A2AError::InvalidJson(format!("unexpected empty response: {e}")));
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| A2AError::InvalidJson(format!("unexpected response shape: {e}")))
    }

    async fn streaming(
        &self,
        method_name: &str,
        request: reqwest::RequestBuilder,
        payload: Value,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<ResponseStream> {
        let response = self
            .send(method_name, request, &payload, context, true)
            .await?;
        let response = ensure_streaming_response(response).await?;
        Ok(SseStream::from_response(response).into_stream().boxed())
    }
}

/// Validates the initial streaming response before SSE parsing: the status
/// must be 2xx and the content type must contain `text/event-stream`.
async fn ensure_streaming_response(response: reqwest::Response) -> A2AResult<reqwest::Response> {
    if !response.status().is_success() {
        return Err(http_error_from_response(response).await);
    }

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let is_event_stream = content_type
        .as_deref()
        .map(|ct| ct.to_ascii_lowercase().contains("text/event-stream"))
        .unwrap_or(false);
    if is_event_stream {
        return Ok(response);
    }

    let status = response.status();
    let headers: std::collections::HashMap<String, String> = response
        .headers()
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
        .collect();
    let body = response.text().await.ok().filter(|b| !b.is_empty());
    let descriptor = content_type.unwrap_or_else(|| "missing".to_string());

    Err(A2AError::Http {
        status: status.as_u16(),
        message: format!("Unexpected Content-Type '{descriptor}' for streaming response"),
        body,
        headers,
    })
}

#[async_trait]
impl ClientTransport for RestTransport {
    async fn send_message(
        &self,
        params: SendMessageParams,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<SendMessageResponse> {
        let payload = serde_json::to_value(&params)?;
        debug!(url = %self.url("/v1/message:send"), "REST message:send");
        let request = self.client.post(self.url("/v1/message:send")).json(&payload);
        self.unary("message/send", request, payload, context).await
    }

    async fn send_message_streaming(
        &self,
        params: SendMessageParams,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<ResponseStream> {
        let payload = serde_json::to_value(&params)?;
        let request = self.client.post(self.url("/v1/message:stream")).json(&payload);
        self.streaming("message/stream", request, payload, context).await
    }

    async fn get_task(
        &self,
        params: GetTaskParams,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<Task> {
        let mut request = self.client.get(self.url(&format!("/v1/tasks/{}", params.id)));
        if let Some(len) = params.history_length {
            request = request.query(&[("historyLength", len.to_string())]);
        }
        self.unary("tasks/get", request, Value::Null, context).await
    }

    async fn list_tasks(
        &self,
        params: ListTasksParams,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<ListTasksResponse> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(ref v) = params.context_id {
            query.push(("contextId", v.clone()));
        }
        if let Some(status) = params.status {
            query.push(("status", status.to_string()));
        }
        if let Some(ref v) = params.status_timestamp_after {
            query.push(("statusTimestampAfter", v.clone()));
        }
        if let Some(v) = params.page_size {
            query.push(("pageSize", v.to_string()));
        }
        if let Some(ref v) = params.page_token {
            query.push(("pageToken", v.clone()));
        }
        if let Some(v) = params.history_length {
            query.push(("historyLength", v.to_string()));
        }

        let request = self.client.get(self.url("/v1/tasks")).query(&query);
        self.unary("tasks/list", request, Value::Null, context).await
    }

    async fn cancel_task(
        &self,
        params: CancelTaskParams,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<Task> {
        let request = self
            .client
            .post(self.url(&format!("/v1/tasks/{}:cancel", params.id)));
        self.unary("tasks/cancel", request, Value::Null, context).await
    }

    async fn set_task_callback(
        &self,
        params: SetTaskPushNotificationConfigParams,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<TaskPushNotificationConfig> {
        let payload = serde_json::to_value(&params.push_notification_config)?;
        let request = self
            .client
            .post(self.url(&format!("/v1/tasks/{}/pushNotificationConfigs", params.task_id)))
            .json(&payload);
        self.unary("tasks/pushNotificationConfig/set", request, payload, context)
            .await
    }

    async fn get_task_callback(
        &self,
        params: GetTaskPushNotificationConfigParams,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<TaskPushNotificationConfig> {
        let config_id = params
            .push_notification_config_id
            .clone()
            .unwrap_or_else(|| params.id.clone());
        let request = self.client.get(self.url(&format!(
            "/v1/tasks/{}/pushNotificationConfigs/{}",
            params.id, config_id
        )));
        self.unary("tasks/pushNotificationConfig/get", request, Value::Null, context)
            .await
    }

    async fn list_task_callbacks(
        &self,
        params: ListTaskPushNotificationConfigParams,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<Vec<TaskPushNotificationConfig>> {
        let request = self
            .client
            .get(self.url(&format!("/v1/tasks/{}/pushNotificationConfigs", params.id)));
        self.unary("tasks/pushNotificationConfig/list", request, Value::Null, context)
            .await
    }

    async fn delete_task_callback(
        &self,
        params: DeleteTaskPushNotificationConfigParams,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<()> {
        let request = self.client.delete(self.url(&format!(
            "/v1/tasks/{}/pushNotificationConfigs/{}",
            params.id, params.push_notification_config_id
        )));
        let response = self
            .send("tasks/pushNotificationConfig/delete", request, &Value::Null, context, false)
            .await?;
        if !response.status().is_success() {
            return Err(http_error_from_response(response).await);
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        params: SubscribeToTaskParams,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<ResponseStream> {
        let request = self
            .client
            .get(self.url(&format!("/v1/tasks/{}:subscribe", params.id)));
        self.streaming("tasks/subscribe", request, Value::Null, context).await
    }

    async fn get_extended_agent_card(
        &self,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<AgentCard> {
        let request = self.client.get(self.url("/v1/card"));
        self.unary("agent/authenticatedExtendedCard", request, Value::Null, context)
            .await
    }
}
