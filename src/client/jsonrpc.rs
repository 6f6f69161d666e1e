//! JSON-RPC 2.0 client transport over HTTP.
//!
//! Every operation POSTs a `{"jsonrpc":"2.0", ...}` envelope to the agent's
//! root URL. Streaming methods read the response as SSE, each frame being a
//! JSON-RPC success envelope carrying one
//! [`StreamResponse`](crate::types::StreamResponse). Unary calls use the
//! configured timeout; streaming calls run without one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::error::{A2AError, A2AResult};
use crate::types::{
    AgentCard, CancelTaskParams, DeleteTaskPushNotificationConfigParams, GetTaskParams,
    GetTaskPushNotificationConfigParams, JsonRpcResponse, ListTaskPushNotificationConfigParams,
    ListTasksParams, ListTasksResponse, SendMessageParams, SendMessageResponse,
    SetTaskPushNotificationConfigParams, SubscribeToTaskParams, Task, TaskPushNotificationConfig,
};
use crate::utils::constants::methods;

use super::sse::SseStream;
use super::transport::{
    http_error_from_response, run_interceptors, ClientCallContext, ClientCallInterceptor,
    ClientTransport, ResponseStream,
};

/// Default timeout for unary requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// JSON-RPC over HTTP transport.
#[derive(Clone)]
pub struct JsonRpcTransport {
    client: reqwest::Client,
    url: String,
    agent_card: Option<AgentCard>,
    interceptors: Vec<Arc<dyn ClientCallInterceptor>>,
    timeout: Duration,
}

impl std::fmt::Debug for JsonRpcTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcTransport")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl JsonRpcTransport {
    /// Transport posting to the given endpoint URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), None, url, Vec::new())
    }

    /// Transport with a shared HTTP client, an agent card for the
    /// interceptors, and an interceptor chain.
    pub fn with_client(
        client: reqwest::Client,
        agent_card: Option<AgentCard>,
        url: impl Into<String>,
        interceptors: Vec<Arc<dyn ClientCallInterceptor>>,
    ) -> Self {
        JsonRpcTransport {
            client,
            url: url.into(),
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

    /// The endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn envelope(method: &str, params: Value) -> Value {
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": Uuid::new_v4().to_string(),
            "method": method,
            "params": params,
        })
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

    async fn post(
        &self,
        method: &str,
        params: Value,
        context: Option<&ClientCallContext>,
        streaming: bool,
    ) -> A2AResult<reqwest::Response> {
        let payload = Self::envelope(method, params);
        let headers = run_interceptors(
            &self.interceptors,
            method,
            &payload,
            self.agent_card.as_ref(),
            context,
        )
        .await?;

        debug!(method, url = %self.url, "Sending JSON-RPC request");

        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json");
        if streaming {
            request = request.header("Accept", "text/event-stream");
        } else {
            request = request.timeout(self.timeout);
        }
        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request
            .json(&payload)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        if !response.status().is_success() {
            return Err(http_error_from_response(response).await);
        }
        Ok(response)
    }

    /// One unary call: envelope, interceptors, POST, unwrap the result.
    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<T> {
        let response = self.post(method, params, context, false).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| A2AError::Transport(format!("failed to read response body: {e}")))?;

        let rpc: JsonRpcResponse = serde_json::from_slice(&bytes)
            .map_err(|e| A2AError::InvalidJson(format!("invalid JSON-RPC response: {e}")))?;

        if let Some(error) = rpc.error {
            return Err(error.into());
        }
        let result = rpc
            .result
            .ok_or_else(|| A2AError::InvalidJson("response has neither result nor error".into()))?;
        serde_json::from_value(result)
            .map_err(|e| A2AError::InvalidJson(format!("unexpected result shape: {e}")))
    }

    /// One streaming call: envelope, interceptors, POST, SSE re-assembly.
    async fn request_stream(
        &self,
        method: &str,
        params: Value,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<ResponseStream> {
        let response = self.post(method, params, context, true).await?;
        let stream = SseStream::from_response(response).into_stream();
        Ok(stream.boxed())
    }
}

#[async_trait]
impl ClientTransport for JsonRpcTransport {
    async fn send_message(
        &self,
        params: SendMessageParams,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<SendMessageResponse> {
        self.request(methods::MESSAGE_SEND, serde_json::to_value(params)?, context)
            .await
    }

    async fn send_message_streaming(
        &self,
        params: SendMessageParams,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<ResponseStream> {
        self.request_stream(methods::MESSAGE_STREAM, serde_json::to_value(params)?, context)
            .await
    }

    async fn get_task(
        &self,
        params: GetTaskParams,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<Task> {
        self.request(methods::TASKS_GET, serde_json::to_value(params)?, context)
            .await
    }

    async fn list_tasks(
        &self,
        params: ListTasksParams,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<ListTasksResponse> {
        self.request(methods::TASKS_LIST, serde_json::to_value(params)?, context)
            .await
    }

    async fn cancel_task(
        &self,
        params: CancelTaskParams,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<Task> {
        self.request(methods::TASKS_CANCEL, serde_json::to_value(params)?, context)
            .await
    }

    async fn set_task_callback(
        &self,
        params: SetTaskPushNotificationConfigParams,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<TaskPushNotificationConfig> {
        self.request(methods::PUSH_CONFIG_SET, serde_json::to_value(params)?, context)
            .await
    }

    async fn get_task_callback(
        &self,
        params: GetTaskPushNotificationConfigParams,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<TaskPushNotificationConfig> {
        self.request(methods::PUSH_CONFIG_GET, serde_json::to_value(params)?, context)
            .await
    }

    async fn list_task_callbacks(
        &self,
        params: ListTaskPushNotificationConfigParams,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<Vec<TaskPushNotificationConfig>> {
        self.request(methods::PUSH_CONFIG_LIST, serde_json::to_value(params)?, context)
            .await
    }

    async fn delete_task_callback(
        &self,
        params: DeleteTaskPushNotificationConfigParams,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<()> {
        let _: Value = self
            .request(methods::PUSH_CONFIG_DELETE, serde_json::to_value(params)?, context)
            .await?;
        Ok(())
    }

    async fn subscribe(
        &self,
        params: SubscribeToTaskParams,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<ResponseStream> {
        self.request_stream(
            methods::TASKS_RESUBSCRIBE,
            serde_json::to_value(params)?,
            context,
        )
        .await
    }

    async fn get_extended_agent_card(
        &self,
        context: Option<&ClientCallContext>,
    ) -> A2AResult<AgentCard> {
        self.request(methods::AGENT_EXTENDED_CARD, Value::Object(Default::default()), context)
            .await
    }
}
