//! REST (HTTP+JSON) transport adapter: resource-oriented axum routes over
//! the same [`RequestHandler`].
//!
//! Routes (all under `/v1`):
//!
//! | Method | Path | Operation |
//! |---|---|---|
//! | POST | `/v1/message:send` | message send |
//! | POST | `/v1/message:stream` | message send, SSE |
//! | GET | `/v1/tasks` | list tasks |
//! | GET | `/v1/tasks/{id}` | get task |
//! | GET | `/v1/tasks/{id}:subscribe` | subscribe, SSE |
//! | POST | `/v1/tasks/{id}:cancel` | cancel task |
//! | POST | `/v1/tasks/{id}/pushNotificationConfigs` | create config |
//! | GET | `/v1/tasks/{id}/pushNotificationConfigs` | list configs |
//! | GET | `/v1/tasks/{id}/pushNotificationConfigs/{cid}` | get config |
//! | DELETE | `/v1/tasks/{id}/pushNotificationConfigs/{cid}` | delete config |
//! | GET | `/v1/card` | public agent card |
//!
//! The `{id}:verb` forms share one route parameter; the verb suffix is
//! split off in the handler. SSE frames carry one raw [`StreamResponse`]
//! per `data:` line. Errors become problem-details JSON with an
//! HTTP-appropriate status.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use futures::stream::Stream;
use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{self, A2AError};
use crate::types::{
    AgentCard, CancelTaskParams, DeleteTaskPushNotificationConfigParams, GetTaskParams,
    GetTaskPushNotificationConfigParams, ListTaskPushNotificationConfigParams, ListTasksParams,
    PushNotificationConfig, SendMessageParams, StreamResponse, SubscribeToTaskParams, TaskState,
};
use crate::utils::constants::{DEFAULT_MAX_PAYLOAD_BYTES, HTTP_EXTENSION_HEADER};
use crate::utils::extensions::{format_activated_extensions, get_requested_extensions};

use super::context::ServerCallContext;
use super::request_handler::{EventStream, RequestHandler};

/// The REST application: the agent card plus the handler it dispatches to.
#[derive(Clone)]
pub struct A2aRestApp {
    handler: Arc<dyn RequestHandler>,
    agent_card: AgentCard,
    max_payload_bytes: usize,
}

impl A2aRestApp {
    /// App serving `agent_card` and dispatching to `handler`.
    pub fn new(handler: Arc<dyn RequestHandler>, agent_card: AgentCard) -> Self {
        A2aRestApp {
            handler,
            agent_card,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }

    /// Overrides the request payload limit.
    pub fn with_max_payload_bytes(mut self, bytes: usize) -> Self {
        self.max_payload_bytes = bytes;
        self
    }

    /// Builds the axum router.
    pub fn router(self) -> Router {
        let state = Arc::new(self);
        Router::new()
            .route("/v1/message:send", axum::routing::post(handle_message_send))
            .route("/v1/message:stream", axum::routing::post(handle_message_stream))
            .route("/v1/tasks", get(handle_list_tasks))
            .route(
                "/v1/tasks/{id}",
                get(handle_task_get_or_subscribe).post(handle_task_action),
            )
            .route(
                "/v1/tasks/{id}/pushNotificationConfigs",
                get(handle_push_config_list).post(handle_push_config_set),
            )
            .route(
                "/v1/tasks/{id}/pushNotificationConfigs/{config_id}",
                get(handle_push_config_get).delete(handle_push_config_delete),
            )
            .route("/v1/card", get(handle_card))
            .with_state(state)
    }

    fn streaming_supported(&self) -> bool {
        self.agent_card.capabilities.streaming.unwrap_or(false)
    }

    fn push_supported(&self) -> bool {
        self.agent_card.capabilities.push_notifications.unwrap_or(false)
    }
}

fn call_context_from_headers(headers: &HeaderMap) -> ServerCallContext {
    let values: Vec<String> = headers
        .get_all(HTTP_EXTENSION_HEADER)
        .iter()
        .filter_map(|v| v.to_str().ok().map(String::from))
        .collect();

    ServerCallContext {
        requested_extensions: get_requested_extensions(&values),
        ..Default::default()
    }
}

fn extension_response_headers(context: &ServerCallContext) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let activated = context.activated_extensions();
    if !activated.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&format_activated_extensions(&activated)) {
            headers.insert(HeaderName::from_static("x-a2a-extensions"), value);
        }
    }
    headers
}

/// HTTP status for a protocol error.
fn http_status(err: &A2AError) -> StatusCode {
    match err.code() {
        error::PARSE_ERROR | error::INVALID_REQUEST | error::INVALID_PARAMS => {
            StatusCode::BAD_REQUEST
        }
        error::TASK_NOT_FOUND => StatusCode::NOT_FOUND,
        error::TASK_NOT_CANCELABLE => StatusCode::CONFLICT,
        error::CONTENT_TYPE_NOT_SUPPORTED => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        error::UNSUPPORTED_OPERATION | error::PUSH_NOTIFICATION_NOT_SUPPORTED => {
            StatusCode::NOT_IMPLEMENTED
        }
        error::METHOD_NOT_FOUND => StatusCode::NOT_FOUND,
        error::AUTHENTICATED_EXTENDED_CARD_NOT_CONFIGURED => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Problem-details JSON for a protocol error.
fn error_response(err: A2AError) -> Response {
    let status = http_status(&err);
    let body = serde_json::json!({
        "code": err.code(),
        "message": err.to_string(),
    });
    (status, Json(body)).into_response()
}

fn parse_body<T: serde::de::DeserializeOwned>(
    state: &A2aRestApp,
    body: &Bytes,
) -> Result<T, A2AError> {
    if body.len() > state.max_payload_bytes {
        return Err(A2AError::invalid_request("Payload too large"));
    }
    serde_json::from_slice(body)
        .map_err(|e| A2AError::invalid_request(format!("Invalid request body: {e}")))
}

fn ok_json<T: serde::Serialize>(context: &ServerCallContext, value: &T) -> Response {
    (extension_response_headers(context), Json(serde_json::json!(value))).into_response()
}

async fn handle_card(State(state): State<Arc<A2aRestApp>>) -> impl IntoResponse {
    Json(state.agent_card.clone())
}

async fn handle_message_send(
    State(state): State<Arc<A2aRestApp>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let context = call_context_from_headers(&headers);
    let params: SendMessageParams = match parse_body(&state, &body) {
        Ok(p) => p,
        Err(e) => return error_response(e),
    };
    debug!("REST message:send received");
    match state.handler.on_message_send(params, Some(context.clone())).await {
        Ok(response) => ok_json(&context, &response),
        Err(e) => error_response(e),
    }
}

async fn handle_message_stream(
    State(state): State<Arc<A2aRestApp>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !state.streaming_supported() {
        return error_response(A2AError::unsupported_operation(
            "Streaming is not supported by the agent",
        ));
    }
    let context = call_context_from_headers(&headers);
    let params: SendMessageParams = match parse_body(&state, &body) {
        Ok(p) => p,
        Err(e) => return error_response(e),
    };
    match state
        .handler
        .on_message_send_stream(params, Some(context.clone()))
        .await
    {
        Ok(events) => sse_response(context, events),
        Err(e) => error_response(e),
    }
}

/// Query parameters for `GET /v1/tasks/{id}`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetTaskQuery {
    history_length: Option<i32>,
}

async fn handle_task_get_or_subscribe(
    State(state): State<Arc<A2aRestApp>>,
    Path(id): Path<String>,
    Query(query): Query<GetTaskQuery>,
    headers: HeaderMap,
) -> Response {
    let context = call_context_from_headers(&headers);

    if let Some(task_id) = id.strip_suffix(":subscribe") {
        if !state.streaming_supported() {
            return error_response(A2AError::unsupported_operation(
                "Streaming is not supported by the agent",
            ));
        }
        let params = SubscribeToTaskParams {
            id: task_id.to_string(),
            metadata: None,
        };
        return match state
            .handler
            .on_subscribe_to_task(params, Some(context.clone()))
            .await
        {
            Ok(events) => sse_response(context, events),
            Err(e) => error_response(e),
        };
    }

    let params = GetTaskParams {
        id,
        history_length: query.history_length,
        metadata: None,
    };
    match state.handler.on_get_task(params, Some(context.clone())).await {
        Ok(task) => ok_json(&context, &task),
        Err(e) => error_response(e),
    }
}

async fn handle_task_action(
    State(state): State<Arc<A2aRestApp>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let context = call_context_from_headers(&headers);

    let Some(task_id) = id.strip_suffix(":cancel") else {
        return error_response(A2AError::method_not_found(format!(
            "No POST action on /v1/tasks/{id}"
        )));
    };

    let params = CancelTaskParams {
        id: task_id.to_string(),
        metadata: None,
    };
    match state.handler.on_cancel_task(params, Some(context.clone())).await {
        Ok(task) => ok_json(&context, &task),
        Err(e) => error_response(e),
    }
}

/// Query parameters for `GET /v1/tasks`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListTasksQuery {
    context_id: Option<String>,
    status: Option<TaskState>,
    status_timestamp_after: Option<String>,
    page_size: Option<i32>,
    page_token: Option<String>,
    history_length: Option<i32>,
}

async fn handle_list_tasks(
    State(state): State<Arc<A2aRestApp>>,
    Query(query): Query<ListTasksQuery>,
    headers: HeaderMap,
) -> Response {
    let context = call_context_from_headers(&headers);
    let params = ListTasksParams {
        context_id: query.context_id,
        status: query.status,
        status_timestamp_after: query.status_timestamp_after,
        page_size: query.page_size,
        page_token: query.page_token,
        history_length: query.history_length,
    };
    match state.handler.on_list_tasks(params, Some(context.clone())).await {
        Ok(response) => ok_json(&context, &response),
        Err(e) => error_response(e),
    }
}

async fn handle_push_config_set(
    State(state): State<Arc<A2aRestApp>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !state.push_supported() {
        return error_response(A2AError::push_notification_not_supported(
            "Push notifications are not supported by the agent",
        ));
    }
    let context = call_context_from_headers(&headers);
    let config: PushNotificationConfig = match parse_body(&state, &body) {
        Ok(c) => c,
        Err(e) => return error_response(e),
    };
    let params = crate::types::SetTaskPushNotificationConfigParams {
        task_id: id,
        push_notification_config: config,
    };
    match state
        .handler
        .on_set_task_push_notification_config(params, Some(context.clone()))
        .await
    {
        Ok(config) => ok_json(&context, &config),
        Err(e) => error_response(e),
    }
}

async fn handle_push_config_list(
    State(state): State<Arc<A2aRestApp>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !state.push_supported() {
        return error_response(A2AError::push_notification_not_supported(
            "Push notifications are not supported by the agent",
        ));
    }
    let context = call_context_from_headers(&headers);
    let params = ListTaskPushNotificationConfigParams { id };
    match state
        .handler
        .on_list_task_push_notification_config(params, Some(context.clone()))
        .await
    {
        Ok(configs) => ok_json(&context, &configs),
        Err(e) => error_response(e),
    }
}

async fn handle_push_config_get(
    State(state): State<Arc<A2aRestApp>>,
    Path((id, config_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if !state.push_supported() {
        return error_response(A2AError::push_notification_not_supported(
            "Push notifications are not supported by the agent",
        ));
    }
    let context = call_context_from_headers(&headers);
    let params = GetTaskPushNotificationConfigParams {
        id,
        push_notification_config_id: Some(config_id),
    };
    match state
        .handler
        .on_get_task_push_notification_config(params, Some(context.clone()))
        .await
    {
        Ok(config) => ok_json(&context, &config),
        Err(e) => error_response(e),
    }
}

async fn handle_push_config_delete(
    State(state): State<Arc<A2aRestApp>>,
    Path((id, config_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if !state.push_supported() {
        return error_response(A2AError::push_notification_not_supported(
            "Push notifications are not supported by the agent",
        ));
    }
    let context = call_context_from_headers(&headers);
    let params = DeleteTaskPushNotificationConfigParams {
        id,
        push_notification_config_id: config_id,
    };
    match state
        .handler
        .on_delete_task_push_notification_config(params, Some(context.clone()))
        .await
    {
        Ok(()) => (
            extension_response_headers(&context),
            StatusCode::NO_CONTENT,
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// One raw `StreamResponse` JSON object per SSE frame.
fn sse_response(context: ServerCallContext, events: EventStream) -> Response {
    let headers = extension_response_headers(&context);
    let stream = make_sse_stream(events);
    let mut response = Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response();
    response.headers_mut().extend(headers);
    response
}

fn make_sse_stream(mut events: EventStream) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        while let Some(item) = events.next().await {
            match item {
                Ok(event) => match serde_json::to_string::<StreamResponse>(&event) {
                    Ok(json) => yield Ok(Event::default().data(json)),
                    Err(e) => {
                        warn!(error = %e, "Failed to serialize SSE frame");
                    }
                },
                Err(e) => {
                    let body = serde_json::json!({
                        "code": e.code(),
                        "message": e.to_string(),
                    });
                    yield Ok(Event::default().data(body.to_string()));
                    break;
                }
            }
        }
    }
}
