//! JSON-RPC transport adapter: axum routes translating wire frames into
//! [`RequestHandler`] calls.
//!
//! - `POST /` — JSON-RPC 2.0 dispatch for every A2A method
//! - `GET /.well-known/agent-card.json` — public agent card
//! - `GET /.well-known/agent.json` — deprecated alias, served with a warning
//! - `GET /agent/authenticatedExtendedCard` — deprecated extended-card path
//!
//! Streaming methods answer with SSE; each frame's `data:` line is a
//! JSON-RPC success envelope wrapping one
//! [`StreamResponse`](crate::types::StreamResponse). Requested extensions
//! are parsed from `X-A2A-Extensions`; activated extensions are echoed
//! back, sorted, on the same header.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use futures::stream::Stream;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::A2AError;
use crate::types::{AgentCard, JsonRpcError};
use crate::utils::constants::{
    methods, AGENT_CARD_WELL_KNOWN_PATH, DEFAULT_MAX_PAYLOAD_BYTES, DEFAULT_RPC_PATH,
    EXTENDED_AGENT_CARD_PATH, HTTP_EXTENSION_HEADER, PREV_AGENT_CARD_WELL_KNOWN_PATH,
};
use crate::utils::extensions::{format_activated_extensions, get_requested_extensions};

use super::context::ServerCallContext;
use super::request_handler::{EventStream, RequestHandler};

/// JSON-RPC 2.0 request envelope as received on the wire.
#[derive(Debug, serde::Deserialize)]
struct IncomingRequest {
    jsonrpc: String,
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

/// JSON-RPC 2.0 response envelope as sent on the wire.
#[derive(Debug, serde::Serialize)]
struct OutgoingResponse {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

impl OutgoingResponse {
    fn success(id: Option<Value>, result: Value) -> Self {
        OutgoingResponse {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Option<Value>, err: A2AError) -> Self {
        OutgoingResponse {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(err.into()),
        }
    }
}

/// The JSON-RPC application: the agent card plus the handler it dispatches
/// to.
#[derive(Clone)]
pub struct A2aJsonRpcApp {
    handler: Arc<dyn RequestHandler>,
    agent_card: AgentCard,
    max_payload_bytes: usize,
}

impl A2aJsonRpcApp {
    /// App serving `agent_card` and dispatching to `handler`.
    pub fn new(handler: Arc<dyn RequestHandler>, agent_card: AgentCard) -> Self {
        A2aJsonRpcApp {
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
            .route(AGENT_CARD_WELL_KNOWN_PATH, get(handle_agent_card))
            .route(PREV_AGENT_CARD_WELL_KNOWN_PATH, get(handle_agent_card_deprecated))
            .route(EXTENDED_AGENT_CARD_PATH, get(handle_extended_card_get))
            .route(DEFAULT_RPC_PATH, post(handle_jsonrpc))
            .with_state(state)
    }

    /// [`router`](Self::router) with a permissive CORS layer.
    pub fn router_with_cors(self) -> Router {
        self.router().layer(tower_http::cors::CorsLayer::permissive())
    }

    fn streaming_supported(&self) -> bool {
        self.agent_card.capabilities.streaming.unwrap_or(false)
    }

    fn push_supported(&self) -> bool {
        self.agent_card.capabilities.push_notifications.unwrap_or(false)
    }
}

/// Builds the per-request context from transport metadata.
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

/// Adds the sorted activated-extensions header when any were activated.
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

async fn handle_agent_card(State(state): State<Arc<A2aJsonRpcApp>>) -> impl IntoResponse {
    Json(state.agent_card.clone())
}

async fn handle_agent_card_deprecated(
    State(state): State<Arc<A2aJsonRpcApp>>,
) -> impl IntoResponse {
    warn!(
        "Deprecated agent card endpoint '{}' accessed; use '{}' instead.",
        PREV_AGENT_CARD_WELL_KNOWN_PATH, AGENT_CARD_WELL_KNOWN_PATH
    );
    Json(state.agent_card.clone())
}

/// Deprecated GET surface for the extended card; the JSON-RPC method is the
/// replacement.
async fn handle_extended_card_get(
    State(state): State<Arc<A2aJsonRpcApp>>,
    headers: HeaderMap,
) -> Response {
    warn!(
        "Deprecated extended card endpoint '{}' accessed; use the '{}' JSON-RPC method instead.",
        EXTENDED_AGENT_CARD_PATH,
        methods::AGENT_EXTENDED_CARD
    );
    let context = call_context_from_headers(&headers);
    match state.handler.on_get_extended_agent_card(Some(context)).await {
        Ok(card) => Json(card).into_response(),
        Err(e) => {
            let status = StatusCode::NOT_FOUND;
            (status, Json(serde_json::json!({"error": e.to_string()}))).into_response()
        }
    }
}

async fn handle_jsonrpc(
    State(state): State<Arc<A2aJsonRpcApp>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if body.len() > state.max_payload_bytes {
        return Json(OutgoingResponse::error(
            None,
            A2AError::invalid_request("Payload too large"),
        ))
        .into_response();
    }

    let request: IncomingRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            return Json(OutgoingResponse::error(
                None,
                A2AError::parse_error(format!("Invalid JSON payload: {e}")),
            ))
            .into_response();
        }
    };

    if request.jsonrpc != "2.0" {
        return Json(OutgoingResponse::error(
            request.id,
            A2AError::invalid_request("Invalid JSON-RPC version; must be \"2.0\""),
        ))
        .into_response();
    }

    let context = call_context_from_headers(&headers);
    debug!(method = %request.method, "JSON-RPC request received");

    match request.method.as_str() {
        methods::MESSAGE_SEND => {
            unary(&state, context, request.id, request.params, |h, p, c| async move {
                let result = h.on_message_send(p, c).await?;
                serde_json::to_value(result).map_err(Into::into)
            })
            .await
        }
        methods::MESSAGE_STREAM => {
            if !state.streaming_supported() {
                return Json(OutgoingResponse::error(
                    request.id,
                    A2AError::unsupported_operation("Streaming is not supported by the agent"),
                ))
                .into_response();
            }
            let params = match parse_params(request.params) {
                Ok(p) => p,
                Err(e) => return Json(OutgoingResponse::error(request.id, e)).into_response(),
            };
            match state
                .handler
                .on_message_send_stream(params, Some(context.clone()))
                .await
            {
                Ok(events) => sse_response(request.id, context, events),
                Err(e) => Json(OutgoingResponse::error(request.id, e)).into_response(),
            }
        }
        methods::TASKS_GET => {
            unary(&state, context, request.id, request.params, |h, p, c| async move {
                let task = h.on_get_task(p, c).await?;
                serde_json::to_value(task).map_err(Into::into)
            })
            .await
        }
        methods::TASKS_LIST => {
            unary(&state, context, request.id, request.params, |h, p, c| async move {
                let response = h.on_list_tasks(p, c).await?;
                serde_json::to_value(response).map_err(Into::into)
            })
            .await
        }
        methods::TASKS_CANCEL => {
            unary(&state, context, request.id, request.params, |h, p, c| async move {
                let task = h.on_cancel_task(p, c).await?;
                serde_json::to_value(task).map_err(Into::into)
            })
            .await
        }
        methods::TASKS_SUBSCRIBE | methods::TASKS_RESUBSCRIBE => {
            if !state.streaming_supported() {
                return Json(OutgoingResponse::error(
                    request.id,
                    A2AError::unsupported_operation("Streaming is not supported by the agent"),
                ))
                .into_response();
            }
            let params = match parse_params(request.params) {
                Ok(p) => p,
                Err(e) => return Json(OutgoingResponse::error(request.id, e)).into_response(),
            };
            match state
                .handler
                .on_subscribe_to_task(params, Some(context.clone()))
                .await
            {
                Ok(events) => sse_response(request.id, context, events),
                Err(e) => Json(OutgoingResponse::error(request.id, e)).into_response(),
            }
        }
        methods::PUSH_CONFIG_SET => {
            if !state.push_supported() {
                return push_unsupported(request.id);
            }
            unary(&state, context, request.id, request.params, |h, p, c| async move {
                let config = h.on_set_task_push_notification_config(p, c).await?;
                serde_json::to_value(config).map_err(Into::into)
            })
            .await
        }
        methods::PUSH_CONFIG_GET => {
            if !state.push_supported() {
                return push_unsupported(request.id);
            }
            unary(&state, context, request.id, request.params, |h, p, c| async move {
                let config = h.on_get_task_push_notification_config(p, c).await?;
                serde_json::to_value(config).map_err(Into::into)
            })
            .await
        }
        methods::PUSH_CONFIG_LIST => {
            if !state.push_supported() {
                return push_unsupported(request.id);
            }
            unary(&state, context, request.id, request.params, |h, p, c| async move {
                let configs = h.on_list_task_push_notification_config(p, c).await?;
                serde_json::to_value(configs).map_err(Into::into)
            })
            .await
        }
        methods::PUSH_CONFIG_DELETE => {
            if !state.push_supported() {
                return push_unsupported(request.id);
            }
            unary(&state, context, request.id, request.params, |h, p, c| async move {
                h.on_delete_task_push_notification_config(p, c).await?;
                Ok(Value::Null)
            })
            .await
        }
        methods::AGENT_EXTENDED_CARD => {
            let context_clone = context.clone();
            let result = state
                .handler
                .on_get_extended_agent_card(Some(context_clone))
                .await
                .and_then(|card| serde_json::to_value(card).map_err(Into::into));
            finish_unary(request.id, context, result)
        }
        method => {
            warn!(method = %method, "Unknown JSON-RPC method");
            Json(OutgoingResponse::error(
                request.id,
                A2AError::method_not_found(format!("Method not found: {method}")),
            ))
            .into_response()
        }
    }
}

fn push_unsupported(id: Option<Value>) -> Response {
    Json(OutgoingResponse::error(
        id,
        A2AError::push_notification_not_supported(
            "Push notifications are not supported by the agent",
        ),
    ))
    .into_response()
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, A2AError> {
    serde_json::from_value(params)
        .map_err(|e| A2AError::invalid_params(format!("Invalid parameters: {e}")))
}

/// Parses params, invokes one handler method, and formats the envelope.
async fn unary<T, F, Fut>(
    state: &Arc<A2aJsonRpcApp>,
    context: ServerCallContext,
    id: Option<Value>,
    params: Value,
    call: F,
) -> Response
where
    T: DeserializeOwned,
    F: FnOnce(Arc<dyn RequestHandler>, T, Option<ServerCallContext>) -> Fut,
    Fut: std::future::Future<Output = Result<Value, A2AError>>,
{
    let params = match parse_params(params) {
        Ok(p) => p,
        Err(e) => return Json(OutgoingResponse::error(id, e)).into_response(),
    };
    let result = call(state.handler.clone(), params, Some(context.clone())).await;
    finish_unary(id, context, result)
}

fn finish_unary(
    id: Option<Value>,
    context: ServerCallContext,
    result: Result<Value, A2AError>,
) -> Response {
    let headers = extension_response_headers(&context);
    let body = match result {
        Ok(value) => OutgoingResponse::success(id, value),
        Err(e) => OutgoingResponse::error(id, e),
    };
    (headers, Json(body)).into_response()
}

/// Formats an event stream as SSE: one frame per event, each a JSON-RPC
/// success envelope; errors become a final JSON-RPC error frame.
fn sse_response(id: Option<Value>, context: ServerCallContext, events: EventStream) -> Response {
    let headers = extension_response_headers(&context);
    let stream = make_sse_stream(id, events);
    let mut response = Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response();
    response.headers_mut().extend(headers);
    response
}

fn make_sse_stream(
    id: Option<Value>,
    mut events: EventStream,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        while let Some(item) = events.next().await {
            match item {
                Ok(event) => {
                    let envelope = match serde_json::to_value(&event) {
                        Ok(value) => OutgoingResponse::success(id.clone(), value),
                        Err(e) => OutgoingResponse::error(
                            id.clone(),
                            A2AError::internal_error(format!("Failed to serialize event: {e}")),
                        ),
                    };
                    match serde_json::to_string(&envelope) {
                        Ok(json) => yield Ok(Event::default().data(json)),
                        Err(e) => {
                            warn!(error = %e, "Failed to serialize SSE envelope");
                        }
                    }
                }
                Err(e) => {
                    // Final error frame, then close the stream.
                    let envelope = OutgoingResponse::error(id.clone(), e);
                    if let Ok(json) = serde_json::to_string(&envelope) {
                        yield Ok(Event::default().data(json));
                    }
                    break;
                }
            }
        }
    }
}
