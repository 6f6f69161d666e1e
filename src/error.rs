//! Error types — bit-exact JSON-RPC error codes plus the client-side taxonomy.
//!
//! Protocol errors map onto the standard JSON-RPC 2.0 codes (-32700..-32603)
//! and the A2A-specific range (-32001..-32007). Client/transport errors
//! (`Http`, `Timeout`, `InvalidState`, ...) never travel on the wire; they
//! surface to callers of the client stack.

use std::collections::HashMap;

use crate::types::JsonRpcError;

// ---------------------------------------------------------------------------
// Standard JSON-RPC 2.0 error codes
// ---------------------------------------------------------------------------

/// Invalid JSON was received by the server.
pub const PARSE_ERROR: i64 = -32700;

/// The JSON sent is not a valid Request object.
pub const INVALID_REQUEST: i64 = -32600;

/// The method does not exist / is not available.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Invalid method parameter(s).
pub const INVALID_PARAMS: i64 = -32602;

/// Internal JSON-RPC error.
pub const INTERNAL_ERROR: i64 = -32603;

// ---------------------------------------------------------------------------
// A2A-specific error codes
// ---------------------------------------------------------------------------

/// The requested task was not found.
pub const TASK_NOT_FOUND: i64 = -32001;

/// The task cannot be canceled in its current state.
pub const TASK_NOT_CANCELABLE: i64 = -32002;

/// Push notifications are not supported by this agent.
pub const PUSH_NOTIFICATION_NOT_SUPPORTED: i64 = -32003;

/// The requested operation is not supported.
pub const UNSUPPORTED_OPERATION: i64 = -32004;

/// The content type is not supported.
pub const CONTENT_TYPE_NOT_SUPPORTED: i64 = -32005;

/// The agent returned a response violating the event contract.
pub const INVALID_AGENT_RESPONSE: i64 = -32006;

/// Authenticated extended card is not configured.
pub const AUTHENTICATED_EXTENDED_CARD_NOT_CONFIGURED: i64 = -32007;

// ---------------------------------------------------------------------------
// A2AError
// ---------------------------------------------------------------------------

/// Unified error type for protocol, agent, and client-side failures.
///
/// Protocol variants carry a human-readable message and an optional
/// structured `data` payload that is forwarded into the JSON-RPC error
/// object.
#[derive(Debug, Clone, thiserror::Error)]
pub enum A2AError {
    // -- Protocol errors (map to JSON-RPC error codes) --
    /// Invalid JSON payload (-32700).
    #[error("Parse error: {message}")]
    ParseError {
        /// Human-readable message.
        message: String,
        /// Structured error data.
        data: Option<serde_json::Value>,
    },

    /// Request payload validation error (-32600).
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Human-readable message.
        message: String,
        /// Structured error data.
        data: Option<serde_json::Value>,
    },

    /// Method not found (-32601).
    #[error("Method not found: {message}")]
    MethodNotFound {
        /// Human-readable message.
        message: String,
        /// Structured error data.
        data: Option<serde_json::Value>,
    },

    /// Invalid parameters (-32602).
    #[error("Invalid params: {message}")]
    InvalidParams {
        /// Human-readable message.
        message: String,
        /// Structured error data.
        data: Option<serde_json::Value>,
    },

    /// Internal error (-32603).
    #[error("Internal error: {message}")]
    InternalError {
        /// Human-readable message.
        message: String,
        /// Structured error data.
        data: Option<serde_json::Value>,
    },

    /// Task not found (-32001).
    #[error("Task not found: {message}")]
    TaskNotFound {
        /// Human-readable message.
        message: String,
        /// Structured error data.
        data: Option<serde_json::Value>,
    },

    /// Task cannot be canceled (-32002).
    #[error("Task not cancelable: {message}")]
    TaskNotCancelable {
        /// Human-readable message.
        message: String,
        /// Structured error data.
        data: Option<serde_json::Value>,
    },

    /// Push notifications not supported (-32003).
    #[error("Push notification not supported: {message}")]
    PushNotificationNotSupported {
        /// Human-readable message.
        message: String,
        /// Structured error data.
        data: Option<serde_json::Value>,
    },

    /// Operation not supported (-32004).
    #[error("Unsupported operation: {message}")]
    UnsupportedOperation {
        /// Human-readable message.
        message: String,
        /// Structured error data.
        data: Option<serde_json::Value>,
    },

    /// Content type not supported (-32005).
    #[error("Content type not supported: {message}")]
    ContentTypeNotSupported {
        /// Human-readable message.
        message: String,
        /// Structured error data.
        data: Option<serde_json::Value>,
    },

    /// Agent response violated the event contract (-32006).
    #[error("Invalid agent response: {message}")]
    InvalidAgentResponse {
        /// Human-readable message.
        message: String,
        /// Structured error data.
        data: Option<serde_json::Value>,
    },

    /// Authenticated extended card not configured (-32007).
    #[error("Authenticated extended card not configured: {message}")]
    AuthenticatedExtendedCardNotConfigured {
        /// Human-readable message.
        message: String,
        /// Structured error data.
        data: Option<serde_json::Value>,
    },

    // -- Client / transport errors (not wire codes) --
    /// Connection-level failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request or stream timed out.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Non-2xx HTTP response.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Extracted error message.
        message: String,
        /// Raw response body, when read.
        body: Option<String>,
        /// Response headers.
        headers: HashMap<String, String>,
    },

    /// Malformed JSON from the remote side.
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// A JSON-RPC error envelope returned by the remote agent.
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message.
        message: String,
        /// Structured error data.
        data: Option<serde_json::Value>,
    },

    /// Invalid arguments passed to a client API.
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    /// Client state machine violation, e.g. a Message event after a Task in
    /// a stream, or a transport used after close.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Convenience result type for A2A operations.
pub type A2AResult<T> = Result<T, A2AError>;

macro_rules! protocol_ctor {
    ($(#[$doc:meta] $fn_name:ident => $variant:ident),* $(,)?) => {
        $(
            #[$doc]
            pub fn $fn_name(message: impl Into<String>) -> Self {
                Self::$variant {
                    message: message.into(),
                    data: None,
                }
            }
        )*
    };
}

impl A2AError {
    protocol_ctor! {
        /// `ParseError` with a message and no data.
        parse_error => ParseError,
        /// `InvalidRequest` with a message and no data.
        invalid_request => InvalidRequest,
        /// `MethodNotFound` with a message and no data.
        method_not_found => MethodNotFound,
        /// `InvalidParams` with a message and no data.
        invalid_params => InvalidParams,
        /// `InternalError` with a message and no data.
        internal_error => InternalError,
        /// `TaskNotFound` with a message and no data.
        task_not_found => TaskNotFound,
        /// `TaskNotCancelable` with a message and no data.
        task_not_cancelable => TaskNotCancelable,
        /// `PushNotificationNotSupported` with a message and no data.
        push_notification_not_supported => PushNotificationNotSupported,
        /// `UnsupportedOperation` with a message and no data.
        unsupported_operation => UnsupportedOperation,
        /// `ContentTypeNotSupported` with a message and no data.
        content_type_not_supported => ContentTypeNotSupported,
        /// `InvalidAgentResponse` with a message and no data.
        invalid_agent_response => InvalidAgentResponse,
        /// `AuthenticatedExtendedCardNotConfigured` with a message and no data.
        authenticated_extended_card_not_configured => AuthenticatedExtendedCardNotConfigured,
    }

    /// An `Http` error with no body or headers, for cases where only the
    /// status and message are known.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
            body: None,
            headers: HashMap::new(),
        }
    }

    /// The JSON-RPC code for this error.
    ///
    /// Client-side errors that have no wire representation map to -32603.
    pub fn code(&self) -> i64 {
        match self {
            A2AError::ParseError { .. } => PARSE_ERROR,
            A2AError::InvalidRequest { .. } => INVALID_REQUEST,
            A2AError::MethodNotFound { .. } => METHOD_NOT_FOUND,
            A2AError::InvalidParams { .. } => INVALID_PARAMS,
            A2AError::InternalError { .. } => INTERNAL_ERROR,
            A2AError::TaskNotFound { .. } => TASK_NOT_FOUND,
            A2AError::TaskNotCancelable { .. } => TASK_NOT_CANCELABLE,
            A2AError::PushNotificationNotSupported { .. } => PUSH_NOTIFICATION_NOT_SUPPORTED,
            A2AError::UnsupportedOperation { .. } => UNSUPPORTED_OPERATION,
            A2AError::ContentTypeNotSupported { .. } => CONTENT_TYPE_NOT_SUPPORTED,
            A2AError::InvalidAgentResponse { .. } => INVALID_AGENT_RESPONSE,
            A2AError::AuthenticatedExtendedCardNotConfigured { .. } => {
                AUTHENTICATED_EXTENDED_CARD_NOT_CONFIGURED
            }
            A2AError::JsonRpc { code, .. } => *code,
            A2AError::Transport(_)
            | A2AError::Timeout(_)
            | A2AError::Http { .. }
            | A2AError::InvalidJson(_)
            | A2AError::InvalidArgs(_)
            | A2AError::InvalidState(_) => INTERNAL_ERROR,
        }
    }
}

impl From<A2AError> for JsonRpcError {
    fn from(err: A2AError) -> Self {
        let code = err.code();
        let message = err.to_string();
        let data = match &err {
            A2AError::ParseError { data, .. }
            | A2AError::InvalidRequest { data, .. }
            | A2AError::MethodNotFound { data, .. }
            | A2AError::InvalidParams { data, .. }
            | A2AError::InternalError { data, .. }
            | A2AError::TaskNotFound { data, .. }
            | A2AError::TaskNotCancelable { data, .. }
            | A2AError::PushNotificationNotSupported { data, .. }
            | A2AError::UnsupportedOperation { data, .. }
            | A2AError::ContentTypeNotSupported { data, .. }
            | A2AError::InvalidAgentResponse { data, .. }
            | A2AError::AuthenticatedExtendedCardNotConfigured { data, .. }
            | A2AError::JsonRpc { data, .. } => data.clone(),
            _ => None,
        };
        JsonRpcError { code, message, data }
    }
}

impl From<JsonRpcError> for A2AError {
    fn from(err: JsonRpcError) -> Self {
        A2AError::JsonRpc {
            code: err.code,
            message: err.message,
            data: err.data,
        }
    }
}

impl From<serde_json::Error> for A2AError {
    fn from(err: serde_json::Error) -> Self {
        A2AError::ParseError {
            message: err.to_string(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_bit_exact() {
        assert_eq!(PARSE_ERROR, -32700);
        assert_eq!(INVALID_REQUEST, -32600);
        assert_eq!(METHOD_NOT_FOUND, -32601);
        assert_eq!(INVALID_PARAMS, -32602);
        assert_eq!(INTERNAL_ERROR, -32603);
        assert_eq!(TASK_NOT_FOUND, -32001);
        assert_eq!(TASK_NOT_CANCELABLE, -32002);
        assert_eq!(PUSH_NOTIFICATION_NOT_SUPPORTED, -32003);
        assert_eq!(UNSUPPORTED_OPERATION, -32004);
        assert_eq!(CONTENT_TYPE_NOT_SUPPORTED, -32005);
        assert_eq!(INVALID_AGENT_RESPONSE, -32006);
        assert_eq!(AUTHENTICATED_EXTENDED_CARD_NOT_CONFIGURED, -32007);
    }

    #[test]
    fn protocol_error_to_json_rpc() {
        let err = A2AError::task_not_found("task-123");
        let rpc: JsonRpcError = err.into();
        assert_eq!(rpc.code, -32001);
        assert!(rpc.message.contains("task-123"));
        assert!(rpc.data.is_none());
    }

    #[test]
    fn json_rpc_round_trip_preserves_code() {
        let rpc = JsonRpcError {
            code: -32002,
            message: "cannot cancel".to_string(),
            data: Some(serde_json::json!({"state": "completed"})),
        };
        let err: A2AError = rpc.into();
        assert_eq!(err.code(), -32002);
        let back: JsonRpcError = err.into();
        assert_eq!(back.code, -32002);
        assert_eq!(back.data, Some(serde_json::json!({"state": "completed"})));
    }

    #[test]
    fn client_errors_map_to_internal() {
        assert_eq!(A2AError::Transport("refused".into()).code(), INTERNAL_ERROR);
        assert_eq!(A2AError::http(502, "bad gateway").code(), INTERNAL_ERROR);
        assert_eq!(A2AError::InvalidState("no task".into()).code(), INTERNAL_ERROR);
    }

    #[test]
    fn invalid_params_data_propagates() {
        let data = serde_json::json!([{"loc": ["message"], "msg": "field required"}]);
        let err = A2AError::InvalidParams {
            message: "Invalid parameters".to_string(),
            data: Some(data.clone()),
        };
        let rpc: JsonRpcError = err.into();
        assert_eq!(rpc.code, INVALID_PARAMS);
        assert_eq!(rpc.data, Some(data));
    }
}
