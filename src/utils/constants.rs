//! Protocol constants: well-known paths, header names, method names, and
//! transport labels.

/// Well-known path for the public agent card.
pub const AGENT_CARD_WELL_KNOWN_PATH: &str = "/.well-known/agent-card.json";

/// Deprecated well-known path for the agent card; served with a deprecation
/// warning.
pub const PREV_AGENT_CARD_WELL_KNOWN_PATH: &str = "/.well-known/agent.json";

/// Deprecated GET path for the authenticated extended card (superseded by
/// the `agent/authenticatedExtendedCard` JSON-RPC method).
pub const EXTENDED_AGENT_CARD_PATH: &str = "/agent/authenticatedExtendedCard";

/// Default JSON-RPC endpoint path.
pub const DEFAULT_RPC_PATH: &str = "/";

/// Default maximum request payload, in bytes (10 MiB).
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 10 * 1024 * 1024;

/// HTTP header carrying requested / activated extension URIs.
pub const HTTP_EXTENSION_HEADER: &str = "X-A2A-Extensions";

/// HTTP header carrying the push notification verification token.
pub const NOTIFICATION_TOKEN_HEADER: &str = "X-A2A-Notification-Token";

/// Transport label for JSON-RPC 2.0 over HTTP.
pub const TRANSPORT_JSONRPC: &str = "JSONRPC";

/// Transport label for the REST (HTTP+JSON) binding.
pub const TRANSPORT_HTTP_JSON: &str = "HTTP+JSON";

/// Transport label for gRPC.
pub const TRANSPORT_GRPC: &str = "GRPC";

/// Transport label for the subprocess stdio binding.
pub const TRANSPORT_STDIO: &str = "stdio";

/// JSON-RPC method names.
pub mod methods {
    /// `message/send`
    pub const MESSAGE_SEND: &str = "message/send";
    /// `message/stream`
    pub const MESSAGE_STREAM: &str = "message/stream";
    /// `tasks/get`
    pub const TASKS_GET: &str = "tasks/get";
    /// `tasks/list`
    pub const TASKS_LIST: &str = "tasks/list";
    /// `tasks/cancel`
    pub const TASKS_CANCEL: &str = "tasks/cancel";
    /// `tasks/subscribe`
    pub const TASKS_SUBSCRIBE: &str = "tasks/subscribe";
    /// `tasks/resubscribe`
    pub const TASKS_RESUBSCRIBE: &str = "tasks/resubscribe";
    /// `tasks/pushNotificationConfig/set`
    pub const PUSH_CONFIG_SET: &str = "tasks/pushNotificationConfig/set";
    /// `tasks/pushNotificationConfig/get`
    pub const PUSH_CONFIG_GET: &str = "tasks/pushNotificationConfig/get";
    /// `tasks/pushNotificationConfig/list`
    pub const PUSH_CONFIG_LIST: &str = "tasks/pushNotificationConfig/list";
    /// `tasks/pushNotificationConfig/delete`
    pub const PUSH_CONFIG_DELETE: &str = "tasks/pushNotificationConfig/delete";
    /// `agent/authenticatedExtendedCard`
    pub const AGENT_EXTENDED_CARD: &str = "agent/authenticatedExtendedCard";
}
