//! # a2a-sdk — Rust SDK for the Agent-to-Agent (A2A) protocol
//!
//! Client and server runtimes for a cross-transport RPC protocol in which
//! agents exchange messages, execute long-running tasks, and stream
//! incremental status and artifact updates.
//!
//! ## What's inside
//!
//! **Server** (`server` feature, on by default):
//! - [`server::AgentExecutor`] — the contract your agent implements
//! - [`server::DefaultRequestHandler`] — the transport-agnostic core:
//!   blocking/non-blocking/streaming sends, get/cancel/list, subscribe,
//!   push-notification CRUD, extended card
//! - The event pipeline: [`server::EventQueue`] (bounded, closable,
//!   tappable), [`server::QueueManager`], [`server::EventConsumer`],
//!   [`server::ResultAggregator`], [`server::TaskManager`]
//! - [`server::A2aJsonRpcApp`] and [`server::A2aRestApp`] — axum adapters
//!   for the JSON-RPC and REST bindings, with SSE streaming
//! - [`server::TaskStore`] + [`server::InMemoryTaskStore`],
//!   push-notification config storage and webhook fan-out
//!
//! **Client** (`client` feature, on by default):
//! - [`client::ClientFactory`] — transport negotiation from the agent card
//! - [`client::BaseClient`] — unified send/stream API with client-side
//!   task folding and a consumer chain
//! - [`client::JsonRpcTransport`], [`client::RestTransport`],
//!   [`client::StdioTransport`]
//! - [`client::AuthInterceptor`] — credentials from the card's security
//!   schemes
//! - [`client::CardResolver`] — well-known-path discovery
//!
//! **Shared**: the full wire type surface in [`types`], the protocol error
//! taxonomy in [`error`], and helpers (including agent-card
//! canonicalization and detached-JWS signing) in [`utils`].
//!
//! ## Server quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use a2a_sdk::builders::AgentCardBuilder;
//! use a2a_sdk::server::*;
//!
//! struct EchoAgent;
//!
//! #[async_trait::async_trait]
//! impl AgentExecutor for EchoAgent {
//!     async fn execute(&self, ctx: RequestContext, queue: EventQueue) -> a2a_sdk::A2AResult<()> {
//!         let updater = TaskUpdater::new(queue, ctx.task_id.clone(), ctx.context_id.clone());
//!         let text = ctx.get_user_input(" ");
//!         let reply = updater.new_agent_message(
//!             vec![a2a_sdk::types::Part::text(format!("Echo: {text}"))],
//!             None,
//!         );
//!         updater.complete(Some(reply)).await
//!     }
//!
//!     async fn cancel(&self, ctx: RequestContext, queue: EventQueue) -> a2a_sdk::A2AResult<()> {
//!         let updater = TaskUpdater::new(queue, ctx.task_id, ctx.context_id);
//!         updater.cancel(None).await
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let card = AgentCardBuilder::new("Echo Agent", "Echoes your message", "1.0.0")
//!         .url("http://localhost:7420")
//!         .streaming(true)
//!         .build()?;
//!
//!     let handler = Arc::new(
//!         DefaultRequestHandler::new(
//!             Arc::new(EchoAgent),
//!             Arc::new(InMemoryTaskStore::new()),
//!         )
//!         .with_agent_card(card.clone()),
//!     );
//!
//!     let app = A2aJsonRpcApp::new(handler, card).router();
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:7420").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Client quick start
//!
//! ```no_run
//! use a2a_sdk::client::{CardResolver, ClientConfig, ClientFactory};
//! use a2a_sdk::types::Message;
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let card = CardResolver::new().resolve("http://localhost:7420").await?;
//! let client = ClientFactory::new(ClientConfig::default()).create(card, vec![], vec![])?;
//!
//! let mut events = client
//!     .send_message(Message::user("m1", "Hello"), None, None)
//!     .await?;
//! while let Some(event) = events.next().await {
//!     let (response, task) = event?;
//!     println!("event: {response:?}, task state: {:?}", task.map(|t| t.status.state));
//! }
//! # Ok(())
//! # }
//! ```

pub mod builders;
pub mod error;
pub mod types;
pub mod utils;

#[cfg(feature = "client")]
pub mod client;

#[cfg(feature = "server")]
pub mod server;

/// Commonly used types and traits, importable in one line.
pub mod prelude {
    pub use crate::types::{
        AgentCapabilities, AgentCard, AgentInterface, AgentSkill, Artifact, FileContent,
        FileWithBytes, FileWithUri, Message, Part, Role, SendMessageConfiguration,
        SendMessageParams, SendMessageResponse, StreamResponse, Task, TaskArtifactUpdateEvent,
        TaskState, TaskStatus, TaskStatusUpdateEvent,
    };

    pub use crate::builders::AgentCardBuilder;
    pub use crate::error::{A2AError, A2AResult};

    #[cfg(feature = "client")]
    pub use crate::client::{
        BaseClient, CardResolver, ClientCallContext, ClientConfig, ClientEvent, ClientFactory,
        Consumer,
    };

    #[cfg(feature = "server")]
    pub use crate::server::{
        A2aJsonRpcApp, A2aRestApp, AgentExecutor, DefaultRequestHandler, EventConsumer,
        EventQueue, InMemoryQueueManager, InMemoryTaskStore, QueueManager, RequestContext,
        RequestHandler, ResultAggregator, ServerCallContext, TaskManager, TaskStore, TaskUpdater,
    };
}

pub use builders::AgentCardBuilder;
pub use error::{A2AError, A2AResult};
pub use types::*;
