//! Server framework: the event pipeline, the transport-agnostic request
//! handler, and the axum adapters.
//!
//! - [`AgentExecutor`] — implement your agent logic
//! - [`RequestContext`] / [`ServerCallContext`] — execution and call context
//! - [`EventQueue`] / [`QueueManager`] — producer/consumer plumbing per task
//! - [`EventConsumer`] / [`ResultAggregator`] — the read side and folding
//! - [`TaskManager`] / [`TaskStore`] — authoritative snapshots and storage
//! - [`TaskUpdater`] — agent-side event publishing helper
//! - [`PushNotificationConfigStore`] / [`PushNotificationSender`] — webhooks
//! - [`RequestHandler`] / [`DefaultRequestHandler`] — the core state machine
//! - [`jsonrpc_app::A2aJsonRpcApp`] / [`rest_app::A2aRestApp`] — HTTP wiring
//!
//! # Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use a2a_sdk::server::*;
//!
//! struct MyAgent;
//!
//! #[async_trait::async_trait]
//! impl AgentExecutor for MyAgent {
//!     async fn execute(&self, ctx: RequestContext, queue: EventQueue) -> a2a_sdk::A2AResult<()> {
//!         let updater = TaskUpdater::new(queue, ctx.task_id, ctx.context_id);
//!         updater.start_work(None).await?;
//!         // ... do work ...
//!         updater.complete(None).await?;
//!         Ok(())
//!     }
//!
//!     async fn cancel(&self, ctx: RequestContext, queue: EventQueue) -> a2a_sdk::A2AResult<()> {
//!         let updater = TaskUpdater::new(queue, ctx.task_id, ctx.context_id);
//!         updater.cancel(None).await?;
//!         Ok(())
//!     }
//! }
//!
//! let executor = Arc::new(MyAgent);
//! let store = Arc::new(InMemoryTaskStore::new());
//! let handler = Arc::new(DefaultRequestHandler::new(executor, store).with_agent_card(card.clone()));
//! let app = A2aJsonRpcApp::new(handler, card).router();
//! ```

pub mod agent_executor;
pub mod context;
pub mod event_consumer;
pub mod event_queue;
pub mod jsonrpc_app;
pub mod push_notifications;
pub mod queue_manager;
pub mod request_handler;
pub mod rest_app;
pub mod result_aggregator;
pub mod task_manager;
pub mod task_store;
pub mod task_updater;

pub use agent_executor::{
    AgentExecutor, RequestContext, RequestContextBuilder, SimpleRequestContextBuilder,
};
pub use context::{
    default_owner_resolver, resolve_user_scope, OwnerResolver, ServerCallContext, User,
};
pub use event_consumer::EventConsumer;
pub use event_queue::{DequeueError, EventQueue, DEFAULT_MAX_QUEUE_SIZE};
pub use jsonrpc_app::A2aJsonRpcApp;
pub use push_notifications::{
    HttpPushNotificationSender, InMemoryPushNotificationConfigStore, PushNotificationConfigStore,
    PushNotificationSender,
};
pub use queue_manager::{InMemoryQueueManager, NoTaskQueue, QueueManager, TaskQueueExists};
pub use request_handler::{
    are_modalities_compatible, DefaultRequestHandler, EventStream, ExtendedCardModifier,
    RequestHandler,
};
pub use rest_app::A2aRestApp;
pub use result_aggregator::{AggregatedResult, ResultAggregator};
pub use task_manager::{append_artifact_to_task, TaskEvent, TaskManager};
pub use task_store::{InMemoryTaskStore, TaskStore, DEFAULT_PAGE_SIZE};
pub use task_updater::TaskUpdater;
