//! The transport-agnostic request handler.
//!
//! [`DefaultRequestHandler`] converts inbound message/get/cancel/subscribe
//! calls into agent executions: it mediates the producer/consumer channel
//! (spawning `execute` against an [`EventQueue`]), folds emitted events into
//! the authoritative task via [`TaskManager`]/[`ResultAggregator`], and
//! dispatches push notifications on terminal and interrupted snapshots.
//!
//! Transport adapters own the agent card; capability gating (streaming,
//! push notifications) happens there before these methods are reached.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::{A2AError, A2AResult};
use crate::types::{
    AgentCard, CancelTaskParams, DeleteTaskPushNotificationConfigParams,
    GetTaskParams, GetTaskPushNotificationConfigParams, ListTaskPushNotificationConfigParams,
    ListTasksParams, ListTasksResponse, SendMessageParams, SendMessageResponse,
    SetTaskPushNotificationConfigParams, StreamResponse, SubscribeToTaskParams, Task,
    TaskPushNotificationConfig,
};
use crate::utils::task::apply_history_length;

use super::agent_executor::{AgentExecutor, RequestContextBuilder, SimpleRequestContextBuilder};
use super::context::{default_owner_resolver, OwnerResolver, ServerCallContext};
use super::event_consumer::EventConsumer;
use super::event_queue::EventQueue;
use super::push_notifications::{PushNotificationConfigStore, PushNotificationSender};
use super::queue_manager::{InMemoryQueueManager, QueueManager};
use super::result_aggregator::{AggregatedResult, ResultAggregator};
use super::task_manager::TaskManager;
use super::task_store::TaskStore;

/// Finite, single-pass sequence of pipeline events, as returned by the
/// streaming handler methods.
pub type EventStream = Pin<Box<dyn Stream<Item = A2AResult<StreamResponse>> + Send>>;

/// How long a non-blocking send waits for the first event before
/// synthesizing a `submitted` snapshot.
const NON_BLOCKING_GRACE: Duration = Duration::from_millis(200);

/// Builds a per-user extended agent card from the base card and the call
/// context. Must be a pure function.
pub type ExtendedCardModifier =
    Arc<dyn Fn(AgentCard, Option<&ServerCallContext>) -> AgentCard + Send + Sync>;

/// The operations a transport adapter dispatches to.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// `message/send`: execute the agent and return the settled task or a
    /// direct message.
    async fn on_message_send(
        &self,
        params: SendMessageParams,
        context: Option<ServerCallContext>,
    ) -> A2AResult<SendMessageResponse>;

    /// `message/stream`: execute the agent, yielding each event.
    async fn on_message_send_stream(
        &self,
        params: SendMessageParams,
        context: Option<ServerCallContext>,
    ) -> A2AResult<EventStream>;

    /// `tasks/get`.
    async fn on_get_task(
        &self,
        params: GetTaskParams,
        context: Option<ServerCallContext>,
    ) -> A2AResult<Task>;

    /// `tasks/list`.
    async fn on_list_tasks(
        &self,
        params: ListTasksParams,
        context: Option<ServerCallContext>,
    ) -> A2AResult<ListTasksResponse>;

    /// `tasks/cancel`.
    async fn on_cancel_task(
        &self,
        params: CancelTaskParams,
        context: Option<ServerCallContext>,
    ) -> A2AResult<Task>;

    /// `tasks/subscribe` / `tasks/resubscribe`: reattach to a task's event
    /// stream. The first yielded event is the current snapshot from the
    /// store.
    async fn on_subscribe_to_task(
        &self,
        params: SubscribeToTaskParams,
        context: Option<ServerCallContext>,
    ) -> A2AResult<EventStream>;

    /// `tasks/pushNotificationConfig/set`.
    async fn on_set_task_push_notification_config(
        &self,
        params: SetTaskPushNotificationConfigParams,
        context: Option<ServerCallContext>,
    ) -> A2AResult<TaskPushNotificationConfig>;

    /// `tasks/pushNotificationConfig/get`.
    async fn on_get_task_push_notification_config(
        &self,
        params: GetTaskPushNotificationConfigParams,
        context: Option<ServerCallContext>,
    ) -> A2AResult<TaskPushNotificationConfig>;

    /// `tasks/pushNotificationConfig/list`.
    async fn on_list_task_push_notification_config(
        &self,
        params: ListTaskPushNotificationConfigParams,
        context: Option<ServerCallContext>,
    ) -> A2AResult<Vec<TaskPushNotificationConfig>>;

    /// `tasks/pushNotificationConfig/delete`.
    async fn on_delete_task_push_notification_config(
        &self,
        params: DeleteTaskPushNotificationConfigParams,
        context: Option<ServerCallContext>,
    ) -> A2AResult<()>;

    /// `agent/authenticatedExtendedCard`.
    async fn on_get_extended_agent_card(
        &self,
        context: Option<ServerCallContext>,
    ) -> A2AResult<AgentCard>;
}

/// Whether the server can produce output the client accepts: compatible when
/// either side declares nothing, or the intersection is non-empty.
pub fn are_modalities_compatible(
    server_output_modes: &[String],
    client_output_modes: Option<&Vec<String>>,
) -> bool {
    let Some(client) = client_output_modes else {
        return true;
    };
    if client.is_empty() || server_output_modes.is_empty() {
        return true;
    }
    client.iter().any(|mode| server_output_modes.contains(mode))
}

/// Standard [`RequestHandler`] wiring an [`AgentExecutor`], [`TaskStore`],
/// [`QueueManager`], and the push notification components.
pub struct DefaultRequestHandler {
    agent_executor: Arc<dyn AgentExecutor>,
    task_store: Arc<dyn TaskStore>,
    queue_manager: Arc<dyn QueueManager>,
    push_config_store: Option<Arc<dyn PushNotificationConfigStore>>,
    push_sender: Option<Arc<dyn PushNotificationSender>>,
    request_context_builder: Arc<dyn RequestContextBuilder>,
    owner_resolver: OwnerResolver,
    /// Media types the server produces; used for the modality check.
    default_output_modes: Vec<String>,
    agent_card: Option<AgentCard>,
    extended_card: Option<AgentCard>,
    extended_card_modifier: Option<ExtendedCardModifier>,
    running_agents: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
    result_aggregators: Arc<Mutex<HashMap<String, Arc<ResultAggregator>>>>,
}

impl DefaultRequestHandler {
    /// Handler over an executor and a task store, with in-memory queues, no
    /// push notifications, and the default context builder.
    pub fn new(agent_executor: Arc<dyn AgentExecutor>, task_store: Arc<dyn TaskStore>) -> Self {
        let request_context_builder =
            Arc::new(SimpleRequestContextBuilder::new(Some(task_store.clone()), false));
        DefaultRequestHandler {
            agent_executor,
            task_store,
            queue_manager: Arc::new(InMemoryQueueManager::new()),
            push_config_store: None,
            push_sender: None,
            request_context_builder,
            owner_resolver: default_owner_resolver(),
            default_output_modes: Vec::new(),
            agent_card: None,
            extended_card: None,
            extended_card_modifier: None,
            running_agents: Arc::new(Mutex::new(HashMap::new())),
            result_aggregators: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Replaces the queue manager.
    pub fn with_queue_manager(mut self, queue_manager: Arc<dyn QueueManager>) -> Self {
        self.queue_manager = queue_manager;
        self
    }

    /// Enables push notifications.
    pub fn with_push_notifications(
        mut self,
        config_store: Arc<dyn PushNotificationConfigStore>,
        sender: Arc<dyn PushNotificationSender>,
    ) -> Self {
        self.push_config_store = Some(config_store);
        self.push_sender = Some(sender);
        self
    }

    /// Replaces the request context builder.
    pub fn with_request_context_builder(
        mut self,
        builder: Arc<dyn RequestContextBuilder>,
    ) -> Self {
        self.request_context_builder = builder;
        self
    }

    /// Replaces the owner resolver.
    pub fn with_owner_resolver(mut self, resolver: OwnerResolver) -> Self {
        self.owner_resolver = resolver;
        self
    }

    /// Registers the agent card; its `default_output_modes` drive the
    /// modality check and the extended-card flow uses it as base.
    pub fn with_agent_card(mut self, card: AgentCard) -> Self {
        self.default_output_modes = card.default_output_modes.clone();
        self.agent_card = Some(card);
        self
    }

    /// Registers a pre-built authenticated extended card.
    pub fn with_extended_card(mut self, card: AgentCard) -> Self {
        self.extended_card = Some(card);
        self
    }

    /// Registers a per-user extended card modifier.
    pub fn with_extended_card_modifier(mut self, modifier: ExtendedCardModifier) -> Self {
        self.extended_card_modifier = Some(modifier);
        self
    }

    fn owner(&self, context: Option<&ServerCallContext>) -> String {
        (self.owner_resolver)(context)
    }

    /// Resolves or creates the task for an inbound message; returns the
    /// updated params (message ids filled in) and the existing task, if any.
    async fn resolve_task(
        &self,
        mut params: SendMessageParams,
    ) -> A2AResult<(SendMessageParams, Option<Task>)> {
        let existing = match params.message.task_id {
            Some(ref task_id) => {
                let Some(task) = self.task_store.get(task_id).await? else {
                    return Err(A2AError::task_not_found(format!(
                        "Task {} was specified but does not exist",
                        task_id
                    )));
                };
                if task.status.state.is_terminal() {
                    return Err(A2AError::invalid_params(format!(
                        "Task {} is in terminal state: {}",
                        task.id, task.status.state
                    )));
                }
                Some(task)
            }
            None => None,
        };

        // Fill in generated ids so the message, the context, and every
        // folded event agree.
        let task_id = params
            .message
            .task_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let context_id = existing
            .as_ref()
            .map(|t| t.context_id.clone())
            .or_else(|| params.message.context_id.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        params.message.task_id = Some(task_id);
        params.message.context_id = Some(context_id);

        Ok((params, existing))
    }

    /// Shared setup for blocking, non-blocking, and streaming sends: resolve
    /// the task, register the push config, acquire the queue, reuse or
    /// create the aggregator, and spawn the producer if none is running.
    async fn setup_message_execution(
        &self,
        params: SendMessageParams,
        context: Option<ServerCallContext>,
    ) -> A2AResult<(String, String, EventQueue, Arc<ResultAggregator>)> {
        if !are_modalities_compatible(
            &self.default_output_modes,
            params
                .configuration
                .as_ref()
                .and_then(|c| c.accepted_output_modes.as_ref()),
        ) {
            return Err(A2AError::content_type_not_supported(
                "None of the client's accepted output modes are supported",
            ));
        }

        let (params, existing) = self.resolve_task(params).await?;
        let task_id = params.message.task_id.clone().expect("resolved above");
        let context_id = params.message.context_id.clone().expect("resolved above");

        if let Some(ref config) = params.configuration {
            if let Some(ref push_config) = config.push_notification_config {
                let Some(ref push_store) = self.push_config_store else {
                    return Err(A2AError::push_notification_not_supported(
                        "Push notifications are not configured on this server",
                    ));
                };
                let owner = self.owner(context.as_ref());
                push_store.set_info(&owner, &task_id, push_config).await?;
            }
        }

        let queue = self.queue_manager.create_or_tap(&task_id).await;

        let result_aggregator = {
            let mut aggregators = self.result_aggregators.lock().await;
            match aggregators.get(&task_id) {
                Some(existing) => {
                    debug!(task_id = %task_id, "Reusing result aggregator");
                    existing.clone()
                }
                None => {
                    let task_manager = TaskManager::new(
                        self.task_store.clone(),
                        Some(task_id.clone()),
                        Some(context_id.clone()),
                        Some(params.message.clone()),
                    )?;
                    let aggregator = Arc::new(ResultAggregator::new(task_manager));
                    aggregators.insert(task_id.clone(), aggregator.clone());
                    aggregator
                }
            }
        };

        // A continuation: fold the new user message into the snapshot
        // through the aggregator's own manager, so its in-memory state and
        // the store agree before further events arrive.
        let existing = if existing.is_some() {
            result_aggregator
                .append_message(params.message.clone())
                .await?
        } else {
            None
        };

        self.spawn_producer(params, context, task_id.clone(), context_id.clone(), existing)
            .await?;

        Ok((task_id, context_id, queue, result_aggregator))
    }

    /// Spawns `agent.execute` unless a producer for this task is still
    /// running; the completion callback closes the queue and records any
    /// error, then tears down the task's pipeline state.
    async fn spawn_producer(
        &self,
        params: SendMessageParams,
        context: Option<ServerCallContext>,
        task_id: String,
        context_id: String,
        existing_task: Option<Task>,
    ) -> A2AResult<()> {
        let mut running = self.running_agents.lock().await;
        if let Some(handle) = running.get(&task_id) {
            if !handle.is_finished() {
                debug!(task_id = %task_id, "Producer already running; delivering message into existing context");
                return Ok(());
            }
        }

        let request_context = self
            .request_context_builder
            .build(
                Some(&params),
                Some(&task_id),
                Some(&context_id),
                existing_task.as_ref(),
                context,
            )
            .await?;

        // The producer's queue must be the primary so taps observe every
        // event.
        let queue = match self.queue_manager.get(&task_id).await {
            Some(queue) => queue,
            None => {
                let queue = EventQueue::with_default_capacity();
                let _ = self.queue_manager.add(&task_id, queue.clone()).await;
                queue
            }
        };

        let executor = self.agent_executor.clone();
        let queue_manager = self.queue_manager.clone();
        let running_agents = self.running_agents.clone();
        let aggregators = self.result_aggregators.clone();
        let producer_task_id = task_id.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = executor.execute(request_context, queue.clone()).await {
                error!(task_id = %producer_task_id, error = %e, "Agent execution failed");
                queue
                    .set_exception(A2AError::internal_error(format!(
                        "Agent execution failed: {e}"
                    )))
                    .await;
            }
            queue.close().await;

            // The execution is over: drop the pipeline state for this task.
            queue_manager.close(&producer_task_id).await.ok();
            running_agents.lock().await.remove(&producer_task_id);
            aggregators.lock().await.remove(&producer_task_id);
        });

        running.insert(task_id, handle);
        Ok(())
    }

    async fn notify_if_needed(
        &self,
        owner: &str,
        result_aggregator: &ResultAggregator,
    ) {
        let Some(ref sender) = self.push_sender else {
            return;
        };
        if let Some(AggregatedResult::Task(task)) = result_aggregator.current_result().await {
            let state = task.status.state;
            if state.is_terminal() || state.is_interruptible() {
                if let Err(e) = sender.send_notification(owner, &task).await {
                    error!(task_id = %task.id, error = %e, "Push notification dispatch failed");
                }
            }
        }
    }

    fn validate_result_task_id(&self, expected: &str, task: &Task) -> A2AResult<()> {
        if expected != task.id {
            error!(
                expected,
                actual = %task.id,
                "Agent produced a task id that does not match the request context"
            );
            return Err(A2AError::internal_error(
                "Task ID mismatch in agent response",
            ));
        }
        Ok(())
    }

    fn history_length(params: &SendMessageParams) -> Option<usize> {
        params
            .configuration
            .as_ref()
            .and_then(|c| c.history_length)
            .and_then(|len| usize::try_from(len).ok())
    }
}

#[async_trait]
impl RequestHandler for DefaultRequestHandler {
    async fn on_message_send(
        &self,
        params: SendMessageParams,
        context: Option<ServerCallContext>,
    ) -> A2AResult<SendMessageResponse> {
        let blocking = params
            .configuration
            .as_ref()
            .and_then(|c| c.blocking)
            .unwrap_or(true);
        let history_length = Self::history_length(&params);
        let owner = self.owner(context.as_ref());

        let (task_id, context_id, queue, result_aggregator) =
            self.setup_message_execution(params, context).await?;
        let consumer = EventConsumer::new(queue.clone());

        if !blocking {
            // Keep folding in the background so the store converges; fire
            // the push notification when the execution settles.
            let aggregator = result_aggregator.clone();
            let handler = self.clone();
            let pump_owner = owner.clone();
            tokio::spawn(async move {
                if let Err(e) = aggregator.consume_all(consumer).await {
                    warn!(error = %e, "Background event folding ended with error");
                }
                handler.notify_if_needed(&pump_owner, &aggregator).await;
            });

            // Wait briefly for the first folded snapshot, then fall back to
            // a synthesized `submitted` task.
            let deadline = tokio::time::Instant::now() + NON_BLOCKING_GRACE;
            loop {
                if let Some(result) = result_aggregator.current_result().await {
                    return match result {
                        AggregatedResult::Message(message) => {
                            Ok(SendMessageResponse::Message(message))
                        }
                        AggregatedResult::Task(task) => {
                            self.validate_result_task_id(&task_id, &task)?;
                            Ok(SendMessageResponse::Task(apply_history_length(
                                task,
                                history_length,
                            )))
                        }
                    };
                }
                if tokio::time::Instant::now() >= deadline {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }

            let task = match self.task_store.get(&task_id).await? {
                Some(task) => task,
                None => {
                    let task = crate::types::Task {
                        id: task_id.clone(),
                        context_id,
                        kind: "task".to_string(),
                        status: crate::types::TaskStatus::now(crate::types::TaskState::Submitted),
                        artifacts: None,
                        history: None,
                        metadata: None,
                    };
                    self.task_store.save(task.clone()).await?;
                    task
                }
            };
            return Ok(SendMessageResponse::Task(apply_history_length(
                task,
                history_length,
            )));
        }

        let (result, interrupted) = result_aggregator
            .consume_and_break_on_interrupt(consumer)
            .await?;
        let result =
            result.ok_or_else(|| A2AError::internal_error("No result from agent execution"))?;

        self.notify_if_needed(&owner, &result_aggregator).await;

        match result {
            AggregatedResult::Message(message) => {
                queue.close().await;
                self.queue_manager.close(&task_id).await.ok();
                Ok(SendMessageResponse::Message(message))
            }
            AggregatedResult::Task(task) => {
                self.validate_result_task_id(&task_id, &task)?;
                if !interrupted {
                    // Terminal: the consumer already closed the queue; drop
                    // the registry entry so resubscription sees a finished
                    // task.
                    self.queue_manager.close(&task_id).await.ok();
                }
                Ok(SendMessageResponse::Task(apply_history_length(
                    task,
                    history_length,
                )))
            }
        }
    }

    async fn on_message_send_stream(
        &self,
        params: SendMessageParams,
        context: Option<ServerCallContext>,
    ) -> A2AResult<EventStream> {
        let owner = self.owner(context.as_ref());
        let (task_id, _context_id, queue, result_aggregator) =
            self.setup_message_execution(params, context).await?;
        let consumer = EventConsumer::new(queue);

        let handler = self.clone();
        let stream = async_stream::stream! {
            let inner = result_aggregator.clone().consume_and_emit(consumer);
            futures::pin_mut!(inner);

            while let Some(event) = inner.next().await {
                if let Ok(StreamResponse::Task(ref task)) = event {
                    if let Err(e) = handler.validate_result_task_id(&task_id, task) {
                        yield Err(e);
                        break;
                    }
                }
                yield event;
            }

            handler.notify_if_needed(&owner, &result_aggregator).await;
        };

        Ok(Box::pin(stream))
    }

    async fn on_get_task(
        &self,
        params: GetTaskParams,
        _context: Option<ServerCallContext>,
    ) -> A2AResult<Task> {
        let task = self
            .task_store
            .get(&params.id)
            .await?
            .ok_or_else(|| A2AError::task_not_found(params.id.clone()))?;
        let history_length = params.history_length.and_then(|len| usize::try_from(len).ok());
        Ok(apply_history_length(task, history_length))
    }

    async fn on_list_tasks(
        &self,
        params: ListTasksParams,
        _context: Option<ServerCallContext>,
    ) -> A2AResult<ListTasksResponse> {
        let history_length = params.history_length.and_then(|len| usize::try_from(len).ok());
        let mut response = self.task_store.list(&params).await?;
        if history_length.is_some() {
            response.tasks = response
                .tasks
                .into_iter()
                .map(|task| apply_history_length(task, history_length))
                .collect();
        }
        Ok(response)
    }

    async fn on_cancel_task(
        &self,
        params: CancelTaskParams,
        context: Option<ServerCallContext>,
    ) -> A2AResult<Task> {
        let task = self
            .task_store
            .get(&params.id)
            .await?
            .ok_or_else(|| A2AError::task_not_found(params.id.clone()))?;

        if task.status.state.is_terminal() {
            return Err(A2AError::task_not_cancelable(format!(
                "Task cannot be canceled - current state: {}",
                task.status.state
            )));
        }

        // Cancel events go to the primary queue so every attached consumer
        // observes them; this call drains a fresh tap.
        let primary = match self.queue_manager.get(&task.id).await {
            Some(queue) => queue,
            None => {
                let queue = EventQueue::with_default_capacity();
                let _ = self.queue_manager.add(&task.id, queue.clone()).await;
                queue
            }
        };
        let tap = primary.tap().await;

        let request_context = self
            .request_context_builder
            .build(None, Some(&task.id), Some(&task.context_id), Some(&task), context.clone())
            .await?;

        self.agent_executor
            .cancel(request_context, primary.clone())
            .await?;

        // Abort the producer, if one is still running.
        if let Some(handle) = self.running_agents.lock().await.get(&params.id) {
            handle.abort();
        }

        let task_manager = TaskManager::new(
            self.task_store.clone(),
            Some(task.id.clone()),
            Some(task.context_id.clone()),
            None,
        )?;
        let aggregator = ResultAggregator::new(task_manager);
        let result = aggregator.consume_all(EventConsumer::new(tap)).await?;

        self.queue_manager.close(&params.id).await.ok();
        self.running_agents.lock().await.remove(&params.id);
        self.result_aggregators.lock().await.remove(&params.id);

        let owner = self.owner(context.as_ref());
        self.notify_if_needed(&owner, &aggregator).await;

        match result {
            AggregatedResult::Task(task) => Ok(task),
            AggregatedResult::Message(_) => Err(A2AError::invalid_agent_response(
                "Agent returned a message instead of a task for cancel",
            )),
        }
    }

    async fn on_subscribe_to_task(
        &self,
        params: SubscribeToTaskParams,
        _context: Option<ServerCallContext>,
    ) -> A2AResult<EventStream> {
        // The first event is always the current snapshot, freshly loaded, so
        // the reattached client starts from a known state.
        let task = self
            .task_store
            .get(&params.id)
            .await?
            .ok_or_else(|| A2AError::task_not_found(params.id.clone()))?;

        let tap = self.queue_manager.tap(&task.id).await;

        let stream = async_stream::stream! {
            yield Ok(StreamResponse::Task(task));

            let Some(tap) = tap else {
                // The task has finished and its queue is gone; the snapshot
                // is the whole story.
                return;
            };

            // Replay only: folding into the store is the sending call's
            // consumer's job, and doubling it up would re-append artifact
            // chunks.
            let inner = EventConsumer::new(tap).consume_all();
            futures::pin_mut!(inner);
            while let Some(event) = inner.next().await {
                yield event;
            }
        };

        Ok(Box::pin(stream))
    }

    async fn on_set_task_push_notification_config(
        &self,
        params: SetTaskPushNotificationConfigParams,
        context: Option<ServerCallContext>,
    ) -> A2AResult<TaskPushNotificationConfig> {
        let push_store = self.push_config_store.as_ref().ok_or_else(|| {
            A2AError::unsupported_operation("Push notifications are not supported")
        })?;

        self.task_store
            .get(&params.task_id)
            .await?
            .ok_or_else(|| A2AError::task_not_found(params.task_id.clone()))?;

        let owner = self.owner(context.as_ref());
        push_store
            .set_info(&owner, &params.task_id, &params.push_notification_config)
            .await?;

        let mut config = params.push_notification_config;
        if config.id.is_none() {
            config.id = Some(params.task_id.clone());
        }
        Ok(TaskPushNotificationConfig {
            task_id: params.task_id,
            push_notification_config: config,
        })
    }

    async fn on_get_task_push_notification_config(
        &self,
        params: GetTaskPushNotificationConfigParams,
        context: Option<ServerCallContext>,
    ) -> A2AResult<TaskPushNotificationConfig> {
        let push_store = self.push_config_store.as_ref().ok_or_else(|| {
            A2AError::unsupported_operation("Push notifications are not supported")
        })?;

        self.task_store
            .get(&params.id)
            .await?
            .ok_or_else(|| A2AError::task_not_found(params.id.clone()))?;

        let owner = self.owner(context.as_ref());
        let configs = push_store.get_info(&owner, &params.id).await?;

        let config = match params.push_notification_config_id {
            Some(ref config_id) => configs
                .into_iter()
                .find(|c| c.id.as_deref() == Some(config_id)),
            None => configs.into_iter().next(),
        }
        .ok_or_else(|| A2AError::internal_error("Push notification config not found"))?;

        Ok(TaskPushNotificationConfig {
            task_id: params.id,
            push_notification_config: config,
        })
    }

    async fn on_list_task_push_notification_config(
        &self,
        params: ListTaskPushNotificationConfigParams,
        context: Option<ServerCallContext>,
    ) -> A2AResult<Vec<TaskPushNotificationConfig>> {
        let push_store = self.push_config_store.as_ref().ok_or_else(|| {
            A2AError::unsupported_operation("Push notifications are not supported")
        })?;

        self.task_store
            .get(&params.id)
            .await?
            .ok_or_else(|| A2AError::task_not_found(params.id.clone()))?;

        let owner = self.owner(context.as_ref());
        let configs = push_store.get_info(&owner, &params.id).await?;

        Ok(configs
            .into_iter()
            .map(|config| TaskPushNotificationConfig {
                task_id: params.id.clone(),
                push_notification_config: config,
            })
            .collect())
    }

    async fn on_delete_task_push_notification_config(
        &self,
        params: DeleteTaskPushNotificationConfigParams,
        context: Option<ServerCallContext>,
    ) -> A2AResult<()> {
        let push_store = self.push_config_store.as_ref().ok_or_else(|| {
            A2AError::unsupported_operation("Push notifications are not supported")
        })?;

        self.task_store
            .get(&params.id)
            .await?
            .ok_or_else(|| A2AError::task_not_found(params.id.clone()))?;

        let owner = self.owner(context.as_ref());
        push_store
            .delete_info(&owner, &params.id, Some(&params.push_notification_config_id))
            .await
    }

    async fn on_get_extended_agent_card(
        &self,
        context: Option<ServerCallContext>,
    ) -> A2AResult<AgentCard> {
        let base = self.agent_card.as_ref().ok_or_else(|| {
            A2AError::authenticated_extended_card_not_configured(
                "Extended agent card is not configured",
            )
        })?;
        if base.supports_authenticated_extended_card != Some(true) {
            return Err(A2AError::authenticated_extended_card_not_configured(
                "Agent does not support an authenticated extended card",
            ));
        }

        if let Some(ref modifier) = self.extended_card_modifier {
            let card = self.extended_card.clone().unwrap_or_else(|| base.clone());
            return Ok(modifier(card, context.as_ref()));
        }

        self.extended_card.clone().ok_or_else(|| {
            A2AError::authenticated_extended_card_not_configured(
                "Extended agent card is not configured",
            )
        })
    }
}

impl Clone for DefaultRequestHandler {
    fn clone(&self) -> Self {
        DefaultRequestHandler {
            agent_executor: self.agent_executor.clone(),
            task_store: self.task_store.clone(),
            queue_manager: self.queue_manager.clone(),
            push_config_store: self.push_config_store.clone(),
            push_sender: self.push_sender.clone(),
            request_context_builder: self.request_context_builder.clone(),
            owner_resolver: self.owner_resolver.clone(),
            default_output_modes: self.default_output_modes.clone(),
            agent_card: self.agent_card.clone(),
            extended_card: self.extended_card.clone(),
            extended_card_modifier: self.extended_card_modifier.clone(),
            running_agents: self.running_agents.clone(),
            result_aggregators: self.result_aggregators.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modality_compatibility() {
        let server = vec!["text/plain".to_string(), "application/json".to_string()];
        assert!(are_modalities_compatible(&server, None));
        assert!(are_modalities_compatible(&server, Some(&vec![])));
        assert!(are_modalities_compatible(&[], Some(&vec!["image/png".into()])));
        assert!(are_modalities_compatible(
            &server,
            Some(&vec!["application/json".into()])
        ));
        assert!(!are_modalities_compatible(
            &server,
            Some(&vec!["image/png".into()])
        ));
    }
}
