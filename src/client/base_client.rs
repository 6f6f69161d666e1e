//! The transport-independent client: send/stream dispatch, configuration
//! layering, client-side folding, and the consumer chain.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::sync::RwLock;

use crate::error::{A2AError, A2AResult};
use crate::types::{
    AgentCard, CancelTaskParams, DeleteTaskPushNotificationConfigParams, GetTaskParams,
    GetTaskPushNotificationConfigParams, ListTaskPushNotificationConfigParams, ListTasksParams,
    ListTasksResponse, Message, SendMessageConfiguration, SendMessageParams, SendMessageResponse,
    SetTaskPushNotificationConfigParams, StreamResponse, SubscribeToTaskParams, Task,
    TaskPushNotificationConfig,
};

use super::client_factory::ClientConfig;
use super::client_task_manager::ClientTaskManager;
use super::transport::{ClientCallContext, ClientTransport, ResponseStream};

/// One event observed by the client: the stream response plus the folded
/// task snapshot (absent for standalone messages).
pub type ClientEvent = (StreamResponse, Option<Task>);

/// Lazy sequence of client events from a send or subscribe call.
pub type ClientEventStream = Pin<Box<dyn Stream<Item = A2AResult<ClientEvent>> + Send>>;

/// Observes every event a client yields, before the caller sees it.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Called for each event in order.
    async fn consume(&self, event: &ClientEvent, card: &AgentCard);
}

/// Transport-independent A2A client.
///
/// Produced by [`ClientFactory`](super::client_factory::ClientFactory);
/// the same API serves every negotiated transport.
pub struct BaseClient {
    card: RwLock<AgentCard>,
    config: ClientConfig,
    transport: Arc<dyn ClientTransport>,
    consumers: Vec<Arc<dyn Consumer>>,
}

impl BaseClient {
    /// Client over a negotiated transport.
    pub fn new(
        card: AgentCard,
        config: ClientConfig,
        transport: Arc<dyn ClientTransport>,
        consumers: Vec<Arc<dyn Consumer>>,
    ) -> Self {
        BaseClient {
            card: RwLock::new(card),
            config,
            transport,
            consumers,
        }
    }

    /// The agent card this client was created for.
    pub async fn card(&self) -> AgentCard {
        self.card.read().await.clone()
    }

    /// Direct access to the underlying transport.
    pub fn transport(&self) -> &Arc<dyn ClientTransport> {
        &self.transport
    }

    async fn offer_to_consumers(&self, event: &ClientEvent, card: &AgentCard) {
        for consumer in &self.consumers {
            consumer.consume(event, card).await;
        }
    }

    /// Layers the factory-level defaults under the call-site configuration.
    /// The call-site `blocking` always wins when present, even when false.
    fn effective_configuration(
        &self,
        configuration: Option<SendMessageConfiguration>,
    ) -> SendMessageConfiguration {
        let mut config = SendMessageConfiguration {
            accepted_output_modes: if self.config.accepted_output_modes.is_empty() {
                None
            } else {
                Some(self.config.accepted_output_modes.clone())
            },
            push_notification_config: self.config.push_notification_configs.first().cloned(),
            history_length: None,
            blocking: Some(!self.config.polling),
        };

        if let Some(overrides) = configuration {
            if overrides.accepted_output_modes.is_some() {
                config.accepted_output_modes = overrides.accepted_output_modes;
            }
            if overrides.push_notification_config.is_some() {
                config.push_notification_config = overrides.push_notification_config;
            }
            if overrides.history_length.is_some() {
                config.history_length = overrides.history_length;
            }
            if overrides.blocking.is_some() {
                config.blocking = overrides.blocking;
            }
        }

        config
    }

    async fn streaming_enabled(&self) -> bool {
        self.config.streaming
            && self
                .card
                .read()
                .await
                .capabilities
                .streaming
                .unwrap_or(false)
    }

    /// Sends a message, yielding `(event, task)` pairs until the exchange
    /// settles.
    ///
    /// Streams when both the client config and the agent card allow it;
    /// otherwise performs a unary send whose result is wrapped in a single
    /// synthetic stream event.
    pub async fn send_message(
        &self,
        request: Message,
        configuration: Option<SendMessageConfiguration>,
        context: Option<ClientCallContext>,
    ) -> A2AResult<ClientEventStream> {
        let config = self.effective_configuration(configuration);
        let params = SendMessageParams {
            message: request,
            configuration: Some(config),
            metadata: None,
        };
        let card = self.card().await;

        if !self.streaming_enabled().await {
            let response = self
                .transport
                .send_message(params, context.as_ref())
                .await?;

            let event: ClientEvent = match response {
                SendMessageResponse::Task(task) => {
                    (StreamResponse::Task(task.clone()), Some(task))
                }
                SendMessageResponse::Message(message) => {
                    (StreamResponse::Message(message), None)
                }
            };
            self.offer_to_consumers(&event, &card).await;

            let stream = futures::stream::once(async move { Ok(event) });
            return Ok(stream.boxed());
        }

        let stream = self
            .transport
            .send_message_streaming(params, context.as_ref())
            .await?;
        Ok(self.process_stream(stream, card, false))
    }

    /// Reattaches to a task's event stream. Requires streaming support on
    /// both sides; the first event must be a task snapshot.
    pub async fn subscribe(
        &self,
        request: SubscribeToTaskParams,
        context: Option<ClientCallContext>,
    ) -> A2AResult<ClientEventStream> {
        if !self.streaming_enabled().await {
            return Err(A2AError::unsupported_operation(
                "client and/or server do not support resubscription",
            ));
        }

        let card = self.card().await;
        let stream = self.transport.subscribe(request, context.as_ref()).await?;
        Ok(self.process_stream(stream, card, true))
    }

    /// Folds a raw response stream into client events via
    /// [`ClientTaskManager`].
    ///
    /// A leading `Message` ends the stream after being yielded; with
    /// `first_must_be_task` (the subscribe path) it is an invalid-state
    /// error instead.
    fn process_stream(
        &self,
        mut stream: ResponseStream,
        card: AgentCard,
        first_must_be_task: bool,
    ) -> ClientEventStream {
        let consumers = self.consumers.clone();

        let folded = async_stream::stream! {
            let mut tracker = ClientTaskManager::new();
            let mut saw_task = false;

            while let Some(item) = stream.next().await {
                let response = match item {
                    Ok(response) => response,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                };

                if let StreamResponse::Message(_) = response {
                    if first_must_be_task {
                        yield Err(A2AError::InvalidState(
                            "subscription stream must start with a Task".to_string(),
                        ));
                        break;
                    }
                    if saw_task {
                        // A standalone message is only legal as the first
                        // and only event of a stream.
                        yield Err(A2AError::InvalidState(
                            "received a Message after a Task in the stream".to_string(),
                        ));
                        break;
                    }
                    let event: ClientEvent = (response, None);
                    for consumer in &consumers {
                        consumer.consume(&event, &card).await;
                    }
                    yield Ok(event);
                    // A standalone message ends the exchange.
                    break;
                }
                saw_task = true;

                if let Err(e) = tracker.process(&response) {
                    yield Err(e);
                    break;
                }
                let task = match tracker.get_task_or_raise() {
                    Ok(task) => task.clone(),
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                };

                let event: ClientEvent = (response, Some(task));
                for consumer in &consumers {
                    consumer.consume(&event, &card).await;
                }
                yield Ok(event);
            }
        };

        folded.boxed()
    }

    /// `tasks/get`.
    pub async fn get_task(
        &self,
        request: GetTaskParams,
        context: Option<ClientCallContext>,
    ) -> A2AResult<Task> {
        self.transport.get_task(request, context.as_ref()).await
    }

    /// `tasks/list`.
    pub async fn list_tasks(
        &self,
        request: ListTasksParams,
        context: Option<ClientCallContext>,
    ) -> A2AResult<ListTasksResponse> {
        self.transport.list_tasks(request, context.as_ref()).await
    }

    /// `tasks/cancel`.
    pub async fn cancel_task(
        &self,
        request: CancelTaskParams,
        context: Option<ClientCallContext>,
    ) -> A2AResult<Task> {
        self.transport.cancel_task(request, context.as_ref()).await
    }

    /// `tasks/pushNotificationConfig/set`.
    pub async fn set_task_callback(
        &self,
        request: SetTaskPushNotificationConfigParams,
        context: Option<ClientCallContext>,
    ) -> A2AResult<TaskPushNotificationConfig> {
        self.transport
            .set_task_callback(request, context.as_ref())
            .await
    }

    /// `tasks/pushNotificationConfig/get`.
    pub async fn get_task_callback(
        &self,
        request: GetTaskPushNotificationConfigParams,
        context: Option<ClientCallContext>,
    ) -> A2AResult<TaskPushNotificationConfig> {
        self.transport
            .get_task_callback(request, context.as_ref())
            .await
    }

    /// `tasks/pushNotificationConfig/list`.
    pub async fn list_task_callbacks(
        &self,
        request: ListTaskPushNotificationConfigParams,
        context: Option<ClientCallContext>,
    ) -> A2AResult<Vec<TaskPushNotificationConfig>> {
        self.transport
            .list_task_callbacks(request, context.as_ref())
            .await
    }

    /// `tasks/pushNotificationConfig/delete`.
    pub async fn delete_task_callback(
        &self,
        request: DeleteTaskPushNotificationConfigParams,
        context: Option<ClientCallContext>,
    ) -> A2AResult<()> {
        self.transport
            .delete_task_callback(request, context.as_ref())
            .await
    }

    /// Fetches the authenticated extended card and adopts it as this
    /// client's card.
    pub async fn get_extended_agent_card(
        &self,
        context: Option<ClientCallContext>,
    ) -> A2AResult<AgentCard> {
        let card = self
            .transport
            .get_extended_agent_card(context.as_ref())
            .await?;
        *self.card.write().await = card.clone();
        Ok(card)
    }

    /// Closes the underlying transport.
    pub async fn close(&self) -> A2AResult<()> {
        self.transport.close().await
    }
}
