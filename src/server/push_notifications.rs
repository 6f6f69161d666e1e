//! Push notifications: per-owner webhook config storage and fan-out of
//! task snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use crate::error::A2AResult;
use crate::types::{PushNotificationConfig, StreamResponse, Task};
use crate::utils::constants::NOTIFICATION_TOKEN_HEADER;

/// Stores webhook configurations scoped by `(owner, task_id)`.
///
/// An owner may register multiple configs per task. Configs are deleted
/// explicitly or when the task is deleted.
#[async_trait]
pub trait PushNotificationConfigStore: Send + Sync {
    /// Adds or replaces a config for the task. A config without an id is
    /// assigned the task id.
    async fn set_info(
        &self,
        owner: &str,
        task_id: &str,
        config: &PushNotificationConfig,
    ) -> A2AResult<()>;

    /// All configs registered for the task by this owner.
    async fn get_info(&self, owner: &str, task_id: &str) -> A2AResult<Vec<PushNotificationConfig>>;

    /// Removes one config (or the task-id-named default when `config_id` is
    /// `None`).
    async fn delete_info(
        &self,
        owner: &str,
        task_id: &str,
        config_id: Option<&str>,
    ) -> A2AResult<()>;
}

/// In-memory [`PushNotificationConfigStore`].
#[derive(Default)]
pub struct InMemoryPushNotificationConfigStore {
    infos: RwLock<HashMap<(String, String), Vec<PushNotificationConfig>>>,
}

impl InMemoryPushNotificationConfigStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PushNotificationConfigStore for InMemoryPushNotificationConfigStore {
    async fn set_info(
        &self,
        owner: &str,
        task_id: &str,
        config: &PushNotificationConfig,
    ) -> A2AResult<()> {
        let mut infos = self.infos.write().await;
        let configs = infos
            .entry((owner.to_string(), task_id.to_string()))
            .or_default();

        let mut config = config.clone();
        if config.id.is_none() {
            config.id = Some(task_id.to_string());
        }

        if let Some(ref id) = config.id {
            configs.retain(|c| c.id.as_deref() != Some(id));
        }
        configs.push(config);

        debug!(owner, task_id, "Push notification config saved");
        Ok(())
    }

    async fn get_info(&self, owner: &str, task_id: &str) -> A2AResult<Vec<PushNotificationConfig>> {
        let infos = self.infos.read().await;
        Ok(infos
            .get(&(owner.to_string(), task_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_info(
        &self,
        owner: &str,
        task_id: &str,
        config_id: Option<&str>,
    ) -> A2AResult<()> {
        let mut infos = self.infos.write().await;
        let key = (owner.to_string(), task_id.to_string());
        let target = config_id.unwrap_or(task_id);

        if let Some(configs) = infos.get_mut(&key) {
            let before = configs.len();
            configs.retain(|c| c.id.as_deref() != Some(target));
            if configs.len() == before {
                debug!(owner, task_id, config_id = target, "Config not found for delete");
            }
            if configs.is_empty() {
                infos.remove(&key);
            }
        }
        Ok(())
    }
}

/// Delivers task snapshots to registered webhooks.
#[async_trait]
pub trait PushNotificationSender: Send + Sync {
    /// Posts the task snapshot to every config registered for
    /// `(owner, task.id)`.
    async fn send_notification(&self, owner: &str, task: &Task) -> A2AResult<()>;
}

/// HTTP [`PushNotificationSender`]: POSTs the snapshot, wrapped as a stream
/// response, to each webhook URL concurrently. Individual failures are
/// logged and never abort the other deliveries.
pub struct HttpPushNotificationSender {
    client: reqwest::Client,
    config_store: Arc<dyn PushNotificationConfigStore>,
}

impl HttpPushNotificationSender {
    /// Sender reading configs from the given store.
    pub fn new(config_store: Arc<dyn PushNotificationConfigStore>) -> Self {
        HttpPushNotificationSender {
            client: reqwest::Client::new(),
            config_store,
        }
    }

    /// Sender reusing an existing HTTP client.
    pub fn with_client(
        client: reqwest::Client,
        config_store: Arc<dyn PushNotificationConfigStore>,
    ) -> Self {
        HttpPushNotificationSender {
            client,
            config_store,
        }
    }

    async fn dispatch(&self, task: &Task, config: PushNotificationConfig) -> bool {
        let payload = StreamResponse::Task(task.clone());
        let mut request = self.client.post(&config.url).json(&payload);
        if let Some(ref token) = config.token {
            request = request.header(NOTIFICATION_TOKEN_HEADER, token);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                debug!(task_id = %task.id, url = %config.url, "Push notification delivered");
                true
            }
            Ok(response) => {
                error!(
                    task_id = %task.id,
                    url = %config.url,
                    status = %response.status(),
                    "Push notification rejected"
                );
                false
            }
            Err(e) => {
                error!(
                    task_id = %task.id,
                    url = %config.url,
                    error = %e,
                    "Push notification failed"
                );
                false
            }
        }
    }
}

#[async_trait]
impl PushNotificationSender for HttpPushNotificationSender {
    async fn send_notification(&self, owner: &str, task: &Task) -> A2AResult<()> {
        let configs = self.config_store.get_info(owner, &task.id).await?;
        if configs.is_empty() {
            return Ok(());
        }

        let deliveries = configs.into_iter().map(|config| self.dispatch(task, config));
        let results = futures::future::join_all(deliveries).await;

        if results.iter().any(|ok| !ok) {
            warn!(task_id = %task.id, "Some push notifications failed to send");
        }
        Ok(())
    }
}
