//! Task persistence: the [`TaskStore`] interface and the in-memory
//! reference implementation.
//!
//! Production deployments back the trait with a database; the in-memory
//! store exists for development, tests, and short-lived servers. Listing
//! implements the protocol's pagination contract: pages ordered by status
//! timestamp descending (ties broken by id descending, missing timestamps
//! last), continuation tokens being the base64 of the last returned task
//! id.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::A2AResult;
use crate::types::{ListTasksParams, ListTasksResponse, Task};
use crate::utils::task::{decode_page_token, encode_page_token};

/// Default page size for `tasks/list`.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Persists and retrieves tasks.
///
/// Implementations must be safe for concurrent multi-writer use; per-task
/// write ordering is the [`TaskManager`](super::task_manager::TaskManager)'s
/// responsibility.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Saves or overwrites a task.
    async fn save(&self, task: Task) -> A2AResult<()>;

    /// Fetches a task by id.
    async fn get(&self, task_id: &str) -> A2AResult<Option<Task>>;

    /// Deletes a task by id; succeeds silently when absent.
    async fn delete(&self, task_id: &str) -> A2AResult<()>;

    /// Lists tasks with filtering and pagination.
    async fn list(&self, params: &ListTasksParams) -> A2AResult<ListTasksResponse>;
}

/// `HashMap`-backed [`TaskStore`]; contents are lost on process exit.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<String, Task>>,
}

impl InMemoryTaskStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn status_timestamp(task: &Task) -> Option<DateTime<Utc>> {
    task.status
        .timestamp
        .as_deref()
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn save(&self, task: Task) -> A2AResult<()> {
        let task_id = task.id.clone();
        let mut tasks = self.tasks.write().await;
        let is_new = !tasks.contains_key(&task_id);
        tasks.insert(task_id.clone(), task);
        debug!(task_id = %task_id, is_new, "Task saved");
        Ok(())
    }

    async fn get(&self, task_id: &str) -> A2AResult<Option<Task>> {
        let tasks = self.tasks.read().await;
        let task = tasks.get(task_id).cloned();
        debug!(task_id = %task_id, found = task.is_some(), "Task lookup");
        Ok(task)
    }

    async fn delete(&self, task_id: &str) -> A2AResult<()> {
        let mut tasks = self.tasks.write().await;
        if tasks.remove(task_id).is_none() {
            warn!(task_id = %task_id, "Attempted to delete non-existent task");
        }
        Ok(())
    }

    async fn list(&self, params: &ListTasksParams) -> A2AResult<ListTasksResponse> {
        let after = params
            .status_timestamp_after
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let tasks = self.tasks.read().await;
        let mut matching: Vec<&Task> = tasks
            .values()
            .filter(|task| {
                if let Some(ref ctx) = params.context_id {
                    if task.context_id != *ctx {
                        return false;
                    }
                }
                if let Some(status) = params.status {
                    if task.status.state != status {
                        return false;
                    }
                }
                if let Some(after) = after {
                    match status_timestamp(task) {
                        Some(ts) if ts > after => {}
                        _ => return false,
                    }
                }
                true
            })
            .collect();

        // Newest status first; ties and missing timestamps fall back to id
        // descending, timestamp-less tasks sort last.
        matching.sort_by(|a, b| {
            let (ta, tb) = (status_timestamp(a), status_timestamp(b));
            match (ta, tb) {
                (Some(ta), Some(tb)) => tb.cmp(&ta).then_with(|| b.id.cmp(&a.id)),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => b.id.cmp(&a.id),
            }
        });

        let total_size = matching.len();

        let start = match params.page_token.as_deref() {
            Some(token) if !token.is_empty() => {
                let last_id = decode_page_token(token)?;
                match matching.iter().position(|t| t.id == last_id) {
                    Some(pos) => pos + 1,
                    None => {
                        warn!(page_token = %token, "Page token refers to an unknown task; restarting");
                        0
                    }
                }
            }
            _ => 0,
        };

        let page_size = match params.page_size {
            Some(size) if size > 0 => size as usize,
            _ => DEFAULT_PAGE_SIZE,
        };

        let page: Vec<Task> = matching
            .iter()
            .skip(start)
            .take(page_size)
            .map(|t| (*t).clone())
            .collect();

        let next_page_token = if start + page.len() < total_size {
            page.last()
                .map(|t| encode_page_token(&t.id))
                .unwrap_or_default()
        } else {
            String::new()
        };

        debug!(count = page.len(), total = total_size, "Listed tasks");

        Ok(ListTasksResponse {
            page_size: page.len() as i32,
            tasks: page,
            next_page_token,
            total_size: total_size as i32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TaskState, TaskStatus};

    fn task(id: &str, ctx: &str, state: TaskState, timestamp: Option<&str>) -> Task {
        Task {
            id: id.to_string(),
            context_id: ctx.to_string(),
            kind: "task".to_string(),
            status: TaskStatus {
                state,
                message: None,
                timestamp: timestamp.map(String::from),
            },
            artifacts: None,
            history: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn save_get_delete() {
        let store = InMemoryTaskStore::new();
        store.save(task("t1", "c1", TaskState::Submitted, None)).await.unwrap();
        assert!(store.get("t1").await.unwrap().is_some());
        store.delete("t1").await.unwrap();
        assert!(store.get("t1").await.unwrap().is_none());
        // Deleting again is fine.
        store.delete("t1").await.unwrap();
    }

    #[tokio::test]
    async fn list_orders_by_timestamp_desc_nulls_last() {
        let store = InMemoryTaskStore::new();
        store
            .save(task("t-old", "c", TaskState::Completed, Some("2024-01-01T00:00:00Z")))
            .await
            .unwrap();
        store
            .save(task("t-new", "c", TaskState::Completed, Some("2024-06-01T00:00:00Z")))
            .await
            .unwrap();
        store.save(task("t-null", "c", TaskState::Completed, None)).await.unwrap();

        let response = store.list(&ListTasksParams::default()).await.unwrap();
        let ids: Vec<&str> = response.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t-new", "t-old", "t-null"]);
    }

    #[tokio::test]
    async fn list_breaks_timestamp_ties_by_id_desc() {
        let store = InMemoryTaskStore::new();
        let ts = Some("2024-01-01T00:00:00Z");
        store.save(task("t-a", "c", TaskState::Working, ts)).await.unwrap();
        store.save(task("t-b", "c", TaskState::Working, ts)).await.unwrap();

        let response = store.list(&ListTasksParams::default()).await.unwrap();
        let ids: Vec<&str> = response.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t-b", "t-a"]);
    }

    #[tokio::test]
    async fn list_filters_by_context_status_and_timestamp() {
        let store = InMemoryTaskStore::new();
        store
            .save(task("t1", "c1", TaskState::Completed, Some("2024-03-01T00:00:00Z")))
            .await
            .unwrap();
        store
            .save(task("t2", "c2", TaskState::Completed, Some("2024-03-01T00:00:00Z")))
            .await
            .unwrap();
        store
            .save(task("t3", "c1", TaskState::Working, Some("2024-01-01T00:00:00Z")))
            .await
            .unwrap();

        let response = store
            .list(&ListTasksParams {
                context_id: Some("c1".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(response.tasks.len(), 2);

        let response = store
            .list(&ListTasksParams {
                status: Some(TaskState::Completed),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(response.tasks.len(), 2);

        let response = store
            .list(&ListTasksParams {
                status_timestamp_after: Some("2024-02-01T00:00:00Z".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(response.tasks.len(), 2);
    }

    #[tokio::test]
    async fn list_paginates_with_tokens() {
        let store = InMemoryTaskStore::new();
        for i in 0..5 {
            store
                .save(task(
                    &format!("t{i}"),
                    "c",
                    TaskState::Completed,
                    Some(&format!("2024-01-0{}T00:00:00Z", i + 1)),
                ))
                .await
                .unwrap();
        }

        let page1 = store
            .list(&ListTasksParams {
                page_size: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page1.tasks.len(), 2);
        assert_eq!(page1.total_size, 5);
        assert!(!page1.next_page_token.is_empty());

        let page2 = store
            .list(&ListTasksParams {
                page_size: Some(2),
                page_token: Some(page1.next_page_token.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page2.tasks.len(), 2);
        assert_ne!(page1.tasks[0].id, page2.tasks[0].id);

        let page3 = store
            .list(&ListTasksParams {
                page_size: Some(2),
                page_token: Some(page2.next_page_token.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page3.tasks.len(), 1);
        assert!(page3.next_page_token.is_empty());
    }

    #[tokio::test]
    async fn list_rejects_invalid_token() {
        let store = InMemoryTaskStore::new();
        let result = store
            .list(&ListTasksParams {
                page_token: Some("!!!".into()),
                ..Default::default()
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn list_zero_page_size_uses_default() {
        let store = InMemoryTaskStore::new();
        for i in 0..3 {
            store
                .save(task(&format!("t{i}"), "c", TaskState::Working, None))
                .await
                .unwrap();
        }
        let response = store
            .list(&ListTasksParams {
                page_size: Some(0),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(response.tasks.len(), 3);
    }
}
