//! Subprocess stdio client transport.
//!
//! Spawns a child process and exchanges newline-delimited JSON over its
//! stdin/stdout. A background reader loop dispatches each stdout line to
//! the pending request with the matching `id`. Streaming responses reuse
//! one `id` for multiple `result` objects and terminate with an explicit
//! `{"eos": true}` marker.
//!
//! Closing the transport stops the reader, closes the child's stdin, waits
//! two seconds for a clean exit, kills the process if it is still alive,
//! and fails every pending request with a connection-closed error.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{A2AError, A2AResult};
use crate::types::{
    AgentCard, CancelTaskParams, DeleteTaskPushNotificationConfigParams, GetTaskParams,
    GetTaskPushNotificationConfigParams, ListTaskPushNotificationConfigParams, ListTasksParams,
    ListTasksResponse, SendMessageParams, SendMessageResponse,
    SetTaskPushNotificationConfigParams, StreamResponse, SubscribeToTaskParams, Task,
    TaskPushNotificationConfig,
};
use crate::utils::constants::methods;

use super::transport::{ClientCallContext, ClientTransport, ResponseStream};

/// Grace period between closing stdin and killing the subprocess.
const TERMINATE_TIMEOUT: Duration = Duration::from_secs(2);

enum Pending {
    /// One response object expected.
    Unary(oneshot::Sender<Value>),
    /// Repeated `result` objects until the eos marker.
    Streaming(mpsc::UnboundedSender<Value>),
}

struct Process {
    child: Child,
    stdin: ChildStdin,
    reader: JoinHandle<()>,
}

/// Client transport over a subprocess's stdin/stdout.
pub struct StdioTransport {
    command: Vec<String>,
    cwd: Option<String>,
    env: Vec<(String, String)>,
    agent_card: Option<AgentCard>,
    process: Mutex<Option<Process>>,
    pending: Arc<Mutex<HashMap<String, Pending>>>,
}

impl std::fmt::Debug for StdioTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioTransport")
            .field("command", &self.command)
            .finish_non_exhaustive()
    }
}

impl StdioTransport {
    /// Transport spawning `command` on first use.
    pub fn new(command: Vec<String>) -> Self {
        StdioTransport {
            command,
            cwd: None,
            env: Vec::new(),
            agent_card: None,
            process: Mutex::new(None),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Sets the child's working directory.
    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Adds an environment variable for the child.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Supplies the agent card returned by
    /// [`get_extended_agent_card`](ClientTransport::get_extended_agent_card).
    pub fn with_agent_card(mut self, card: AgentCard) -> Self {
        self.agent_card = Some(card);
        self
    }

    async fn ensure_started(&self) -> A2AResult<()> {
        let mut process = self.process.lock().await;
        if let Some(ref mut p) = *process {
            if p.child.try_wait().ok().flatten().is_none() {
                return Ok(());
            }
            // Child exited; respawn below.
        }

        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| A2AError::InvalidArgs("stdio command is empty".into()))?;

        debug!(command = ?self.command, "Spawning stdio transport process");
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| A2AError::Transport(format!("failed to spawn subprocess: {e}")))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| A2AError::InvalidState("subprocess has no stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| A2AError::InvalidState("subprocess has no stdout".into()))?;

        let pending = self.pending.clone();
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => dispatch_line(&pending, &line).await,
                    Ok(None) => break, // EOF
                    Err(e) => {
                        warn!(error = %e, "stdio reader failed");
                        break;
                    }
                }
            }
            fail_all_pending(&pending, "Subprocess terminated").await;
        });

        *process = Some(Process { child, stdin, reader });
        Ok(())
    }

    /// Writes one newline-terminated JSON request.
    async fn send_json(&self, id: &str, method: &str, params: Value) -> A2AResult<()> {
        self.ensure_started().await?;

        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let mut line = serde_json::to_string(&payload)?;
        line.push('\n');

        let mut process = self.process.lock().await;
        let process = process
            .as_mut()
            .ok_or_else(|| A2AError::InvalidState("Process not started".into()))?;
        process
            .stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| A2AError::Transport(format!("failed to write to subprocess: {e}")))?;
        process
            .stdin
            .flush()
            .await
            .map_err(|e| A2AError::Transport(format!("failed to flush subprocess stdin: {e}")))?;
        Ok(())
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> A2AResult<T> {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();

        // Register before writing so the reader can never race the
        // registration.
        self.pending.lock().await.insert(id.clone(), Pending::Unary(tx));
        if let Err(e) = self.send_json(&id, method, params).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let response = rx.await.map_err(|_| {
            A2AError::Transport("Transport closed before response".to_string())
        })?;
        self.pending.lock().await.remove(&id);

        if let Some(error) = response.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(-1);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(A2AError::JsonRpc {
                code,
                message,
                data: error.get("data").cloned(),
            });
        }
        let result = response
            .get("result")
            .cloned()
            .ok_or_else(|| A2AError::InvalidJson("Missing result in response".into()))?;
        serde_json::from_value(result)
            .map_err(|e| A2AError::InvalidJson(format!("unexpected result shape: {e}")))
    }

    async fn request_stream(&self, method: &str, params: Value) -> A2AResult<ResponseStream> {
        let id = Uuid::new_v4().to_string();
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.pending
            .lock()
            .await
            .insert(id.clone(), Pending::Streaming(tx));
        if let Err(e) = self.send_json(&id, method, params).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let pending = self.pending.clone();
        let stream = async_stream::stream! {
            while let Some(result) = rx.recv().await {
                let event: Result<StreamResponse, _> = serde_json::from_value(result);
                match event {
                    Ok(event) => yield Ok(event),
                    Err(e) => {
                        yield Err(A2AError::InvalidJson(format!(
                            "unexpected streaming result shape: {e}"
                        )));
                        break;
                    }
                }
            }
            pending.lock().await.remove(&id);
        };

        Ok(Box::pin(stream))
    }
}

/// Routes one stdout line to its pending request.
async fn dispatch_line(pending: &Arc<Mutex<HashMap<String, Pending>>>, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    let message: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(_) => {
            warn!("Malformed JSON from subprocess: {line}");
            return;
        }
    };
    let Some(id) = message.get("id").and_then(Value::as_str).map(String::from) else {
        return;
    };

    let mut pending = pending.lock().await;

    if message.get("eos").and_then(Value::as_bool) == Some(true) {
        // End-of-stream: dropping the sender ends the consumer loop.
        pending.remove(&id);
        return;
    }

    match pending.get(&id) {
        Some(Pending::Streaming(tx)) => {
            if let Some(result) = message.get("result") {
                let _ = tx.send(result.clone());
            }
        }
        Some(Pending::Unary(_)) => {
            if let Some(Pending::Unary(tx)) = pending.remove(&id) {
                let _ = tx.send(message);
            }
        }
        None => {}
    }
}

async fn fail_all_pending(pending: &Arc<Mutex<HashMap<String, Pending>>>, _reason: &str) {
    // Dropping the senders fails unary waiters and ends streaming loops.
    pending.lock().await.clear();
}


#[async_trait]
impl ClientTransport for StdioTransport {
    async fn send_message(
        &self,
        params: SendMessageParams,
        _context: Option<&ClientCallContext>,
    ) -> A2AResult<SendMessageResponse> {
        self.request(methods::MESSAGE_SEND, serde_json::to_value(params)?).await
    }

    async fn send_message_streaming(
        &self,
        params: SendMessageParams,
        _context: Option<&ClientCallContext>,
    ) -> A2AResult<ResponseStream> {
        self.request_stream(methods::MESSAGE_STREAM, serde_json::to_value(params)?)
            .await
    }

    async fn get_task(
        &self,
        params: GetTaskParams,
        _context: Option<&ClientCallContext>,
    ) -> A2AResult<Task> {
        self.request(methods::TASKS_GET, serde_json::to_value(params)?).await
    }

    async fn list_tasks(
        &self,
        params: ListTasksParams,
        _context: Option<&ClientCallContext>,
    ) -> A2AResult<ListTasksResponse> {
        self.request(methods::TASKS_LIST, serde_json::to_value(params)?).await
    }

    async fn cancel_task(
        &self,
        params: CancelTaskParams,
        _context: Option<&ClientCallContext>,
    ) -> A2AResult<Task> {
        self.request(methods::TASKS_CANCEL, serde_json::to_value(params)?).await
    }

    async fn set_task_callback(
        &self,
        params: SetTaskPushNotificationConfigParams,
        _context: Option<&ClientCallContext>,
    ) -> A2AResult<TaskPushNotificationConfig> {
        self.request(methods::PUSH_CONFIG_SET, serde_json::to_value(params)?).await
    }

    async fn get_task_callback(
        &self,
        params: GetTaskPushNotificationConfigParams,
        _context: Option<&ClientCallContext>,
    ) -> A2AResult<TaskPushNotificationConfig> {
        self.request(methods::PUSH_CONFIG_GET, serde_json::to_value(params)?).await
    }

    async fn list_task_callbacks(
        &self,
        params: ListTaskPushNotificationConfigParams,
        _context: Option<&ClientCallContext>,
    ) -> A2AResult<Vec<TaskPushNotificationConfig>> {
        self.request(methods::PUSH_CONFIG_LIST, serde_json::to_value(params)?).await
    }

    async fn delete_task_callback(
        &self,
        params: DeleteTaskPushNotificationConfigParams,
        _context: Option<&ClientCallContext>,
    ) -> A2AResult<()> {
        let _: Value = self
            .request(methods::PUSH_CONFIG_DELETE, serde_json::to_value(params)?)
            .await?;
        Ok(())
    }

    async fn subscribe(
        &self,
        params: SubscribeToTaskParams,
        _context: Option<&ClientCallContext>,
    ) -> A2AResult<ResponseStream> {
        self.request_stream(methods::TASKS_RESUBSCRIBE, serde_json::to_value(params)?)
            .await
    }

    async fn get_extended_agent_card(
        &self,
        _context: Option<&ClientCallContext>,
    ) -> A2AResult<AgentCard> {
        self.agent_card.clone().ok_or_else(|| {
            A2AError::InvalidState("Agent card retrieval over stdio is not available".into())
        })
    }

    async fn close(&self) -> A2AResult<()> {
        let process = self.process.lock().await.take();
        if let Some(mut process) = process {
            process.reader.abort();

            // Closing stdin signals the child to exit; kill after the grace
            // period.
            drop(process.stdin);
            match tokio::time::timeout(TERMINATE_TIMEOUT, process.child.wait()).await {
                Ok(_) => {}
                Err(_) => {
                    warn!("Subprocess did not exit in time; killing");
                    let _ = process.child.kill().await;
                }
            }
        }

        fail_all_pending(&self.pending, "Transport closed before response").await;
        Ok(())
    }
}
