//! Server-sent event re-assembly for streaming responses.
//!
//! Parses `data:` lines from an HTTP response body into [`StreamResponse`]
//! events. Payloads may be raw events or JSON-RPC success envelopes (the
//! JSON-RPC binding wraps every frame); both are handled. Malformed frames
//! surface as HTTP 400 client errors.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::Stream;
use tokio::sync::mpsc;

use crate::error::{A2AError, A2AResult};
use crate::types::StreamResponse;

/// A stream of parsed server-sent events.
///
/// Supports pull-based consumption via [`next`](SseStream::next) or
/// conversion into a `futures::Stream` via
/// [`into_stream`](SseStream::into_stream).
pub struct SseStream {
    receiver: mpsc::Receiver<A2AResult<StreamResponse>>,
    /// Keeps the background parsing task alive.
    _task: tokio::task::JoinHandle<()>,
}

impl std::fmt::Debug for SseStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseStream").finish_non_exhaustive()
    }
}

impl SseStream {
    /// Spawns a parser over the response body.
    pub(crate) fn from_response(response: reqwest::Response) -> Self {
        let (tx, rx) = mpsc::channel(64);

        let task = tokio::spawn(async move {
            if let Err(e) = parse_sse_stream(response, &tx).await {
                let _ = tx.send(Err(e)).await;
            }
        });

        SseStream {
            receiver: rx,
            _task: task,
        }
    }

    /// The next event; `None` when the server closed the stream.
    pub async fn next(&mut self) -> Option<A2AResult<StreamResponse>> {
        self.receiver.recv().await
    }

    /// Converts into a `futures::Stream`.
    pub fn into_stream(self) -> SseStreamAdapter {
        SseStreamAdapter {
            receiver: self.receiver,
            _task: self._task,
        }
    }
}

/// `futures::Stream` adapter for [`SseStream`].
pub struct SseStreamAdapter {
    receiver: mpsc::Receiver<A2AResult<StreamResponse>>,
    _task: tokio::task::JoinHandle<()>,
}

impl Stream for SseStreamAdapter {
    type Item = A2AResult<StreamResponse>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

async fn parse_sse_stream(
    response: reqwest::Response,
    tx: &mpsc::Sender<A2AResult<StreamResponse>>,
) -> A2AResult<()> {
    use futures::StreamExt;

    let mut stream = response.bytes_stream();
    let mut buffer = String::new();

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result
            .map_err(|e| A2AError::Transport(format!("error reading SSE stream: {e}")))?;

        let text = std::str::from_utf8(&chunk)
            .map_err(|e| A2AError::Transport(format!("invalid UTF-8 in SSE stream: {e}")))?;
        buffer.push_str(text);

        while let Some(newline_pos) = buffer.find('\n') {
            let line = buffer[..newline_pos].trim_end_matches('\r').to_string();
            buffer = buffer[newline_pos + 1..].to_string();

            if let Some(event) = parse_sse_line(&line)? {
                if tx.send(Ok(event)).await.is_err() {
                    // Receiver dropped; stop parsing.
                    return Ok(());
                }
            }
        }
    }

    // Trailing data without a final newline.
    if !buffer.trim().is_empty() {
        if let Some(event) = parse_sse_line(buffer.trim())? {
            let _ = tx.send(Ok(event)).await;
        }
    }

    Ok(())
}

/// Parses one SSE line; `data:` lines yield events, everything else
/// (comments, field names, keep-alives) yields nothing.
fn parse_sse_line(line: &str) -> A2AResult<Option<StreamResponse>> {
    if line.is_empty() || line.starts_with(':') {
        return Ok(None);
    }

    let Some(data) = line.strip_prefix("data:") else {
        // Other SSE fields (event:, id:, retry:) carry no payload for us.
        return Ok(None);
    };
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }

    let value: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| A2AError::http(400, format!("malformed SSE event data: {e}")))?;

    // JSON-RPC envelope: unwrap the result, or surface the error.
    let event_value = if value.get("jsonrpc").is_some() {
        if let Some(error) = value.get("error") {
            let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(-1);
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error")
                .to_string();
            let data = error.get("data").cloned();
            return Err(A2AError::JsonRpc { code, message, data });
        }
        value.get("result").cloned().ok_or_else(|| {
            A2AError::http(
                400,
                "JSON-RPC SSE frame has neither 'result' nor 'error'".to_string(),
            )
        })?
    } else {
        value
    };

    let event: StreamResponse = serde_json::from_value(event_value)
        .map_err(|e| A2AError::http(400, format!("malformed SSE stream response: {e}")))?;

    Ok(Some(event))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_comments_empty_lines_and_other_fields() {
        assert!(parse_sse_line("").unwrap().is_none());
        assert!(parse_sse_line(": keepalive").unwrap().is_none());
        assert!(parse_sse_line("event: update").unwrap().is_none());
        assert!(parse_sse_line("id: 123").unwrap().is_none());
        assert!(parse_sse_line("retry: 5000").unwrap().is_none());
        assert!(parse_sse_line("data:").unwrap().is_none());
        assert!(parse_sse_line("data: [DONE]").unwrap().is_none());
    }

    #[test]
    fn parses_raw_event() {
        let line = r#"data: {"kind":"message","messageId":"m1","role":"agent","parts":[{"kind":"text","text":"hi"}]}"#;
        let event = parse_sse_line(line).unwrap().unwrap();
        assert!(matches!(event, StreamResponse::Message(_)));
    }

    #[test]
    fn unwraps_json_rpc_envelope() {
        let line = r#"data: {"jsonrpc":"2.0","id":"1","result":{"kind":"message","messageId":"m1","role":"agent","parts":[]}}"#;
        let event = parse_sse_line(line).unwrap().unwrap();
        assert!(matches!(event, StreamResponse::Message(_)));
    }

    #[test]
    fn surfaces_json_rpc_error_frames() {
        let line = r#"data: {"jsonrpc":"2.0","id":"1","error":{"code":-32001,"message":"Task not found"}}"#;
        match parse_sse_line(line) {
            Err(A2AError::JsonRpc { code, .. }) => assert_eq!(code, -32001),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn malformed_json_is_a_400() {
        match parse_sse_line("data: {not valid json}") {
            Err(A2AError::Http { status, .. }) => assert_eq!(status, 400),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
