//! Golden wire-format checks: camelCase field names, `kind` discriminators,
//! and flat union serialization, pinned against the proto JSON shapes.

use serde_json::{json, Value};

use a2a_sdk::types::*;

fn text_message(id: &str) -> Message {
    Message::user(id, "hello")
}

#[test]
fn message_wire_shape() {
    let mut message = text_message("m1");
    message.task_id = Some("t1".to_string());
    message.context_id = Some("c1".to_string());

    let wire = serde_json::to_value(&message).unwrap();
    assert_eq!(
        wire,
        json!({
            "messageId": "m1",
            "role": "user",
            "kind": "message",
            "parts": [{"kind": "text", "text": "hello"}],
            "contextId": "c1",
            "taskId": "t1"
        })
    );
}

#[test]
fn task_wire_shape() {
    let task = Task {
        id: "t1".to_string(),
        context_id: "c1".to_string(),
        kind: "task".to_string(),
        status: TaskStatus {
            state: TaskState::Working,
            message: None,
            timestamp: Some("2024-01-01T00:00:00Z".to_string()),
        },
        artifacts: Some(vec![Artifact {
            artifact_id: "a1".to_string(),
            name: Some("out".to_string()),
            description: None,
            parts: vec![Part::text("chunk")],
            metadata: None,
            extensions: None,
        }]),
        history: None,
        metadata: None,
    };

    let wire = serde_json::to_value(&task).unwrap();
    assert_eq!(wire["kind"], "task");
    assert_eq!(wire["contextId"], "c1");
    assert_eq!(wire["status"]["state"], "working");
    assert_eq!(wire["status"]["timestamp"], "2024-01-01T00:00:00Z");
    assert_eq!(wire["artifacts"][0]["artifactId"], "a1");
    // Optional absent fields are omitted entirely.
    assert!(wire.get("history").is_none());
    assert!(wire.get("metadata").is_none());
}

#[test]
fn part_file_variants() {
    let bytes = Part::file_from_bytes("SGVsbG8=", Some("hello.txt".into()), Some("text/plain".into()));
    let wire = serde_json::to_value(&bytes).unwrap();
    assert_eq!(
        wire,
        json!({
            "kind": "file",
            "file": {"bytes": "SGVsbG8=", "mimeType": "text/plain", "name": "hello.txt"}
        })
    );

    let uri = Part::file_from_uri("https://example.com/doc.pdf", None, Some("application/pdf".into()));
    let wire = serde_json::to_value(&uri).unwrap();
    assert_eq!(wire["file"]["uri"], "https://example.com/doc.pdf");

    // Round-trip keeps the variant.
    let back: Part = serde_json::from_value(wire).unwrap();
    match back {
        Part::File {
            file: FileContent::Uri(f),
            ..
        } => assert_eq!(f.uri, "https://example.com/doc.pdf"),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn status_update_keeps_final_field_name() {
    let event = TaskStatusUpdateEvent {
        task_id: "t1".to_string(),
        context_id: "c1".to_string(),
        kind: "status-update".to_string(),
        status: TaskStatus::new(TaskState::Completed),
        r#final: true,
        metadata: None,
    };
    let wire = serde_json::to_value(&event).unwrap();
    assert_eq!(wire["final"], true);
    assert_eq!(wire["taskId"], "t1");
    assert_eq!(wire["kind"], "status-update");
}

#[test]
fn artifact_update_append_and_last_chunk() {
    let event = TaskArtifactUpdateEvent {
        task_id: "t1".to_string(),
        context_id: "c1".to_string(),
        kind: "artifact-update".to_string(),
        artifact: Artifact {
            artifact_id: "a1".to_string(),
            name: None,
            description: None,
            parts: vec![Part::text("x")],
            metadata: None,
            extensions: None,
        },
        append: Some(true),
        last_chunk: Some(true),
        metadata: None,
    };
    let wire = serde_json::to_value(&event).unwrap();
    assert_eq!(wire["append"], true);
    assert_eq!(wire["lastChunk"], true);
}

#[test]
fn stream_response_deserializes_every_kind() {
    let cases = [
        (json!({"kind": "task", "id": "t1", "contextId": "c1", "status": {"state": "working"}}), "task"),
        (json!({"kind": "message", "messageId": "m1", "role": "agent", "parts": []}), "message"),
        (
            json!({"kind": "status-update", "taskId": "t1", "contextId": "c1", "status": {"state": "working"}, "final": false}),
            "status-update",
        ),
        (
            json!({"kind": "artifact-update", "taskId": "t1", "contextId": "c1", "artifact": {"artifactId": "a1", "parts": []}}),
            "artifact-update",
        ),
    ];

    for (value, expected_kind) in cases {
        let event: StreamResponse = serde_json::from_value(value).unwrap();
        let back = serde_json::to_value(&event).unwrap();
        assert_eq!(back["kind"], expected_kind);
    }
}

#[test]
fn json_rpc_envelopes() {
    let request = JsonRpcRequest::new("1", "message/send", Some(json!({"x": 1})));
    let wire = serde_json::to_value(&request).unwrap();
    assert_eq!(wire["jsonrpc"], "2.0");
    assert_eq!(wire["id"], "1");
    assert_eq!(wire["method"], "message/send");

    let success = JsonRpcResponse::success(Some(JsonRpcId::Number(7)), json!({"ok": true}));
    let wire = serde_json::to_value(&success).unwrap();
    assert_eq!(wire["id"], 7);
    assert!(wire.get("error").is_none());

    let error = JsonRpcResponse::from_a2a_error(
        Some(JsonRpcId::String("9".into())),
        a2a_sdk::A2AError::task_not_found("t-404"),
    );
    let wire = serde_json::to_value(&error).unwrap();
    assert_eq!(wire["error"]["code"], -32001);
    assert!(wire.get("result").is_none());
}

#[test]
fn push_config_wire_shape() {
    let config = TaskPushNotificationConfig {
        task_id: "t1".to_string(),
        push_notification_config: PushNotificationConfig {
            id: Some("c1".to_string()),
            url: "https://hook.example".to_string(),
            token: Some("secret".to_string()),
            authentication: Some(PushNotificationAuthenticationInfo {
                schemes: vec!["Bearer".to_string()],
                credentials: None,
            }),
        },
    };
    let wire = serde_json::to_value(&config).unwrap();
    assert_eq!(wire["taskId"], "t1");
    assert_eq!(wire["pushNotificationConfig"]["url"], "https://hook.example");
    assert_eq!(
        wire["pushNotificationConfig"]["authentication"]["schemes"][0],
        "Bearer"
    );
}

#[test]
fn agent_card_round_trip() {
    let card_json = json!({
        "name": "Remote Agent",
        "description": "Does things",
        "version": "2.0.0",
        "protocolVersion": "0.3.0",
        "url": "http://agent.example",
        "preferredTransport": "GRPC",
        "additionalInterfaces": [
            {"transport": "JSONRPC", "url": "http://agent.example/rpc"}
        ],
        "capabilities": {"streaming": true, "pushNotifications": false},
        "securitySchemes": {
            "api-key": {"type": "apiKey", "in": "header", "name": "X-API-Key"}
        },
        "security": [{"api-key": []}],
        "defaultInputModes": ["text/plain"],
        "defaultOutputModes": ["text/plain"],
        "skills": [
            {"id": "chat", "name": "Chat", "description": "Talks", "tags": ["conversation"]}
        ]
    });

    let card: AgentCard = serde_json::from_value(card_json.clone()).unwrap();
    assert_eq!(card.preferred_transport.as_deref(), Some("GRPC"));
    assert_eq!(card.additional_interfaces.as_ref().unwrap().len(), 1);
    assert_eq!(card.capabilities.streaming, Some(true));

    let wire = serde_json::to_value(&card).unwrap();
    assert_eq!(wire["securitySchemes"]["api-key"]["in"], "header");
    assert_eq!(wire["skills"][0]["id"], "chat");
}

#[test]
fn unknown_wire_kind_is_rejected() {
    let result: Result<StreamResponse, _> =
        serde_json::from_value(json!({"kind": "telepathy"}));
    assert!(result.is_err());

    let result: Result<SendMessageResponse, _> = serde_json::from_value(json!({"no": "kind"}));
    assert!(result.is_err());
}

#[test]
fn list_tasks_response_shape() {
    let response = ListTasksResponse {
        tasks: vec![],
        next_page_token: String::new(),
        page_size: 0,
        total_size: 0,
    };
    let wire = serde_json::to_value(&response).unwrap();
    // An empty token is omitted rather than serialized as "".
    assert!(wire.get("nextPageToken").is_none());
    assert_eq!(wire["pageSize"], 0);
    assert_eq!(wire["totalSize"], 0);

    let parsed: ListTasksResponse = serde_json::from_value(json!({
        "tasks": [],
        "nextPageToken": "b2s=",
        "pageSize": 0,
        "totalSize": 5
    }))
    .unwrap();
    assert_eq!(parsed.next_page_token, "b2s=");

    let value: Value = json!({"tasks": [], "pageSize": 0, "totalSize": 0});
    let parsed: ListTasksResponse = serde_json::from_value(value).unwrap();
    assert_eq!(parsed.next_page_token, "");
}
