//! JSON-RPC flows through the full server: initialize, list, call.

use pubsub_admin_mcp::mcp::{JsonRpcRequest, StdioTransport};
use pubsub_admin_mcp::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::AsyncReadExt;

async fn admin_server() -> (LoopbackServer, AdminMcpServer) {
    let loopback = LoopbackServer::new();
    let sessions = Arc::new(SessionRegistry::new());
    sessions.bind(DEFAULT_SESSION_ID, loopback.connect("admin", "password").unwrap());
    let server = build_server(&AdminConfig::default(), sessions).await.unwrap();
    (loopback, server)
}

fn call(id: i64, tool: &str, arguments: Value) -> JsonRpcRequest {
    JsonRpcRequest::new(
        Some(json!(id)),
        "tools/call",
        Some(json!({"name": tool, "arguments": arguments})),
    )
}

fn call_in_session(id: i64, tool: &str, arguments: Value, session_id: &str) -> JsonRpcRequest {
    JsonRpcRequest::new(
        Some(json!(id)),
        "tools/call",
        Some(json!({
            "name": tool,
            "arguments": arguments,
            "_meta": {"sessionId": session_id}
        })),
    )
}

#[tokio::test]
async fn test_initialize_and_list() {
    let (_loopback, server) = admin_server().await;

    let response = server
        .handle(JsonRpcRequest::new(
            Some(json!(1)),
            "initialize",
            Some(json!({
                "protocolVersion": "2025-03-26",
                "capabilities": {},
                "clientInfo": {"name": "inspector", "version": "1.0.0"}
            })),
        ))
        .await
        .unwrap();
    let result = response.result.unwrap();
    assert_eq!(result["protocolVersion"], "2025-03-26");
    assert_eq!(result["serverInfo"]["name"], "pubsub-admin-mcp");
    assert!(result["capabilities"]["tools"].is_object());
    assert_eq!(server.client().unwrap().version, "1.0.0");

    let response = server
        .handle(JsonRpcRequest::new(Some(json!(2)), "tools/list", None))
        .await
        .unwrap();
    let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();
    assert_eq!(tools.len(), 41);
    assert!(tools.iter().all(|tool| tool["inputSchema"]["type"] == "object"));
    assert_eq!(tools[0]["name"], "abstain_anonymous_connections");
}

#[tokio::test]
async fn test_call_success_and_tool_errors() {
    let (_loopback, server) = admin_server().await;

    let response = server
        .handle(call(1, "isolate_path", json!({"path": "secure/"})))
        .await
        .unwrap();
    let result = response.result.unwrap();
    assert!(result.get("isError").is_none());
    assert_eq!(result["structuredContent"], json!({"path": "secure/", "status": "isolated"}));

    // Tool failures are results, not protocol errors.
    let response = server
        .handle(call_in_session(2, "isolate_path", json!({"path": "secure/"}), "gone"))
        .await
        .unwrap();
    assert!(response.is_success());
    let result = response.result.unwrap();
    assert_eq!(result["isError"], true);
    assert_eq!(
        result["content"][0]["text"],
        "isolate_path failed [path=secure/]: No active session for session id 'gone'"
    );

    let response = server
        .handle(call(3, "drop_database", json!({})))
        .await
        .unwrap();
    let error = response.error.unwrap();
    assert_eq!(error.code, -32602);
    assert_eq!(error.data.unwrap()["tool"], "drop_database");
}

#[tokio::test]
async fn test_ping_and_unknown_method() {
    let (_loopback, server) = admin_server().await;

    let response = server
        .handle(JsonRpcRequest::new(Some(json!(1)), "ping", None))
        .await
        .unwrap();
    assert_eq!(response.result.unwrap(), json!({}));

    let response = server
        .handle(JsonRpcRequest::new(Some(json!(2)), "prompts/list", None))
        .await
        .unwrap();
    assert_eq!(response.error.unwrap().code, -32601);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_session_does_not_block_other_sessions() {
    let stalled = LoopbackServer::named("stalled");
    let healthy = LoopbackServer::named("healthy");
    stalled.stall_forever();

    let sessions = Arc::new(SessionRegistry::new());
    sessions.bind("slow", stalled.connect("admin", "password").unwrap());
    sessions.bind(DEFAULT_SESSION_ID, healthy.connect("admin", "password").unwrap());
    let server = build_server(&AdminConfig::default(), sessions).await.unwrap();

    let transport = MockTransport::new();
    transport.push_request(call_in_session(1, "list_topic_views", json!({}), "slow"));
    transport.push_request(call(2, "list_topic_views", json!({})));
    transport.push_request(JsonRpcRequest::new(None, "notifications/initialized", None));

    server.serve(transport.clone()).await.unwrap();

    let responses = transport.responses();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].id, Some(json!(2)));
    assert_eq!(responses[1].id, Some(json!(1)));

    let slow = responses[1].result.as_ref().unwrap();
    assert_eq!(slow["isError"], true);
    assert_eq!(slow["structuredContent"]["error"]["kind"], "timeout");

    let fast = responses[0].result.as_ref().unwrap();
    assert_eq!(fast["structuredContent"]["status"], "listed");
}

#[tokio::test]
async fn test_stdio_round_trip() {
    let (_loopback, server) = admin_server().await;

    let input = concat!(
        r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
        "\n",
        "this is not json\n",
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"deisolate_path","arguments":{"path":"secure/"}}}"#,
        "\n",
    );
    let (writer, mut output) = tokio::io::duplex(64 * 1024);
    let transport = StdioTransport::with_io(input.as_bytes(), writer);

    server.serve(transport).await.unwrap();

    let mut written = String::new();
    output.read_to_string(&mut written).await.unwrap();
    let lines: Vec<Value> = written
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(lines.len(), 2);
    let call = lines.iter().find(|line| line["id"] == 2).unwrap();
    assert_eq!(call["result"]["structuredContent"]["status"], "deisolated");
}
