//! Contract tests across the whole tool catalogue.
//!
//! Every tool is exercised against the loopback server with a known-good
//! argument set and checked for the behaviour all tools share:
//!
//! - success envelopes echo key arguments and carry `status`
//! - no bound session fails before any server call
//! - a stalled operation times out after the fixed bound
//! - server failures pass their message through verbatim
//! - invalid arguments never reach the server, and still report the key
//!   arguments that were supplied
//! - calls on one session are not serialized

use futures::future::join_all;
use pubsub_admin_mcp::mcp::{Tool, ToolContext, ToolRegistry, ToolResult};
use pubsub_admin_mcp::prelude::*;
use pubsub_admin_mcp::tools::register_all;
use serde_json::{json, Value};
use std::sync::Arc;

// =============================================================================
// Fixtures
// =============================================================================

/// Arguments that succeed against a fresh loopback server for an
/// administrator session.
fn sample_arguments(tool: &str) -> Value {
    match tool {
        "get_security" | "get_system_authentication" => json!({}),
        "set_roles_for_anonymous_sessions" => json!({"roles": ["CLIENT"]}),
        "set_roles_for_named_sessions" => json!({"roles": ["AUTHENTICATED"]}),
        "set_global_permissions" => json!({"role": "TRADER", "permissions": ["VIEW_SERVER"]}),
        "set_default_path_permissions" => json!({"role": "TRADER", "permissions": ["READ_TOPIC"]}),
        "set_path_permissions" => {
            json!({"role": "TRADER", "path": "prices/", "permissions": ["READ_TOPIC"]})
        }
        "remove_path_permissions" => json!({"role": "TRADER", "path": "prices/"}),
        "set_role_includes" => json!({"role": "TRADER", "includedRoles": ["CLIENT"]}),
        "set_role_locked_by_principal" => json!({"role": "TRADER", "lockingPrincipal": "admin"}),
        "isolate_path" | "deisolate_path" => json!({"path": "secure/"}),
        "add_principal" => json!({"principalName": "alice", "password": "x", "roles": ["ADMIN"]}),
        "remove_principal" => json!({"principalName": "alice"}),
        "assign_roles" => json!({"principalName": "control", "roles": ["OPERATOR"]}),
        "set_password" => json!({"principalName": "control", "password": "changed"}),
        "verify_password" => json!({"principalName": "control", "password": "password"}),
        "allow_anonymous_connections" => json!({"roles": ["CLIENT"]}),
        "deny_anonymous_connections" | "abstain_anonymous_connections" => json!({}),
        "trust_client_proposed_property_in" => {
            json!({"propertyName": "Department", "allowedValues": ["sales", "support"]})
        }
        "trust_client_proposed_property_matches" => {
            json!({"propertyName": "Department", "regex": "[a-z]+"})
        }
        "ignore_client_proposed_property" => json!({"propertyName": "Department"}),
        "put_session_metric_collector" => {
            json!({"name": "by-department", "sessionFilter": "Department is 'sales'"})
        }
        "remove_session_metric_collector" => json!({"name": "by-department"}),
        "put_topic_metric_collector" => json!({"name": "prices", "topicSelector": "?prices//"}),
        "remove_topic_metric_collector" => json!({"name": "prices"}),
        "set_metric_alert" => json!({
            "name": "high-load",
            "specification": "select cpu_load into topic alerts/cpu where value > 0.9"
        }),
        "remove_metric_alert" => json!({"name": "high-load"}),
        "list_session_metric_collectors"
        | "list_topic_metric_collectors"
        | "list_metric_alerts"
        | "fetch_metrics"
        | "list_topic_views"
        | "list_remote_servers" => json!({}),
        "create_topic_view" => {
            json!({"name": "prices", "specification": "map ?prices// to views/<path(1)>"})
        }
        "get_topic_view" | "remove_topic_view" => json!({"name": "prices"}),
        "create_remote_server" => {
            json!({"name": "edge", "type": "SECONDARY_INITIATOR", "url": "ws://primary:8080"})
        }
        "check_remote_server" | "remove_remote_server" => json!({"name": "edge"}),
        other => panic!("no sample arguments for {other}"),
    }
}

struct Harness {
    server: LoopbackServer,
    registry: ToolRegistry,
}

impl Harness {
    /// Catalogue bound to an administrator session under the default id.
    async fn admin() -> Self {
        let server = LoopbackServer::new();
        let sessions = Arc::new(SessionRegistry::new());
        sessions.bind(DEFAULT_SESSION_ID, server.connect("admin", "password").unwrap());
        Self::with_sessions(server, sessions).await
    }

    /// Catalogue with no session bound at all.
    async fn unbound() -> Self {
        Self::with_sessions(LoopbackServer::new(), Arc::new(SessionRegistry::new())).await
    }

    async fn with_sessions(server: LoopbackServer, sessions: Arc<SessionRegistry>) -> Self {
        let registry = ToolRegistry::new();
        register_all(&registry, sessions).await.unwrap();
        Self { server, registry }
    }

    async fn names(&self) -> Vec<String> {
        self.registry.names().await
    }

    async fn call(&self, tool: &str, arguments: Value) -> ToolResult {
        let tool = self.registry.get(tool).await.unwrap();
        tool.execute(arguments, &ToolContext::default()).await
    }
}

fn structured(result: &ToolResult) -> &Value {
    result.structured_content.as_ref().expect("structured content")
}

// =============================================================================
// Shared properties
// =============================================================================

#[tokio::test]
async fn test_every_tool_succeeds_with_sample_arguments() {
    let harness = Harness::admin().await;

    for name in harness.names().await {
        let result = Harness::admin().await.call(&name, sample_arguments(&name)).await;
        assert!(result.is_success(), "{name}: {:?}", result.text());

        let json = structured(&result);
        if name.starts_with("get_s") {
            continue;
        }
        assert!(json["status"].is_string(), "{name} has no status: {json}");
    }
}

#[tokio::test]
async fn test_success_envelope_echoes_key_arguments() {
    let harness = Harness::admin().await;

    let result = harness.call("isolate_path", json!({"path": "secure/"})).await;
    assert_eq!(structured(&result), &json!({"path": "secure/", "status": "isolated"}));

    let result = harness
        .call(
            "add_principal",
            json!({"principalName": "alice", "password": "x", "roles": ["ADMIN"]}),
        )
        .await;
    let json = structured(&result);
    assert_eq!(json["principalName"], "alice");
    assert_eq!(json["roles"], json!(["ADMIN"]));
    assert_eq!(json["status"], "added");
    assert!(json.get("password").is_none());
    assert!(!result.text().unwrap().contains("\"x\""));
}

#[tokio::test]
async fn test_no_session_fails_without_server_calls() {
    let harness = Harness::unbound().await;

    for name in harness.names().await {
        let result = harness.call(&name, sample_arguments(&name)).await;
        assert!(result.is_error(), "{name}");
        let text = result.text().unwrap();
        assert!(text.starts_with(&format!("{name} failed")), "{text}");
        assert!(text.contains("No active session"), "{text}");
        assert_eq!(structured(&result)["error"]["kind"], "no_session");
    }
    assert_eq!(harness.server.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_operations_time_out() {
    let harness = Harness::admin().await;
    harness.server.stall_forever();

    for name in harness.names().await {
        let started = tokio::time::Instant::now();
        let result = harness.call(&name, sample_arguments(&name)).await;

        assert!(result.is_error(), "{name}");
        let text = result.text().unwrap();
        assert!(text.starts_with(&format!("{name} failed")), "{text}");
        assert!(text.contains("timed out after 10 seconds"), "{text}");
        assert_eq!(structured(&result)["error"]["kind"], "timeout");
        assert!(started.elapsed() >= OPERATION_TIMEOUT);
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_success_still_times_out() {
    let harness = Harness::admin().await;
    harness.server.stall(std::time::Duration::from_secs(30));

    let result = harness.call("isolate_path", json!({"path": "secure/"})).await;
    assert_eq!(
        result.text(),
        Some("isolate_path failed [path=secure/]: timed out after 10 seconds")
    );
}

#[tokio::test(start_paused = true)]
async fn test_calls_on_one_session_run_concurrently() {
    let harness = Harness::admin().await;
    harness.server.stall(std::time::Duration::from_secs(6));

    let started = tokio::time::Instant::now();
    let results = join_all([
        harness.call("isolate_path", json!({"path": "a/"})),
        harness.call("isolate_path", json!({"path": "b/"})),
        harness.call("list_topic_views", json!({})),
        harness.call("get_security", json!({})),
    ])
    .await;

    for result in &results {
        assert!(result.is_success(), "{:?}", result.text());
    }
    assert!(started.elapsed() < OPERATION_TIMEOUT);
    assert_eq!(harness.server.calls(), 4);
}

#[tokio::test]
async fn test_remote_failure_message_passes_through() {
    let harness = Harness::admin().await;

    for name in harness.names().await {
        harness
            .server
            .fail_next(RemoteError::permission_denied("Denied by test"));
        let result = harness.call(&name, sample_arguments(&name)).await;

        assert!(result.is_error(), "{name}");
        let text = result.text().unwrap();
        assert!(text.starts_with(&format!("{name} failed")), "{text}");
        assert!(text.ends_with(": Denied by test"), "{text}");

        let error = &structured(&result)["error"];
        assert_eq!(error["kind"], "remote");
        assert_eq!(error["reason"], "permission_denied");
        assert_eq!(error["tool"], name.as_str());
    }
}

#[tokio::test]
async fn test_missing_required_arguments_never_reach_server() {
    let harness = Harness::admin().await;

    for definition in harness.registry.list().await {
        let required = definition.input_schema["required"]
            .as_array()
            .map(|fields| !fields.is_empty())
            .unwrap_or(false);
        if !required {
            continue;
        }

        let result = harness.call(&definition.name, json!({})).await;
        assert!(result.is_error(), "{}", definition.name);
        assert_eq!(structured(&result)["error"]["kind"], "validation");
        assert!(result.text().unwrap().contains("invalid arguments"));
    }
    assert_eq!(harness.server.calls(), 0);
}

#[tokio::test]
async fn test_mistyped_argument_keeps_supplied_key_arguments() {
    let harness = Harness::admin().await;

    let result = harness
        .call(
            "add_principal",
            json!({"principalName": "alice", "password": "x", "roles": "ADMIN"}),
        )
        .await;
    assert_eq!(
        result.text(),
        Some(
            "add_principal failed [principalName=alice, roles=ADMIN]: invalid arguments: \
             invalid type: string \"ADMIN\", expected a sequence"
        )
    );
    let error = &structured(&result)["error"];
    assert_eq!(error["kind"], "validation");
    assert_eq!(error["arguments"], json!({"principalName": "alice", "roles": "ADMIN"}));
    assert_eq!(harness.server.calls(), 0);
}

#[tokio::test]
async fn test_parse_failures_report_the_same_key_fields() {
    let unbound = Harness::unbound().await;
    let harness = Harness::admin().await;

    for name in harness.names().await {
        let sample = sample_arguments(&name);
        let parsed = unbound.call(&name, sample.clone()).await;
        let expected = structured(&parsed)["error"]["arguments"]
            .as_object()
            .cloned()
            .unwrap_or_default();

        for field in sample.as_object().unwrap().keys() {
            let mut arguments = sample.clone();
            arguments[field.as_str()] = json!([[[1]]]);

            let result = harness.call(&name, arguments).await;
            let error = &structured(&result)["error"];
            assert_eq!(error["kind"], "validation", "{name}.{field}");

            let reported = error["arguments"].as_object().unwrap();
            for key in reported.keys() {
                assert!(expected.contains_key(key), "{name} reported {key}");
            }
            for key in expected.keys().filter(|key| sample.get(key.as_str()).is_some()) {
                assert!(reported.contains_key(key), "{name}.{field} lost {key}");
            }
        }
    }
    assert_eq!(harness.server.calls(), 0);
}

#[tokio::test]
async fn test_non_object_arguments_rejected() {
    let harness = Harness::admin().await;
    let result = harness.call("get_security", json!([1, 2, 3])).await;
    assert_eq!(
        result.text(),
        Some("get_security failed: invalid arguments: arguments must be an object, got array")
    );
    assert_eq!(harness.server.calls(), 0);
}

#[tokio::test]
async fn test_removing_absent_entities_succeeds() {
    let harness = Harness::admin().await;

    for name in harness.names().await {
        if !name.starts_with("remove_") {
            continue;
        }
        let result = harness.call(&name, sample_arguments(&name)).await;
        assert!(result.is_success(), "{name}: {:?}", result.text());
        assert_eq!(structured(&result)["status"], "removed");
    }

    let security = harness.call("get_security", json!({})).await;
    assert!(!security.text().unwrap().contains("TRADER"));
}

// =============================================================================
// Cross-tool scenarios
// =============================================================================

#[tokio::test]
async fn test_principal_lifecycle() {
    let harness = Harness::admin().await;

    let added = harness.call("add_principal", sample_arguments("add_principal")).await;
    assert!(added.is_success());

    let duplicate = harness.call("add_principal", sample_arguments("add_principal")).await;
    assert!(duplicate.is_error());
    assert_eq!(structured(&duplicate)["error"]["reason"], "already_exists");
    assert!(duplicate.text().unwrap().contains("principalName=alice"));

    let wrong = harness
        .call("verify_password", json!({"principalName": "alice", "password": "y"}))
        .await;
    assert!(wrong.is_error());
    assert!(!wrong.text().unwrap().contains("password=y"));

    let listed = harness.call("get_system_authentication", json!({})).await;
    assert!(listed.text().unwrap().contains("alice"));
}

#[tokio::test]
async fn test_security_changes_visible_in_get_security() {
    let harness = Harness::admin().await;
    harness
        .call("set_path_permissions", sample_arguments("set_path_permissions"))
        .await;
    harness.call("isolate_path", json!({"path": "secure/"})).await;

    let result = harness.call("get_security", json!({})).await;
    let text = result.text().unwrap();
    assert!(text.contains("TRADER"));
    assert!(text.contains("prices/: [READ_TOPIC]"));
    assert!(text.contains("secure/"));
}

#[tokio::test]
async fn test_operator_cannot_modify_security() {
    let server = LoopbackServer::new();
    let sessions = Arc::new(SessionRegistry::new());
    sessions.bind(DEFAULT_SESSION_ID, server.connect("control", "password").unwrap());
    let harness = Harness::with_sessions(server, sessions).await;

    let result = harness.call("isolate_path", json!({"path": "secure/"})).await;
    assert!(result.is_error());
    assert_eq!(structured(&result)["error"]["reason"], "permission_denied");
    assert!(result.text().unwrap().contains("MODIFY_SECURITY"));

    let listed = harness.call("list_remote_servers", json!({})).await;
    assert!(listed.is_success());
}

#[tokio::test]
async fn test_session_id_selects_session() {
    let server = LoopbackServer::new();
    let sessions = Arc::new(SessionRegistry::new());
    sessions.bind("ops", server.connect("admin", "password").unwrap());
    let harness = Harness::with_sessions(server, sessions).await;
    let tool = harness.registry.get("list_topic_views").await.unwrap();

    let default = tool.execute(json!({}), &ToolContext::default()).await;
    assert!(default.text().unwrap().contains("'default'"));

    let context = ToolContext::builder().session_id("ops").build();
    let named = tool.execute(json!({}), &context).await;
    assert!(named.is_success());
    assert_eq!(harness.server.calls(), 1);
}

#[tokio::test]
async fn test_remote_server_round_trip() {
    let harness = Harness::admin().await;
    harness
        .call("create_remote_server", sample_arguments("create_remote_server"))
        .await;

    let listed = harness.call("list_remote_servers", json!({})).await;
    let json = structured(&listed);
    assert_eq!(json["count"], 1);
    assert_eq!(json["servers"][0]["url"], "ws://primary:8080");

    let checked = harness.call("check_remote_server", json!({"name": "edge"})).await;
    assert_eq!(structured(&checked)["state"], "CONNECTED");

    harness.call("remove_remote_server", json!({"name": "edge"})).await;
    let missing = harness.call("check_remote_server", json!({"name": "edge"})).await;
    assert_eq!(structured(&missing)["state"], "MISSING");
}

#[tokio::test]
async fn test_fetch_metrics_filters_by_prefix() {
    let harness = Harness::admin().await;
    harness
        .call("create_topic_view", sample_arguments("create_topic_view"))
        .await;

    let result = harness
        .call("fetch_metrics", json!({"filter": ["topic_views"]}))
        .await;
    let json = structured(&result);
    assert_eq!(json["status"], "fetched");
    assert_eq!(json["filter"], json!(["topic_views"]));
    assert_eq!(json["count"], 1);
    assert_eq!(json["metrics"][0]["value"], 1.0);
}
