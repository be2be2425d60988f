//! Startup sweep with partial failure, and tool routing

use std::collections::BTreeMap;
use std::sync::Arc;

use modular_mcp_core::{
    CredentialKind, McpServerConfig, ServerConfig, TransportConfig, UpstreamIdentity,
};
use modular_mcp_gateway::{ConnectOutcome, GatewayError};
use pretty_assertions::assert_eq;
use rmcp::model::JsonObject;
use serde_json::json;
use tests::{start_sse_upstream, start_upstream, temp_store, test_session_manager, SilentBrowser};

fn http(url: &str, description: &str) -> McpServerConfig {
    McpServerConfig {
        description: description.to_string(),
        transport: TransportConfig::Http {
            url: url.to_string(),
            headers: BTreeMap::from([("X-Test".to_string(), "1".to_string())]),
        },
    }
}

fn sse(url: &str, description: &str) -> McpServerConfig {
    McpServerConfig {
        description: description.to_string(),
        transport: TransportConfig::Sse {
            url: url.to_string(),
            headers: BTreeMap::from([("X-Test".to_string(), "1".to_string())]),
        },
    }
}

fn missing_command() -> McpServerConfig {
    McpServerConfig {
        description: "Server whose binary is not installed".to_string(),
        transport: TransportConfig::Stdio {
            command: "modular-mcp-test-no-such-binary".to_string(),
            args: vec!["--stdio".to_string()],
            env: BTreeMap::new(),
        },
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_partial_failure_sweep() {
    tests::init_test_tracing();
    let upstream_a = start_upstream("a").await;
    let upstream_c = start_upstream("c").await;
    let (_dir, store) = temp_store();
    let manager = test_session_manager(store, Arc::new(SilentBrowser::new()));

    let config = ServerConfig {
        schema: None,
        mcp_servers: BTreeMap::from([
            ("a".to_string(), http(&upstream_a.url, "Server A")),
            ("b".to_string(), missing_command()),
            ("c".to_string(), http(&upstream_c.url, "Server C")),
        ]),
    };

    let outcomes = manager.connect_all(&config).await;
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.contains(&ConnectOutcome::Connected {
        group: "a".to_string(),
        tool_count: 2,
    }));

    let groups: Vec<String> = manager.list_groups().into_iter().map(|g| g.name).collect();
    assert_eq!(groups, vec!["a".to_string(), "c".to_string()]);

    let failed = manager.list_failed_groups();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].name, "b");
    assert!(!failed[0].cause.is_empty());

    match manager.list_tools("b").unwrap_err() {
        GatewayError::GroupFailed { group, cause } => {
            assert_eq!(group, "b");
            assert_eq!(cause, failed[0].cause);
        }
        other => panic!("unexpected error: {other}"),
    }

    manager.disconnect_all().await;
    assert!(manager.list_groups().is_empty());
    assert!(manager.list_failed_groups().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_call_tool_passes_result_through() {
    let upstream = start_upstream("a").await;
    let (_dir, store) = temp_store();
    let manager = test_session_manager(store, Arc::new(SilentBrowser::new()));

    manager.connect("a", &http(&upstream.url, "Server A")).await.unwrap();

    let tools = manager.list_tools("a").unwrap();
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_ref()).collect();
    assert_eq!(names, vec!["echo", "fail"]);

    let mut args = JsonObject::new();
    args.insert("text".to_string(), json!("hello"));
    let result = manager.call_tool("a", "echo", Some(args)).await.unwrap();
    assert_eq!(result.is_error, Some(false));
    assert_eq!(result.content[0].as_text().unwrap().text, "a: hello");

    // Tool-level errors are not connection errors
    let result = manager.call_tool("a", "fail", None).await.unwrap();
    assert_eq!(result.is_error, Some(true));

    manager.disconnect("a").await.unwrap();
    assert!(matches!(
        manager.call_tool("a", "echo", None).await.unwrap_err(),
        GatewayError::GroupNotConnected(_)
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connect_is_noop_when_present() {
    let upstream = start_upstream("a").await;
    let (_dir, store) = temp_store();
    let manager = test_session_manager(store, Arc::new(SilentBrowser::new()));

    manager.record_failure("a", &http(&upstream.url, "Server A"), "earlier failure");
    manager.connect("a", &http(&upstream.url, "Server A")).await.unwrap();

    assert!(manager.list_groups().is_empty());
    assert_eq!(manager.list_failed_groups()[0].cause, "earlier failure");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unreachable_http_upstream_fails_without_auth() {
    // Nothing listens here, and the port digits contain "401"
    let url = "http://127.0.0.1:40123/mcp";
    let (_dir, store) = temp_store();
    let browser = Arc::new(SilentBrowser::new());
    let manager = test_session_manager(store.clone(), browser.clone());

    let err = manager.connect("down", &http(url, "Down")).await.unwrap_err();

    assert!(matches!(err, GatewayError::TransportUnavailable(_)), "{err}");
    assert!(browser.opened().is_empty());
    let identity = UpstreamIdentity::parse(url).unwrap();
    assert!(store.get(&identity, CredentialKind::CallbackPort).await.is_none());
    assert!(store.get(&identity, CredentialKind::Client).await.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unreachable_sse_upstream_fails_without_auth() {
    let (_dir, store) = temp_store();
    let browser = Arc::new(SilentBrowser::new());
    let manager = test_session_manager(store, browser.clone());

    let err = manager
        .connect("down", &sse("http://127.0.0.1:40123/sse", "Down"))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::TransportUnavailable(_)), "{err}");
    assert!(browser.opened().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sse_upstream_lists_and_calls_tools() {
    let upstream = start_sse_upstream("legacy").await;
    let (_dir, store) = temp_store();
    let manager = test_session_manager(store, Arc::new(SilentBrowser::new()));

    manager.connect("legacy", &sse(&upstream.url, "Legacy SSE")).await.unwrap();

    let names: Vec<String> = manager
        .list_tools("legacy")
        .unwrap()
        .iter()
        .map(|t| t.name.to_string())
        .collect();
    assert_eq!(names, vec!["echo".to_string(), "fail".to_string()]);

    let mut args = JsonObject::new();
    args.insert("text".to_string(), json!("over sse"));
    let result = manager.call_tool("legacy", "echo", Some(args)).await.unwrap();
    assert_eq!(result.content[0].as_text().unwrap().text, "legacy: over sse");

    manager.disconnect("legacy").await.unwrap();
}
