use std::collections::BTreeMap;
use std::sync::Arc;

use modular_mcp_core::{McpServerConfig, TransportConfig};
use modular_mcp_gateway::{ModularProxyHandler, CALL_TOOL_NAME, GET_TOOLS_NAME};
use pretty_assertions::assert_eq;
use rmcp::{
    model::{
        CallToolRequestParams, CallToolResult, ClientCapabilities, ClientInfo, ErrorCode,
        Implementation, JsonObject,
    },
    service::RunningService,
    transport::StreamableHttpClientTransport,
    RoleClient, ServiceError, ServiceExt,
};
use serde_json::{json, Value};
use tests::{serve_mcp, start_upstream, temp_store, test_session_manager, SilentBrowser, TestUpstream};

struct Proxy {
    client: RunningService<RoleClient, ClientInfo>,
    // Kept alive for the duration of the test
    _proxy: TestUpstream,
    _upstream: TestUpstream,
    _dir: tempfile::TempDir,
}

async fn start_proxy() -> Proxy {
    tests::init_test_tracing();
    let upstream = start_upstream("tools").await;
    let (dir, store) = temp_store();
    let manager = test_session_manager(store, Arc::new(SilentBrowser::new()));
    manager
        .connect(
            "tools",
            &McpServerConfig {
                description: "Echo tools".to_string(),
                transport: TransportConfig::Http {
                    url: upstream.url.clone(),
                    headers: BTreeMap::new(),
                },
            },
        )
        .await
        .expect("upstream should connect");

    let proxy = serve_mcp(ModularProxyHandler::new(manager)).await;
    let client = ClientInfo {
        protocol_version: Default::default(),
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: "test-client".to_string(),
            version: "1.0.0".to_string(),
            ..Default::default()
        },
        ..Default::default()
    }
    .serve(StreamableHttpClientTransport::from_uri(proxy.url.as_str()))
    .await
    .expect("client should connect");

    Proxy {
        client,
        _proxy: proxy,
        _upstream: upstream,
        _dir: dir,
    }
}

async fn call(proxy: &Proxy, name: &'static str, arguments: Value) -> CallToolResult {
    let arguments: JsonObject = serde_json::from_value(arguments).unwrap();
    proxy
        .client
        .call_tool(CallToolRequestParams {
            meta: None,
            name: name.into(),
            arguments: Some(arguments),
            task: None,
        })
        .await
        .expect("proxy tools never fail at the protocol level")
}

fn text(result: &CallToolResult) -> String {
    result.content[0].as_text().expect("text content").text.clone()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_lists_exactly_two_tools() {
    let proxy = start_proxy().await;

    let tools = proxy.client.list_all_tools().await.unwrap();
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_ref()).collect();
    assert_eq!(names, vec![GET_TOOLS_NAME, CALL_TOOL_NAME]);

    for tool in &tools {
        let group_enum = tool.input_schema["properties"]["group"]["enum"].clone();
        assert_eq!(group_enum, json!(["tools"]));
    }
    let description = tools[0].description.as_deref().unwrap_or_default();
    assert!(description.contains("- tools: Echo tools"), "{description}");

    proxy.client.cancel().await.ok();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_get_tools_strips_schema_key() {
    let proxy = start_proxy().await;

    let result = call(&proxy, GET_TOOLS_NAME, json!({ "group": "tools" })).await;
    assert_ne!(result.is_error, Some(true));

    let descriptors: Vec<Value> = serde_json::from_str(&text(&result)).unwrap();
    let echo = descriptors
        .iter()
        .find(|d| d["name"] == "echo")
        .expect("echo tool listed");
    assert!(echo["inputSchema"].get("$schema").is_none());
    assert_eq!(echo["inputSchema"]["required"], json!(["text"]));
    assert_eq!(descriptors.len(), 2);

    proxy.client.cancel().await.ok();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_call_tool_passes_upstream_result_through() {
    let proxy = start_proxy().await;

    let result = call(
        &proxy,
        CALL_TOOL_NAME,
        json!({ "group": "tools", "name": "echo", "args": { "text": "hi" } }),
    )
    .await;
    assert_eq!(text(&result), "tools: hi");
    assert_ne!(result.is_error, Some(true));

    // Upstream tool errors keep their flag and content
    let result = call(&proxy, CALL_TOOL_NAME, json!({ "group": "tools", "name": "fail" })).await;
    assert_eq!(result.is_error, Some(true));

    proxy.client.cancel().await.ok();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_group_returns_error_payload() {
    let proxy = start_proxy().await;

    let result = call(
        &proxy,
        CALL_TOOL_NAME,
        json!({ "group": "missing", "name": "echo", "args": {} }),
    )
    .await;
    assert_eq!(result.is_error, Some(true));
    let payload: Value = serde_json::from_str(&text(&result)).unwrap();
    assert_eq!(
        payload,
        json!({ "success": false, "error": "Not connected to group: missing" })
    );

    let result = call(&proxy, GET_TOOLS_NAME, json!({})).await;
    assert_eq!(result.is_error, Some(true));

    proxy.client.cancel().await.ok();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_proxy_tool_is_invalid_params() {
    let proxy = start_proxy().await;

    let err = proxy
        .client
        .call_tool(CallToolRequestParams {
            meta: None,
            name: "echo".into(),
            arguments: None,
            task: None,
        })
        .await
        .unwrap_err();
    match err {
        ServiceError::McpError(data) => assert_eq!(data.code, ErrorCode::INVALID_PARAMS),
        other => panic!("unexpected error: {other}"),
    }

    proxy.client.cancel().await.ok();
}
