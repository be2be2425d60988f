//! Interactive authorization driven by a 401 from the upstream

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use modular_mcp_core::{
    CredentialKind, McpServerConfig, PersistedCredential, ServerConfig, TokenPair,
    TransportConfig, UpstreamIdentity,
};
use modular_mcp_gateway::{ConnectOutcome, GatewayError, SessionManager};
use pretty_assertions::assert_eq;
use tests::{
    count_requests, start_authorization_server, start_protected_sse_upstream,
    start_protected_upstream, temp_store, test_factory, test_factory_with_callback_port,
    test_session_manager, unused_port, RedirectingBrowser, SilentBrowser, TimedBrowser,
};

fn remote(url: &str) -> McpServerConfig {
    McpServerConfig {
        description: "Protected server".to_string(),
        transport: TransportConfig::Http {
            url: url.to_string(),
            headers: BTreeMap::new(),
        },
    }
}

fn sse(url: &str) -> McpServerConfig {
    McpServerConfig {
        description: "Protected SSE server".to_string(),
        transport: TransportConfig::Sse {
            url: url.to_string(),
            headers: BTreeMap::new(),
        },
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unauthorized_runs_one_flow_then_reconnects() {
    tests::init_test_tracing();
    let auth_server = start_authorization_server("good-token").await;
    let upstream = start_protected_upstream("secure", "good-token", &auth_server.uri()).await;
    let (_dir, store) = temp_store();
    let browser = Arc::new(RedirectingBrowser::new());
    let manager = test_session_manager(store.clone(), browser.clone());

    manager.connect("secure", &remote(&upstream.url)).await.unwrap();

    assert_eq!(browser.opened().len(), 1);
    assert_eq!(upstream.rejected_count(), 1);
    assert_eq!(count_requests(&auth_server, "/register").await, 1);
    assert_eq!(count_requests(&auth_server, "/token").await, 1);
    assert_eq!(manager.list_tools("secure").unwrap().len(), 2);

    let identity = UpstreamIdentity::parse(&upstream.url).unwrap();
    match store.get(&identity, CredentialKind::Tokens).await {
        Some(PersistedCredential::Tokens(tokens)) => assert_eq!(tokens.access_token, "good-token"),
        other => panic!("tokens not stored: {:?}", other),
    }
    assert!(matches!(
        store.get(&identity, CredentialKind::CallbackPort).await,
        Some(PersistedCredential::CallbackPort(_))
    ));

    // The authorization URL carries PKCE, state and the validated resource
    let opened = url::Url::parse(&browser.opened()[0]).unwrap();
    let query: BTreeMap<String, String> = opened.query_pairs().into_owned().collect();
    assert_eq!(query["client_id"], "test-client");
    assert_eq!(query["code_challenge_method"], "S256");
    assert_eq!(query["scope"], "mcp:tools");
    assert_eq!(query["resource"], upstream.url);
    assert!(query["redirect_uri"].starts_with("http://localhost:"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sse_unauthorized_runs_one_flow_then_reconnects() {
    let auth_server = start_authorization_server("good-token").await;
    let upstream = start_protected_sse_upstream("legacy", "good-token", &auth_server.uri()).await;
    let (_dir, store) = temp_store();
    let browser = Arc::new(RedirectingBrowser::new());
    let manager = test_session_manager(store, browser.clone());

    manager.connect("legacy", &sse(&upstream.url)).await.unwrap();

    assert_eq!(browser.opened().len(), 1);
    assert_eq!(upstream.rejected_count(), 1);
    assert_eq!(count_requests(&auth_server, "/token").await, 1);
    assert_eq!(manager.list_tools("legacy").unwrap().len(), 2);

    let result = manager.call_tool("legacy", "fail", None).await.unwrap();
    assert_eq!(result.is_error, Some(true));
    assert_eq!(upstream.rejected_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_second_unauthorized_is_terminal() {
    let auth_server = start_authorization_server("rejected-token").await;
    let upstream = start_protected_sse_upstream("secure", "good-token", &auth_server.uri()).await;
    let (_dir, store) = temp_store();
    let browser = Arc::new(RedirectingBrowser::new());
    let manager = test_session_manager(store, browser.clone());

    let err = manager.connect("secure", &sse(&upstream.url)).await.unwrap_err();

    assert!(err.is_unauthorized(), "{err}");
    assert_eq!(browser.opened().len(), 1);
    assert_eq!(upstream.rejected_count(), 2);
    assert_eq!(count_requests(&auth_server, "/token").await, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stored_token_skips_browser() {
    let auth_server = start_authorization_server("unused").await;
    let upstream = start_protected_upstream("secure", "stored-token", &auth_server.uri()).await;
    let (_dir, store) = temp_store();
    let identity = UpstreamIdentity::parse(&upstream.url).unwrap();
    store
        .put(
            &identity,
            &PersistedCredential::Tokens(TokenPair {
                access_token: "stored-token".to_string(),
                token_type: "Bearer".to_string(),
                refresh_token: None,
                expires_at: None,
                scope: None,
            }),
        )
        .await
        .unwrap();

    let browser = Arc::new(SilentBrowser::new());
    let manager = test_session_manager(store, browser.clone());
    manager.connect("secure", &remote(&upstream.url)).await.unwrap();

    assert!(browser.opened().is_empty());
    assert_eq!(upstream.rejected_count(), 0);
    assert_eq!(count_requests(&auth_server, "/token").await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_timeout_is_terminal_and_releases_lock() {
    let auth_server = start_authorization_server("good-token").await;
    let upstream = start_protected_upstream("secure", "good-token", &auth_server.uri()).await;
    let (_dir, store) = temp_store();
    let browser = Arc::new(SilentBrowser::new());
    let manager = SessionManager::new(test_factory(
        store,
        browser.clone(),
        Duration::from_millis(100),
    ));

    for attempt in 1..=2 {
        let result = tokio::time::timeout(
            Duration::from_secs(10),
            manager.connect("secure", &remote(&upstream.url)),
        )
        .await
        .expect("authorization attempt hung");
        assert!(
            matches!(result, Err(GatewayError::AuthorizationTimeout(_))),
            "attempt {attempt}"
        );
        assert_eq!(browser.opened().len(), attempt);
    }

    // The second attempt reused the first registration on the same port
    assert_eq!(count_requests(&auth_server, "/register").await, 1);
    assert_eq!(count_requests(&auth_server, "/token").await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_flows_take_turns_on_one_callback_port() {
    tests::init_test_tracing();
    let auth_server = start_authorization_server("good-token").await;
    let first = start_protected_upstream("first", "good-token", &auth_server.uri()).await;
    let second = start_protected_sse_upstream("second", "good-token", &auth_server.uri()).await;
    let (_dir, store) = temp_store();
    let browser = Arc::new(TimedBrowser::new(Duration::from_millis(200)));
    let callback_port = unused_port();
    let manager = SessionManager::new(test_factory_with_callback_port(
        store.clone(),
        browser.clone(),
        Duration::from_secs(5),
        callback_port,
    ));

    let config = ServerConfig {
        schema: None,
        mcp_servers: BTreeMap::from([
            ("first".to_string(), remote(&first.url)),
            ("second".to_string(), sse(&second.url)),
        ]),
    };
    let outcomes = manager.connect_all(&config).await;
    assert!(
        outcomes
            .iter()
            .all(|o| matches!(o, ConnectOutcome::Connected { tool_count: 2, .. })),
        "{outcomes:?}"
    );

    // One browser window at a time: the second opens after the first redirect
    let mut windows = browser.windows();
    assert_eq!(windows.len(), 2);
    windows.sort_by_key(|w| w.opened);
    assert!(windows[1].opened >= windows[0].completed);

    // Each first-time flow bound the default callback port in turn
    for url in [&first.url, &second.url] {
        let identity = UpstreamIdentity::parse(url).unwrap();
        assert_eq!(
            store.get(&identity, CredentialKind::CallbackPort).await,
            Some(PersistedCredential::CallbackPort(callback_port))
        );
    }
    assert_eq!(count_requests(&auth_server, "/register").await, 2);
}
