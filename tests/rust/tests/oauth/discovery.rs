//! Discovery order and fallbacks

use modular_mcp_gateway::oauth::OAuthDiscovery;
use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_resource_metadata_names_authorization_server() {
    let resource_server = MockServer::start().await;
    let auth_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/.well-known/oauth-protected-resource/mcp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resource": format!("{}/mcp", resource_server.uri()),
            "authorization_servers": [auth_server.uri()],
            "scopes_supported": ["files:read"],
        })))
        .mount(&resource_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/.well-known/oauth-authorization-server"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": auth_server.uri(),
            "authorization_endpoint": format!("{}/oauth/authorize", auth_server.uri()),
            "token_endpoint": format!("{}/oauth/token", auth_server.uri()),
            "registration_endpoint": format!("{}/oauth/register", auth_server.uri()),
        })))
        .expect(1)
        .mount(&auth_server)
        .await;

    let server_url = Url::parse(&format!("{}/mcp", resource_server.uri())).unwrap();
    let discovered = OAuthDiscovery::new(reqwest::Client::new())
        .discover(&server_url)
        .await
        .unwrap();

    assert_eq!(
        discovered.authorization_server.as_str().trim_end_matches('/'),
        auth_server.uri()
    );
    assert_eq!(
        discovered.metadata.token_endpoint,
        format!("{}/oauth/token", auth_server.uri())
    );
    let resource = discovered.resource_metadata.unwrap();
    assert_eq!(resource.scopes_supported, vec!["files:read".to_string()]);
    assert_eq!(resource.resource, Some(server_url.to_string()));
}

#[tokio::test]
async fn test_openid_configuration_used_when_oauth_metadata_missing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": server.uri(),
            "authorization_endpoint": format!("{}/oidc/auth", server.uri()),
            "token_endpoint": format!("{}/oidc/token", server.uri()),
            "scopes_supported": ["openid", "profile"],
        })))
        .mount(&server)
        .await;

    let discovered = OAuthDiscovery::new(reqwest::Client::new())
        .discover(&Url::parse(&server.uri()).unwrap())
        .await
        .unwrap();

    assert_eq!(
        discovered.metadata.authorization_endpoint,
        format!("{}/oidc/auth", server.uri())
    );
    assert!(discovered.metadata.registration_endpoint.is_none());
    assert_eq!(discovered.metadata.requested_scope(), "openid profile");
    assert!(discovered.resource_metadata.is_none());
}

#[tokio::test]
async fn test_default_endpoints_without_metadata() {
    let server = MockServer::start().await;

    let server_url = Url::parse(&format!("{}/v1/mcp", server.uri())).unwrap();
    let discovered = OAuthDiscovery::new(reqwest::Client::new())
        .discover(&server_url)
        .await
        .unwrap();

    assert_eq!(
        discovered.metadata.authorization_endpoint,
        format!("{}/authorize", server.uri())
    );
    assert_eq!(discovered.metadata.token_endpoint, format!("{}/token", server.uri()));
    assert_eq!(
        discovered.metadata.registration_endpoint,
        Some(format!("{}/register", server.uri()))
    );
}
