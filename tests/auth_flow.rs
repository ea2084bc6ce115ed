//! Interactive OAuth flow against a real local listener
//!
//! The browser is replaced by a plain HTTP request to the callback URL and
//! Google's token endpoint by wiremock.

use std::net::TcpListener;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gmail_autoauth_mcp::auth::{AuthFlow, CredentialStore, FlowOptions, FlowState, OAuthKeys, Session};
use gmail_autoauth_mcp::config::oauth;
use gmail_autoauth_mcp::error::{AuthError, GmailMcpError};

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn session(token_server: &MockServer, store: CredentialStore, port: u16) -> Session {
    let keys = OAuthKeys {
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        auth_uri: "https://accounts.example.com/o/oauth2/auth".to_string(),
        token_uri: format!("{}/token", token_server.uri()),
    };
    Session::new(keys, store, oauth::callback_url(port))
}

fn options(port: u16) -> FlowOptions {
    FlowOptions::new(port)
        .open_browser(false)
        .timeout(Duration::from_secs(10))
}

/// Plays the browser: retries until the listener is up, returns status and body
async fn visit(port: u16, query: &str) -> (u16, String) {
    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap();
    let url = format!("http://127.0.0.1:{}{}?{}", port, oauth::CALLBACK_PATH, query);

    for _ in 0..50 {
        match client.get(&url).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                return (status, response.text().await.unwrap_or_default());
            }
            Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
        }
    }
    panic!("callback listener never came up on port {}", port);
}

#[tokio::test]
async fn test_successful_flow_persists_credentials() {
    let token_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=the-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-1",
            "refresh_token": "refresh-1",
            "expires_in": 3599,
            "token_type": "Bearer",
            "scope": oauth::SCOPES.join(" ")
        })))
        .expect(1)
        .mount(&token_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let credentials_path = dir.path().join("credentials.json");
    let port = free_port();
    let session = session(&token_server, CredentialStore::new(&credentials_path), port);

    let mut flow = AuthFlow::new(&session, options(port));
    let (result, (status, body)) = tokio::join!(flow.run(), visit(port, "code=the-code&scope=x"));

    tokio_test::assert_ok!(result);
    assert_eq!(status, 200);
    assert!(body.contains("Authentication successful!"));
    assert_eq!(flow.state(), &FlowState::Complete);

    let saved = CredentialStore::new(&credentials_path)
        .load()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(saved.access_token, "access-1");
    assert_eq!(saved.refresh_token.as_deref(), Some("refresh-1"));
    assert!(session.validate().await);

    // the listener is gone once the flow returns
    assert!(TcpListener::bind(("127.0.0.1", port)).is_ok());
}

#[tokio::test]
async fn test_denied_consent() {
    let token_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&token_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let port = free_port();
    let session = session(
        &token_server,
        CredentialStore::new(dir.path().join("credentials.json")),
        port,
    );

    let mut flow = AuthFlow::new(&session, options(port));
    let (result, (status, body)) = tokio::join!(flow.run(), visit(port, "error=access_denied"));

    assert_eq!(status, 400);
    assert!(body.contains("Authentication was denied"));
    assert!(matches!(
        result,
        Err(GmailMcpError::Auth(AuthError::Denied { .. }))
    ));
    assert!(matches!(flow.state(), FlowState::Failed(_)));
    assert!(!dir.path().join("credentials.json").exists());
}

#[tokio::test]
async fn test_rejected_code_fails_the_flow() {
    let token_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("code=stale-code"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Bad Request"
        })))
        .expect(1)
        .mount(&token_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let credentials_path = dir.path().join("credentials.json");
    let port = free_port();
    let session = session(&token_server, CredentialStore::new(&credentials_path), port);

    let mut flow = AuthFlow::new(&session, options(port));
    let (result, (status, body)) = tokio::join!(flow.run(), visit(port, "code=stale-code"));

    assert_eq!(status, 500);
    assert!(body.contains("Authentication failed"));
    assert!(body.contains("invalid_grant"));
    assert!(body.contains("used already"));
    assert!(matches!(
        result,
        Err(GmailMcpError::Auth(AuthError::TokenExchangeFailed { .. }))
    ));
    assert!(matches!(flow.state(), FlowState::Failed(_)));
    assert!(!credentials_path.exists());
    assert!(!session.validate().await);
    assert!(TcpListener::bind(("127.0.0.1", port)).is_ok());
}

#[tokio::test]
async fn test_callback_without_code() {
    let token_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let port = free_port();
    let session = session(
        &token_server,
        CredentialStore::new(dir.path().join("credentials.json")),
        port,
    );

    let mut flow = AuthFlow::new(&session, options(port));
    let (result, (status, _)) = tokio::join!(flow.run(), visit(port, "state=xyz"));

    assert_eq!(status, 400);
    assert!(matches!(
        result,
        Err(GmailMcpError::Auth(AuthError::NoAuthCode))
    ));
}

#[tokio::test]
async fn test_port_in_use() {
    let token_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let occupied = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = occupied.local_addr().unwrap().port();
    let session = session(
        &token_server,
        CredentialStore::new(dir.path().join("credentials.json")),
        port,
    );

    let result = AuthFlow::new(&session, options(port)).run().await;

    match result {
        Err(GmailMcpError::PortInUse { port: reported }) => assert_eq!(reported, port),
        other => panic!("expected PortInUse, got {:?}", other),
    }
    drop(occupied);
}

#[tokio::test]
async fn test_timeout_releases_port() {
    let token_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let port = free_port();
    let session = session(
        &token_server,
        CredentialStore::new(dir.path().join("credentials.json")),
        port,
    );

    let mut flow = AuthFlow::new(
        &session,
        FlowOptions::new(port)
            .open_browser(false)
            .timeout(Duration::from_millis(200)),
    );
    let result = flow.run().await;

    assert!(matches!(result, Err(GmailMcpError::Timeout { .. })));
    assert!(TcpListener::bind(("127.0.0.1", port)).is_ok());
}
