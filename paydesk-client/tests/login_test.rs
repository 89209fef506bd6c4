//! Login flow and session persistence end to end

use std::sync::Arc;
use std::time::Duration;

use paydesk_client::{
    AuthApi, AuthController, ClientConfig, HttpClient, LoginRequest, PaymentQuery, PaymentsApi,
    Session, SessionStore,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, session: Arc<SessionStore>) -> Arc<HttpClient> {
    let config = ClientConfig::with_base_url(format!("{}/api", server.uri()));
    Arc::new(HttpClient::new(config, session).unwrap())
}

async fn mock_login_success(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .and(body_json(json!({"username": "alice", "password": "pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": "A1",
            "refresh": "R1",
            "user": {
                "id": 1,
                "username": "alice",
                "email": "alice@example.com",
                "first_name": "Alice",
                "last_name": "Doe"
            }
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_then_authenticated_call() {
    let server = MockServer::start().await;
    let session = Arc::new(SessionStore::in_memory());
    let http = client_for(&server, session.clone());

    mock_login_success(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/organization-payment/"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 0,
            "next": null,
            "previous": null,
            "results": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let auth = AuthController::new(AuthApi::new(http.clone()), session.clone());
    assert!(!auth.is_authenticated());

    let user = auth.login(&LoginRequest::new("alice", "pw")).await.unwrap();
    assert_eq!(user.id, 1);
    assert!(auth.is_authenticated());

    assert_eq!(session.get_token().as_deref(), Some("A1"));
    assert_eq!(session.get_refresh().as_deref(), Some("R1"));
    assert_eq!(session.get_user().map(|u| u.id), Some(1));

    let page = PaymentsApi::new(http).list(PaymentQuery::new()).await.unwrap();
    assert_eq!(page.count, 0);
    assert!(!page.has_next());
}

#[tokio::test]
async fn test_login_failure_persists_nothing() {
    let server = MockServer::start().await;
    let session = Arc::new(SessionStore::in_memory());
    let http = client_for(&server, session.clone());

    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "No active account found with the given credentials"
        })))
        .mount(&server)
        .await;

    let auth = AuthController::new(AuthApi::new(http), session.clone());
    let err = auth
        .login(&LoginRequest::new("alice", "nope"))
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "No active account found with the given credentials"
    );
    assert!(!auth.is_authenticated());
    assert_eq!(session.snapshot(), Session::default());
}

#[tokio::test]
async fn test_login_network_failure_message() {
    let session = Arc::new(SessionStore::in_memory());
    let http = Arc::new(
        HttpClient::new(ClientConfig::with_base_url("http://127.0.0.1:9/api"), session.clone())
            .unwrap(),
    );

    let auth = AuthController::new(AuthApi::new(http), session);
    let err = auth
        .login(&LoginRequest::new("alice", "pw"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Network Error");
}

#[tokio::test]
async fn test_file_session_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let session_file = dir.path().join("session.json");
    let server = MockServer::start().await;
    mock_login_success(&server).await;

    {
        let session = Arc::new(SessionStore::file(&session_file));
        let http = client_for(&server, session.clone());
        let auth = AuthController::new(AuthApi::new(http), session);
        auth.login(&LoginRequest::new("alice", "pw")).await.unwrap();
    }

    let session = Arc::new(SessionStore::file(&session_file));
    let http = client_for(&server, session.clone());
    let auth = AuthController::new(AuthApi::new(http), session.clone());
    assert!(auth.is_authenticated());
    assert_eq!(auth.user().unwrap().username, "alice");

    auth.logout();
    let reopened = SessionStore::file(&session_file);
    assert!(reopened.get_user().is_none());
    assert!(reopened.get_token().is_none());
    assert!(reopened.get_refresh().is_none());
}

#[tokio::test]
async fn test_sign_out_calls_server_and_clears() {
    let server = MockServer::start().await;
    let session = Arc::new(SessionStore::in_memory());
    session.set_token("A1");
    session.set_refresh("R1");
    session.set_user(&serde_json::from_value(json!({"id": 1, "username": "alice"})).unwrap());

    Mock::given(method("POST"))
        .and(path("/api/auth/logout/"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(205))
        .expect(1)
        .mount(&server)
        .await;

    let http = client_for(&server, session.clone());
    let auth = AuthController::new(AuthApi::new(http), session.clone());
    assert!(auth.is_authenticated());

    auth.sign_out().await;
    assert!(!auth.is_authenticated());
    assert_eq!(session.snapshot(), Session::default());
}

#[tokio::test]
async fn test_expired_session_resets_controller() {
    let server = MockServer::start().await;
    let session = Arc::new(SessionStore::in_memory());
    session.set_token("A1");
    session.set_refresh("R1");
    session.set_user(&serde_json::from_value(json!({"id": 1, "username": "alice"})).unwrap());

    Mock::given(method("GET"))
        .and(path("/api/organization-payment/stats/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let http = client_for(&server, session.clone());
    let auth = Arc::new(AuthController::new(AuthApi::new(http.clone()), session));
    let watcher = auth.watch(http.subscribe());
    assert!(auth.is_authenticated());

    assert!(PaymentsApi::new(http).stats().await.is_err());

    for _ in 0..50 {
        if !auth.is_authenticated() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!auth.is_authenticated());
    watcher.abort();
}
