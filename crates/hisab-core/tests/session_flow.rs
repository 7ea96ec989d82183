//! End-to-end session behaviour: login, refresh-on-401, logout and restore,
//! driven through a scripted transport.

use std::sync::Arc;

use hisab_core::api::client::REFRESH_PATH;
use hisab_core::api::transport::mock::MockTransport;
use hisab_core::api::{ApiClient, ApiError, ApiRequest, ApiResponse};
use hisab_core::auth::{
    AuthState, Credentials, FileTokenStore, MemoryTokenStore, SessionHandle, SessionStore,
    StoredSession, TokenStore,
};
use hisab_core::models::{ProfileUpdate, UserProfile};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

const LOGIN: &str = "/auth/login/";
const LOGOUT: &str = "/auth/logout/";
const USER: &str = "/auth/user/";
const SUMMARY: &str = "/invoices/summary/";
const RECENT: &str = "/invoices/recent/";

fn ok(body: Value) -> Result<ApiResponse, ApiError> {
    Ok(ApiResponse::with_json(StatusCode::OK, &body))
}

fn unauthorized() -> Result<ApiResponse, ApiError> {
    Ok(ApiResponse::with_json(
        StatusCode::UNAUTHORIZED,
        &json!({"detail": "Given token not valid for any token type", "code": "token_not_valid"}),
    ))
}

fn user_json(username: &str) -> Value {
    json!({
        "id": 1,
        "username": username,
        "email": format!("{}@example.test", username),
        "first_name": "",
        "last_name": "",
        "profile": {"company_name": "Acme", "phone": "111", "address": "", "gst_number": ""}
    })
}

fn login_json(username: &str, access: &str, refresh: &str) -> Value {
    json!({
        "user": user_json(username),
        "tokens": {"access": access, "refresh": refresh}
    })
}

fn summary_json() -> Value {
    json!({
        "total_invoices": 2,
        "pending_invoices": 1,
        "paid_invoices": 1,
        "overdue_invoices": 0,
        "total_pending_amount": "1180.00",
        "total_paid_amount": "590.00",
        "total_overdue_amount": "0.00",
        "total_amount": "1770.00"
    })
}

fn store_over(transport: Arc<MockTransport>, tokens: MemoryTokenStore) -> SessionStore {
    let session = Arc::new(SessionHandle::new(Box::new(tokens)));
    SessionStore::new(ApiClient::with_transport(transport, session))
}

#[tokio::test]
async fn test_expired_access_token_is_refreshed_once_and_replayed() {
    let transport = Arc::new(MockTransport::new(|request| {
        match (request.path.as_str(), request.bearer.as_deref()) {
            (LOGIN, _) => ok(login_json("alice", "A1", "R1")),
            (REFRESH_PATH, _) => ok(json!({"access": "A2"})),
            (SUMMARY, Some("A2")) => ok(summary_json()),
            _ => unauthorized(),
        }
    }));
    let tokens = MemoryTokenStore::new();
    let store = store_over(transport.clone(), tokens.clone());

    let user = store.login("alice", "secret").await.unwrap();
    assert_eq!(user.username, "alice");
    assert_eq!(store.current_user().unwrap().username, "alice");

    let summary = store.client().invoice_summary().await.unwrap();
    assert_eq!(summary.total_invoices, 2);

    let session = store.session();
    assert_eq!(session.access_token().as_deref(), Some("A2"));
    assert_eq!(session.refresh_token().as_deref(), Some("R1"));
    assert_eq!(
        tokens.stored().unwrap().credentials,
        Credentials::new("A2", "R1")
    );

    let requests = transport.requests();
    let trail: Vec<(&str, Option<&str>, bool)> = requests
        .iter()
        .map(|r| (r.path.as_str(), r.bearer.as_deref(), r.is_retried()))
        .collect();
    assert_eq!(
        trail,
        vec![
            (LOGIN, None, false),
            (SUMMARY, Some("A1"), false),
            (REFRESH_PATH, None, false),
            (SUMMARY, Some("A2"), true),
        ]
    );
    assert_eq!(requests[2].body, Some(json!({"refresh": "R1"})));
}

#[tokio::test]
async fn test_rejected_refresh_clears_session() {
    let transport = Arc::new(MockTransport::new(|request| match request.path.as_str() {
        LOGIN => ok(login_json("alice", "A1", "R1")),
        _ => unauthorized(),
    }));
    let tokens = MemoryTokenStore::new();
    let store = store_over(transport.clone(), tokens.clone());
    store.login("alice", "secret").await.unwrap();
    let mut auth_state = store.session().subscribe();

    let err = store.client().invoice_summary().await.unwrap_err();

    assert!(err.requires_reauth());
    assert!(!store.is_authenticated());
    assert!(store.current_user().is_none());
    assert!(store.session().credentials().is_none());
    assert!(tokens.stored().is_none());
    assert!(auth_state.has_changed().unwrap());
    assert_eq!(*auth_state.borrow_and_update(), AuthState::Unauthenticated);
    // The original request is not replayed after a failed refresh
    assert_eq!(transport.count(&Method::GET, SUMMARY), 1);
    assert_eq!(transport.count(&Method::POST, REFRESH_PATH), 1);
}

#[tokio::test]
async fn test_replayed_request_is_not_retried_again() {
    let transport = Arc::new(MockTransport::new(|request| match request.path.as_str() {
        LOGIN => ok(login_json("alice", "A1", "R1")),
        REFRESH_PATH => ok(json!({"access": "A2"})),
        _ => unauthorized(),
    }));
    let store = store_over(transport.clone(), MemoryTokenStore::new());
    store.login("alice", "secret").await.unwrap();

    let err = store.client().invoice_summary().await.unwrap_err();

    assert!(matches!(err, ApiError::Unauthorized { .. }));
    assert_eq!(transport.count(&Method::POST, REFRESH_PATH), 1);
    assert_eq!(transport.count(&Method::GET, SUMMARY), 2);
    // Refresh itself worked, so the session stays
    assert_eq!(store.session().access_token().as_deref(), Some("A2"));
}

#[tokio::test]
async fn test_concurrent_rejections_share_one_refresh() {
    let transport = Arc::new(
        MockTransport::new(|request| {
            match (request.path.as_str(), request.bearer.as_deref()) {
                (REFRESH_PATH, _) => ok(json!({"access": "A2"})),
                (SUMMARY, Some("A2")) => ok(summary_json()),
                (RECENT, Some("A2")) => ok(json!([])),
                _ => unauthorized(),
            }
        })
        .yielding(),
    );
    let tokens = MemoryTokenStore::with_session(StoredSession::new(
        Credentials::new("A1", "R1"),
        serde_json::from_value(user_json("alice")).ok(),
    ));
    let session = Arc::new(SessionHandle::load(Box::new(tokens)));
    let client = ApiClient::with_transport(transport.clone(), session.clone());

    let (summary, recent) = tokio::join!(client.invoice_summary(), client.recent_invoices());

    assert_eq!(summary.unwrap().paid_invoices, 1);
    assert!(recent.unwrap().is_empty());
    assert_eq!(transport.count(&Method::POST, REFRESH_PATH), 1);
    assert_eq!(transport.count(&Method::GET, SUMMARY), 2);
    assert_eq!(transport.count(&Method::GET, RECENT), 2);
    assert_eq!(session.access_token().as_deref(), Some("A2"));
}

#[tokio::test]
async fn test_failed_login_keeps_prior_session() {
    let transport = Arc::new(MockTransport::new(|_| {
        Ok(ApiResponse::with_json(
            StatusCode::UNAUTHORIZED,
            &json!({"error": "Invalid credentials"}),
        ))
    }));
    let tokens = MemoryTokenStore::new();
    let store = store_over(transport.clone(), tokens.clone());
    let bob: UserProfile = serde_json::from_value(user_json("bob")).unwrap();
    store.session().install(bob, Credentials::new("B1", "BR1"));

    let failure = store.login("alice", "wrong").await.unwrap_err();

    assert_eq!(failure.message, "Invalid credentials");
    assert!(matches!(failure.source, Some(ApiError::Unauthorized { .. })));
    assert_eq!(store.current_user().unwrap().username, "bob");
    assert_eq!(
        store.session().credentials(),
        Some(Credentials::new("B1", "BR1"))
    );
    assert_eq!(tokens.stored().unwrap().credentials.access_token, "B1");
    // Login is never intercepted, so no refresh was attempted
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn test_login_replaces_previous_profile() {
    let transport = Arc::new(MockTransport::new(|_| {
        ok(json!({
            "user": {"id": 2, "username": "alice", "profile": {"company_name": "Alice Co"}},
            "tokens": {"access": "A1", "refresh": "R1"}
        }))
    }));
    let store = store_over(transport, MemoryTokenStore::new());
    let bob: UserProfile = serde_json::from_value(user_json("bob")).unwrap();
    store.session().install(bob, Credentials::new("B1", "BR1"));

    store.login("alice", "secret").await.unwrap();

    let user = store.current_user().unwrap();
    assert_eq!(user.username, "alice");
    assert_eq!(user.profile.company_name, "Alice Co");
    // Nothing of bob's profile survives
    assert_eq!(user.profile.phone, "");
    assert_eq!(store.session().credentials(), Some(Credentials::new("A1", "R1")));
}

#[tokio::test]
async fn test_logout_clears_even_when_server_unreachable() {
    let transport = Arc::new(MockTransport::new(|request| match request.path.as_str() {
        LOGIN => ok(login_json("alice", "A1", "R1")),
        _ => Err(ApiError::NetworkError("connection refused".into())),
    }));
    let tokens = MemoryTokenStore::new();
    let store = store_over(transport.clone(), tokens.clone());
    store.login("alice", "secret").await.unwrap();

    store.logout().await;

    assert!(!store.is_authenticated());
    assert!(store.current_user().is_none());
    assert!(tokens.stored().is_none());

    let notice = transport
        .requests()
        .into_iter()
        .find(|r| r.path == LOGOUT)
        .unwrap();
    assert_eq!(notice.body, Some(json!({"refresh_token": "R1"})));
    assert_eq!(notice.bearer.as_deref(), Some("A1"));
}

#[tokio::test]
async fn test_logout_with_expired_access_token_still_revokes() {
    let transport = Arc::new(MockTransport::new(|request| {
        match (request.path.as_str(), request.bearer.as_deref()) {
            (LOGIN, _) => ok(login_json("alice", "A1", "R1")),
            (REFRESH_PATH, _) => ok(json!({"access": "A2"})),
            (LOGOUT, Some("A2")) => ok(json!({"message": "Successfully logged out"})),
            _ => unauthorized(),
        }
    }));
    let tokens = MemoryTokenStore::new();
    let store = store_over(transport.clone(), tokens.clone());
    store.login("alice", "secret").await.unwrap();

    store.logout().await;

    // The minted token is only used for the notice
    assert!(store.session().credentials().is_none());
    assert!(tokens.stored().is_none());
    assert_eq!(transport.count(&Method::POST, REFRESH_PATH), 1);
    assert_eq!(transport.count(&Method::POST, LOGOUT), 2);
    let last = transport.requests().pop().unwrap();
    assert_eq!(last.bearer.as_deref(), Some("A2"));
    assert_eq!(last.body, Some(json!({"refresh_token": "R1"})));
}

#[tokio::test]
async fn test_login_logout_round_trip_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(MockTransport::new(|request| match request.path.as_str() {
        LOGIN => ok(login_json("alice", "A1", "R1")),
        _ => ok(json!({"message": "Successfully logged out"})),
    }));
    let session = Arc::new(SessionHandle::load(Box::new(FileTokenStore::new(dir.path()))));
    let store = SessionStore::new(ApiClient::with_transport(transport, session));
    let on_disk = FileTokenStore::new(dir.path());

    assert!(!store.is_authenticated());

    store.login("alice", "secret").await.unwrap();
    assert!(store.is_authenticated());
    let saved = on_disk.load().unwrap().unwrap();
    assert_eq!(saved.credentials, Credentials::new("A1", "R1"));
    assert_eq!(saved.user.unwrap().username, "alice");

    store.logout().await;
    assert!(!store.is_authenticated());
    assert!(store.current_user().is_none());
    assert!(on_disk.load().unwrap().is_none());
    assert!(!on_disk.path().exists());
}

#[tokio::test]
async fn test_profile_update_replaces_cached_profile() {
    let transport = Arc::new(MockTransport::new(|request| match request.path.as_str() {
        LOGIN => ok(login_json("alice", "A1", "R1")),
        _ => ok(json!({
            "id": 1,
            "username": "alice",
            "email": "alice@example.test",
            "profile": {"company_name": "Acme Two"}
        })),
    }));
    let tokens = MemoryTokenStore::new();
    let store = store_over(transport.clone(), tokens.clone());
    store.login("alice", "secret").await.unwrap();

    let update = ProfileUpdate {
        company_name: Some("Acme Two".into()),
        ..Default::default()
    };
    store.update_profile(&update).await.unwrap();

    let user = store.current_user().unwrap();
    assert_eq!(user.profile.company_name, "Acme Two");
    assert_eq!(user.profile.phone, "");
    assert_eq!(
        tokens.stored().unwrap().user.unwrap().profile.company_name,
        "Acme Two"
    );
    // Credentials are untouched by a profile update
    assert_eq!(store.session().credentials(), Some(Credentials::new("A1", "R1")));
    let put = transport
        .requests()
        .into_iter()
        .find(|r| r.method == Method::PUT)
        .unwrap();
    assert_eq!(put.body, Some(json!({"company_name": "Acme Two"})));
}

#[tokio::test]
async fn test_restore_refreshes_profile_from_server() {
    let dir = tempfile::tempdir().unwrap();
    FileTokenStore::new(dir.path())
        .save(&StoredSession::new(
            Credentials::new("A1", "R1"),
            serde_json::from_value(user_json("alice")).ok(),
        ))
        .unwrap();
    let transport = Arc::new(MockTransport::new(|_| {
        ok(json!({"id": 1, "username": "alice", "first_name": "Alice"}))
    }));
    let session = Arc::new(SessionHandle::load(Box::new(FileTokenStore::new(dir.path()))));
    let store = SessionStore::new(ApiClient::with_transport(transport.clone(), session));

    let user = store.restore().await.unwrap().unwrap();

    assert_eq!(user.display_name(), "Alice");
    assert_eq!(store.current_user().unwrap().first_name, "Alice");
    assert_eq!(transport.requests()[0].path, USER);
    assert_eq!(transport.requests()[0].bearer.as_deref(), Some("A1"));
}

#[tokio::test]
async fn test_restore_with_dead_refresh_token_clears() {
    let transport = Arc::new(MockTransport::new(|_| unauthorized()));
    let tokens = MemoryTokenStore::with_session(StoredSession::new(
        Credentials::new("A1", "R1"),
        serde_json::from_value(user_json("alice")).ok(),
    ));
    let session = Arc::new(SessionHandle::load(Box::new(tokens.clone())));
    let store = SessionStore::new(ApiClient::with_transport(transport, session));

    let err = store.restore().await.unwrap_err();

    assert!(err.requires_reauth());
    assert!(!store.is_authenticated());
    assert!(tokens.stored().is_none());
}

#[tokio::test]
async fn test_other_failures_pass_through_without_refresh() {
    let transport = Arc::new(MockTransport::new(|request| match request.path.as_str() {
        SUMMARY => Ok(ApiResponse::with_json(
            StatusCode::NOT_FOUND,
            &json!({"detail": "Not found."}),
        )),
        RECENT => Ok(ApiResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "boom")),
        _ => Ok(ApiResponse::with_json(
            StatusCode::FORBIDDEN,
            &json!({"detail": "You do not have permission to perform this action."}),
        )),
    }));
    let tokens = MemoryTokenStore::with_session(StoredSession::new(
        Credentials::new("A1", "R1"),
        None,
    ));
    let session = Arc::new(SessionHandle::load(Box::new(tokens)));
    let client = ApiClient::with_transport(transport.clone(), session.clone());

    assert!(matches!(
        client.invoice_summary().await.unwrap_err(),
        ApiError::NotFound { .. }
    ));
    assert!(matches!(
        client.recent_invoices().await.unwrap_err(),
        ApiError::ServerError(_)
    ));
    let err = client.send(ApiRequest::get(USER)).await.unwrap_err();
    assert_eq!(
        err.server_message(),
        Some("You do not have permission to perform this action.")
    );

    assert_eq!(transport.count(&Method::POST, REFRESH_PATH), 0);
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn test_anonymous_requests_carry_no_bearer() {
    let transport = Arc::new(MockTransport::new(|_| ok(json!([]))));
    let session = Arc::new(SessionHandle::in_memory());
    let client = ApiClient::with_transport(transport.clone(), session);

    client.recent_invoices().await.unwrap();
    assert_eq!(transport.requests()[0].bearer, None);
}
