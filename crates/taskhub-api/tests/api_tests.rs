//! API Integration Tests
//!
//! Every test runs against in-memory repositories; no database is needed.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use taskhub_api::auth::UserRepository;
use taskhub_api::db::Repositories;
use taskhub_api::memory::InMemoryStore;
use taskhub_api::{create_router_for_testing, create_router_for_testing_with};
use tower::ServiceExt;

const PASSWORD: &str = "Sup3rSecret!";

/// Helper to create a test request
fn create_json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    authed_request(method, uri, None, body)
}

fn authed_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

struct Session {
    user_id: String,
    access_token: String,
    refresh_token: String,
}

async fn register(app: &Router, email: &str) -> (StatusCode, Value) {
    send(
        app,
        create_json_request(
            "POST",
            "/api/v1/auth/register",
            Some(json!({ "name": "Test User", "email": email, "password": PASSWORD })),
        ),
    )
    .await
}

async fn login(app: &Router, email: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        create_json_request(
            "POST",
            "/api/v1/auth/login",
            Some(json!({ "email": email, "password": password })),
        ),
    )
    .await
}

async fn register_and_login(app: &Router, email: &str) -> Session {
    let (status, _) = register(app, email).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = login(app, email, PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    session_from(&json)
}

fn session_from(json: &Value) -> Session {
    Session {
        user_id: json["data"]["user"]["id"].as_str().unwrap().to_string(),
        access_token: json["data"]["access_token"].as_str().unwrap().to_string(),
        refresh_token: json["data"]["refresh_token"].as_str().unwrap().to_string(),
    }
}

/// Router over a store the test can reach into, plus a logged-in administrator
async fn app_with_admin() -> (Router, Arc<InMemoryStore>, Session) {
    let store = Arc::new(InMemoryStore::default());
    let app = create_router_for_testing_with(Repositories::from_store(store.clone()));

    let (status, json) = register(&app, "admin@example.com").await;
    assert_eq!(status, StatusCode::CREATED);
    let admin_id = json["data"]["id"].as_str().unwrap().parse().unwrap();
    store.set_admin(admin_id, true).await.unwrap();

    let (_, json) = login(&app, "admin@example.com", PASSWORD).await;
    (app, store, session_from(&json))
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = create_router_for_testing();

    let (status, json) = send(&app, create_json_request("GET", "/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_readiness_check() {
    let app = create_router_for_testing();

    let (status, json) = send(&app, create_json_request("GET", "/ready", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);
    assert_eq!(json["checks"]["database"], true);
}

#[tokio::test]
async fn test_openapi_document_served() {
    let app = create_router_for_testing();

    let (status, json) = send(
        &app,
        create_json_request("GET", "/api-docs/openapi.json", None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/api/v1/auth/login"].is_object());
    assert!(json["components"]["securitySchemes"]["bearer_auth"].is_object());
}

#[tokio::test]
async fn test_security_headers_on_api_errors() {
    let app = create_router_for_testing();

    let response = app
        .oneshot(create_json_request("GET", "/api/v1/auth/me", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
        "nosniff"
    );
    assert_eq!(response.headers().get(header::CACHE_CONTROL).unwrap(), "no-store");
}

// =============================================================================
// Registration and Login Tests
// =============================================================================

#[tokio::test]
async fn test_register_success() {
    let app = create_router_for_testing();

    let (status, json) = register(&app, "Alice@Example.com").await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["email"], "alice@example.com");
    assert_eq!(json["data"]["is_admin"], false);
    assert!(json["data"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let app = create_router_for_testing();

    register(&app, "alice@example.com").await;
    let (status, json) = register(&app, "ALICE@example.com").await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "CONFLICT");
}

#[tokio::test]
async fn test_register_weak_password_rejected() {
    let app = create_router_for_testing();

    let (status, json) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/register",
            Some(json!({ "name": "Weak", "email": "weak@example.com", "password": "password" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_register_invalid_email_rejected() {
    let app = create_router_for_testing();

    let (status, _) = register(&app, "not-an-email").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_missing_field_uses_error_envelope() {
    let app = create_router_for_testing();

    let (status, json) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/register",
            Some(json!({ "email": "a@example.com", "name": "Al" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "BAD_REQUEST");
    assert!(json["message"].as_str().unwrap().contains("password"));
}

#[tokio::test]
async fn test_unparsable_body_uses_error_envelope() {
    let app = create_router_for_testing();
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/login")
        .header("Content-Type", "application/json")
        .body(Body::from("not json"))
        .unwrap();

    let (status, json) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_login_returns_token_pair() {
    let app = create_router_for_testing();
    register(&app, "alice@example.com").await;

    let (status, json) = login(&app, "alice@example.com", PASSWORD).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["token_type"], "Bearer");
    assert!(json["data"]["expires_in"].as_u64().unwrap() > 0);
    assert!(json["data"]["access_token"].is_string());
    assert!(json["data"]["refresh_token"].is_string());
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = create_router_for_testing();
    register(&app, "alice@example.com").await;

    let (wrong_status, wrong_password) = login(&app, "alice@example.com", "Wr0ng-password").await;
    let (unknown_status, unknown_user) = login(&app, "nobody@example.com", PASSWORD).await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password, unknown_user);
    assert_eq!(wrong_password["message"], "Authentication failed");
}

#[tokio::test]
async fn test_inactive_user_cannot_login() {
    let (app, _store, admin) = app_with_admin().await;
    let alice = register_and_login(&app, "alice@example.com").await;

    let (status, _) = send(
        &app,
        authed_request(
            "PATCH",
            &format!("/api/v1/users/{}/status", alice.user_id),
            Some(&admin.access_token),
            Some(json!({ "is_active": false })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = login(&app, "alice@example.com", PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["message"], "Authentication failed");

    // existing access tokens stop working too
    let (status, _) = send(
        &app,
        authed_request("GET", "/api/v1/auth/me", Some(&alice.access_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Token Tests
// =============================================================================

#[tokio::test]
async fn test_me_and_verify() {
    let app = create_router_for_testing();
    let alice = register_and_login(&app, "alice@example.com").await;

    let (status, json) = send(
        &app,
        authed_request("GET", "/api/v1/auth/me", Some(&alice.access_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["user"]["email"], "alice@example.com");
    assert_eq!(json["data"]["roles"], json!([]));

    let (status, json) = send(
        &app,
        authed_request("GET", "/api/v1/auth/verify", Some(&alice.access_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["valid"], true);
    assert_eq!(json["data"]["user"]["id"], alice.user_id);
}

#[tokio::test]
async fn test_protected_route_rejects_bad_credentials() {
    let app = create_router_for_testing();

    let missing = send(&app, create_json_request("GET", "/api/v1/auth/me", None)).await;
    let garbage = send(
        &app,
        authed_request("GET", "/api/v1/auth/me", Some("not.a.jwt"), None),
    )
    .await;
    let wrong_scheme = send(
        &app,
        Request::builder()
            .uri("/api/v1/auth/me")
            .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    for (status, json) in [missing, garbage, wrong_scheme] {
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Authentication failed");
    }
}

#[tokio::test]
async fn test_refresh_rotates_and_rejects_reuse() {
    let app = create_router_for_testing();
    let alice = register_and_login(&app, "alice@example.com").await;

    let (status, json) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/refresh-token",
            Some(json!({ "refresh_token": alice.refresh_token })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let rotated = session_from(&json);
    assert_ne!(rotated.refresh_token, alice.refresh_token);

    // the consumed token is dead
    let (status, json) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/refresh-token",
            Some(json!({ "refresh_token": alice.refresh_token })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["message"], "Authentication failed");

    // the successor still works
    let (status, _) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/refresh-token",
            Some(json!({ "refresh_token": rotated.refresh_token })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_logout_blacklists_access_token_and_revokes_refresh_token() {
    let app = create_router_for_testing();
    let alice = register_and_login(&app, "alice@example.com").await;

    let (status, _) = send(
        &app,
        authed_request(
            "POST",
            "/api/v1/auth/logout",
            Some(&alice.access_token),
            Some(json!({ "refresh_token": alice.refresh_token })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        authed_request("GET", "/api/v1/auth/me", Some(&alice.access_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // the token is blacklisted, so a repeated logout fails authentication
    let (status, _) = send(
        &app,
        authed_request("POST", "/api/v1/auth/logout", Some(&alice.access_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/refresh-token",
            Some(json!({ "refresh_token": alice.refresh_token })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_without_body() {
    let app = create_router_for_testing();
    let alice = register_and_login(&app, "alice@example.com").await;

    let (status, json) = send(
        &app,
        authed_request("POST", "/api/v1/auth/logout", Some(&alice.access_token), None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
}

#[tokio::test]
async fn test_logout_all_revokes_every_session() {
    let app = create_router_for_testing();
    let first = register_and_login(&app, "alice@example.com").await;
    let (_, json) = login(&app, "alice@example.com", PASSWORD).await;
    let second = session_from(&json);

    let (status, json) = send(
        &app,
        authed_request("POST", "/api/v1/auth/logout-all", Some(&first.access_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["revoked_sessions"], 2);

    for refresh_token in [first.refresh_token, second.refresh_token] {
        let (status, _) = send(
            &app,
            create_json_request(
                "POST",
                "/api/v1/auth/refresh-token",
                Some(json!({ "refresh_token": refresh_token })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn test_change_password() {
    let app = create_router_for_testing();
    let alice = register_and_login(&app, "alice@example.com").await;

    let (status, json) = send(
        &app,
        authed_request(
            "PUT",
            "/api/v1/auth/change-password",
            Some(&alice.access_token),
            Some(json!({ "current_password": "Wr0ng-password", "new_password": "N3w-Secret!" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Password change failed");

    let (status, _) = send(
        &app,
        authed_request(
            "PUT",
            "/api/v1/auth/change-password",
            Some(&alice.access_token),
            Some(json!({ "current_password": PASSWORD, "new_password": "N3w-Secret!" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = login(&app, "alice@example.com", PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = login(&app, "alice@example.com", "N3w-Secret!").await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Authorization Tests
// =============================================================================

#[tokio::test]
async fn test_admin_routes_forbidden_for_regular_users() {
    let app = create_router_for_testing();
    let alice = register_and_login(&app, "alice@example.com").await;

    let (status, json) = send(
        &app,
        authed_request(
            "PATCH",
            &format!("/api/v1/users/{}/status", alice.user_id),
            Some(&alice.access_token),
            Some(json!({ "is_active": false })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "FORBIDDEN");

    let (status, _) = send(
        &app,
        authed_request(
            "POST",
            &format!("/api/v1/users/{}/roles", alice.user_id),
            Some(&alice.access_token),
            Some(json!({ "role": "admin" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_capability_gates_without_roles() {
    let app = create_router_for_testing();
    let alice = register_and_login(&app, "alice@example.com").await;

    for uri in ["/api/v1/activity", "/api/v1/dashboard/summary", "/api/v1/users"] {
        let (status, _) = send(&app, authed_request("GET", uri, Some(&alice.access_token), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
    }
}

#[tokio::test]
async fn test_users_can_read_their_own_record() {
    let app = create_router_for_testing();
    let alice = register_and_login(&app, "alice@example.com").await;
    let bob = register_and_login(&app, "bob@example.com").await;

    let (status, _) = send(
        &app,
        authed_request(
            "GET",
            &format!("/api/v1/users/{}", alice.user_id),
            Some(&alice.access_token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        authed_request(
            "GET",
            &format!("/api/v1/users/{}", bob.user_id),
            Some(&alice.access_token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_role_assignment_takes_effect_immediately() {
    let (app, _store, admin) = app_with_admin().await;
    let alice = register_and_login(&app, "alice@example.com").await;

    let (status, _) = send(
        &app,
        authed_request("GET", "/api/v1/activity", Some(&alice.access_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = send(
        &app,
        authed_request(
            "POST",
            &format!("/api/v1/users/{}/roles", alice.user_id),
            Some(&admin.access_token),
            Some(json!({ "role": "responsable_proyecto" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["role"], "responsable_proyecto");

    // same access token, new permissions
    let (status, _) = send(
        &app,
        authed_request("GET", "/api/v1/activity", Some(&alice.access_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        authed_request(
            "DELETE",
            &format!("/api/v1/users/{}/roles/responsable_proyecto", alice.user_id),
            Some(&admin.access_token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        authed_request("GET", "/api/v1/activity", Some(&alice.access_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// =============================================================================
// Project and Task Tests
// =============================================================================

#[tokio::test]
async fn test_project_creation_requires_capability() {
    let app = create_router_for_testing();
    let alice = register_and_login(&app, "alice@example.com").await;

    let (status, _) = send(
        &app,
        authed_request(
            "POST",
            "/api/v1/projects",
            Some(&alice.access_token),
            Some(json!({ "name": "Apollo" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_project_and_task_lifecycle() {
    let (app, _store, admin) = app_with_admin().await;
    let lead = register_and_login(&app, "lead@example.com").await;
    let dev = register_and_login(&app, "dev@example.com").await;

    send(
        &app,
        authed_request(
            "POST",
            &format!("/api/v1/users/{}/roles", lead.user_id),
            Some(&admin.access_token),
            Some(json!({ "role": "responsable_proyecto" })),
        ),
    )
    .await;

    // Create project
    let (status, json) = send(
        &app,
        authed_request(
            "POST",
            "/api/v1/projects",
            Some(&lead.access_token),
            Some(json!({ "name": "Apollo", "description": "Moonshot" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["status"], "pending");
    assert_eq!(json["data"]["created_by"], lead.user_id);
    let project_id = json["data"]["id"].as_str().unwrap().to_string();

    // Create task assigned to dev
    let (status, json) = send(
        &app,
        authed_request(
            "POST",
            &format!("/api/v1/projects/{project_id}/tasks"),
            Some(&lead.access_token),
            Some(json!({ "title": "Build rocket", "assigned_to": dev.user_id, "priority": "high" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["project_id"], project_id);
    let task_id = json["data"]["id"].as_str().unwrap().to_string();

    // The assignee sees it in their own list
    let (status, json) = send(
        &app,
        authed_request("GET", "/api/v1/tasks/mine", Some(&dev.access_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
    assert_eq!(json["data"][0]["id"], task_id);

    // The assignee may move it forward
    let (status, json) = send(
        &app,
        authed_request(
            "PUT",
            &format!("/api/v1/tasks/{task_id}"),
            Some(&dev.access_token),
            Some(json!({ "status": "in_progress" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "in_progress");
    assert_eq!(json["data"]["title"], "Build rocket");

    // Project listing and counts
    let (status, json) = send(
        &app,
        authed_request(
            "GET",
            &format!("/api/v1/projects/{project_id}/tasks"),
            Some(&lead.access_token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().unwrap().len(), 1);

    let (status, json) = send(
        &app,
        authed_request("GET", "/api/v1/dashboard/summary", Some(&lead.access_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["projects"]["total"], 1);
    assert_eq!(json["data"]["tasks"]["in_progress"], 1);

    // Delete the task, then the project
    let (status, _) = send(
        &app,
        authed_request(
            "DELETE",
            &format!("/api/v1/tasks/{task_id}"),
            Some(&lead.access_token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        authed_request(
            "GET",
            &format!("/api/v1/tasks/{task_id}"),
            Some(&lead.access_token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        authed_request(
            "DELETE",
            &format!("/api/v1/projects/{project_id}"),
            Some(&admin.access_token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_outsider_cannot_read_project() {
    let (app, _store, admin) = app_with_admin().await;
    let outsider = register_and_login(&app, "outsider@example.com").await;

    let (_, json) = send(
        &app,
        authed_request(
            "POST",
            "/api/v1/projects",
            Some(&admin.access_token),
            Some(json!({ "name": "Secret" })),
        ),
    )
    .await;
    let project_id = json["data"]["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        authed_request(
            "GET",
            &format!("/api/v1/projects/{project_id}"),
            Some(&outsider.access_token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = send(
        &app,
        authed_request("GET", "/api/v1/projects", Some(&outsider.access_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"], json!([]));
}

#[tokio::test]
async fn test_missing_project_is_not_found() {
    let (app, _store, admin) = app_with_admin().await;

    let (status, json) = send(
        &app,
        authed_request(
            "GET",
            &format!("/api/v1/projects/{}", uuid::Uuid::new_v4()),
            Some(&admin.access_token),
            None,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_activity_records_project_creation() {
    let (app, _store, admin) = app_with_admin().await;

    send(
        &app,
        authed_request(
            "POST",
            "/api/v1/projects",
            Some(&admin.access_token),
            Some(json!({ "name": "Logged" })),
        ),
    )
    .await;

    let (status, json) = send(
        &app,
        authed_request("GET", "/api/v1/activity", Some(&admin.access_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let entries = json["data"].as_array().unwrap();
    assert!(entries
        .iter()
        .any(|e| e["entity_type"] == "project" && e["action"] == "created"));
}
