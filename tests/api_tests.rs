use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

use dsr_tracker::db::enums::Role;
use dsr_tracker::db::memory_store::MemoryStore;
use dsr_tracker::server::config::AppConfig;
use dsr_tracker::services::auth_service::{AuthService, NewUser};
use dsr_tracker::services::dsr_service::{DsrService, DsrSettings};
use dsr_tracker::services::organization_service::OrganizationService;
use dsr_tracker::web::{AppState, create_router};

fn test_config() -> AppConfig {
    AppConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        database_url: None,
        jwt_secret: "integration-secret".to_string(),
        frontend_url: None,
        page_size: 2,
        session_ttl_hours: 1,
        comment_append_attempts: 3,
        log_dir: "logs".to_string(),
        bootstrap_admin_user: None,
        bootstrap_admin_password: None,
    }
}

async fn test_app() -> Router {
    let config = Arc::new(test_config());
    let store = Arc::new(MemoryStore::new());
    let auth_service = AuthService::new(store.clone(), config.jwt_secret.clone(), 1).with_hash_cost(4);

    auth_service.ensure_bootstrap_admin("admin", "admin-password").await.unwrap();
    let admin = auth_service.login("admin", "admin-password").await.unwrap().identity;
    for (user_id, role, organization) in [("guest", Role::Guest, "ACME"), ("clerk", Role::Standard, "")] {
        auth_service
            .create_user(
                &admin,
                NewUser {
                    user_id: user_id.to_string(),
                    password: "password123".to_string(),
                    role,
                    organization: organization.to_string(),
                },
            )
            .await
            .unwrap();
    }

    let app_state = Arc::new(AppState {
        dsr_service: DsrService::new(
            store.clone(),
            DsrSettings {
                page_size: config.page_size,
                comment_append_attempts: config.comment_append_attempts,
            },
        ),
        organization_service: OrganizationService::new(store.clone()),
        auth_service,
        config,
    });
    create_router(app_state)
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn login(app: &Router, user_id: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "user_id": user_id, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_is_public() {
    let app = test_app().await;
    let response = app
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_protected_routes_require_a_session() {
    let app = test_app().await;

    let (status, body) = send(&app, "GET", "/api/dsr", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Not authenticated");

    let (status, _) = send(&app, "GET", "/api/auth/me", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let app = test_app().await;
    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "user_id": "clerk", "password": "nope-nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_invalidates_the_token() {
    let app = test_app().await;
    let clerk = login(&app, "clerk", "password123").await;

    let (status, _) = send(&app, "GET", "/api/auth/me", Some(&clerk), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "POST", "/api/auth/logout", Some(&clerk), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/api/auth/me", Some(&clerk), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, "GET", "/api/dsr", Some(&clerk), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_record_lifecycle_over_http() {
    let app = test_app().await;
    let clerk = login(&app, "clerk", "password123").await;
    let guest = login(&app, "guest", "password123").await;
    let admin = login(&app, "admin", "admin-password").await;

    let (status, me) = send(&app, "GET", "/api/auth/me", Some(&guest), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["role"], "Guest");
    assert_eq!(me["organization"], "ACME");

    for (tracking_number, organization) in [("PO100", "ACME"), ("PO200", "ACME"), ("PO300", "Globex")] {
        let (status, _) = send(
            &app,
            "POST",
            "/api/dsr",
            Some(&clerk),
            Some(json!({ "tracking_number": tracking_number, "organization": organization })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, page) = send(&app, "GET", "/api/dsr?page=1&sort_field=tracking_number&sort_direction=asc", Some(&clerk), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 3);
    assert_eq!(page["total_pages"], 2);
    assert_eq!(page["data"].as_array().unwrap().len(), 2);
    assert_eq!(page["data"][0]["tracking_number"], "PO100");

    let (_, guest_page) = send(&app, "GET", "/api/dsr?search=po", Some(&guest), None).await;
    assert_eq!(guest_page["total"], 2);
    assert!(
        guest_page["data"]
            .as_array()
            .unwrap()
            .iter()
            .all(|r| r["organization"] == "ACME")
    );

    let id = page["data"][0]["id"].as_i64().unwrap();
    let (status, record) = send(
        &app,
        "POST",
        &format!("/api/dsr/{id}/comments"),
        Some(&clerk),
        Some(json!({ "comment": "Picked up at dock 4" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["comments"][0]["comment"], "Picked up at dock 4");
    assert_eq!(record["last_updated_by"], "clerk");

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/dsr/{id}/comments"),
        Some(&guest),
        Some(json!({ "comment": "hello" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "DELETE", &format!("/api/dsr/{id}"), Some(&clerk), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, "DELETE", &format!("/api/dsr/{id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "GET", &format!("/api/dsr/{id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, sheet) = send(&app, "GET", "/api/dsr/export", Some(&clerk), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sheet["rows"].as_array().unwrap().len(), 2);
    assert_eq!(sheet["headers"][0], "Tracking ID");
}

#[tokio::test]
async fn test_unknown_sort_field_is_a_bad_request() {
    let app = test_app().await;
    let clerk = login(&app, "clerk", "password123").await;
    let (status, _) = send(&app, "GET", "/api/dsr?sort_field=password", Some(&clerk), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_organization_admin_over_http() {
    let app = test_app().await;
    let admin = login(&app, "admin", "admin-password").await;
    let clerk = login(&app, "clerk", "password123").await;

    let (status, _) = send(&app, "POST", "/api/organizations", Some(&clerk), Some(json!({ "name": "ACME" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, org) = send(&app, "POST", "/api/organizations", Some(&admin), Some(json!({ "name": " ACME " }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(org["name"], "ACME");

    let (status, _) = send(&app, "POST", "/api/organizations", Some(&admin), Some(json!({ "name": "ACME" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, list) = send(&app, "GET", "/api/organizations?search=ac", Some(&clerk), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        "POST",
        "/api/users",
        Some(&clerk),
        Some(json!({ "user_id": "new", "password": "password123", "role": "Guest" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
