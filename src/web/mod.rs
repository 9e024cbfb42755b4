use axum::{
    Extension, Json, Router,
    extract::State,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use crate::db::models::UserIdentity;
use crate::server::config::AppConfig;
use crate::services::auth_service::{AuthService, Session};
use crate::services::dsr_service::DsrService;
use crate::services::organization_service::OrganizationService;
use crate::web::{
    middleware::auth::{self, SESSION_COOKIE},
    models::{LoginRequest, LoginResponse},
    routes::*,
};

pub use crate::web::error::AppError;

pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub dsr_service: DsrService,
    pub organization_service: OrganizationService,
    pub auth_service: AuthService,
    pub config: Arc<AppConfig>,
}

fn session_cookie(value: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(true)
        .build()
}

fn with_cookie(response: impl IntoResponse, cookie: Cookie<'static>) -> Result<axum::response::Response, AppError> {
    let mut response = response.into_response();
    let value = cookie
        .to_string()
        .parse::<HeaderValue>()
        .map_err(|e| AppError::InternalServerError(format!("Invalid session cookie: {e}")))?;
    response.headers_mut().insert(header::SET_COOKIE, value);
    Ok(response)
}

async fn login_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = app_state
        .auth_service
        .login(&payload.user_id, &payload.password)
        .await?;

    let cookie = session_cookie(outcome.token.clone());
    with_cookie(
        Json(LoginResponse {
            token: outcome.token,
            user: outcome.identity,
        }),
        cookie,
    )
}

async fn logout_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, AppError> {
    app_state.auth_service.logout(&session).await;
    let mut cookie = session_cookie(String::new());
    cookie.make_removal();
    with_cookie(Json(serde_json::json!({ "message": "Logged out" })), cookie)
}

async fn me_handler(Extension(identity): Extension<UserIdentity>) -> Json<UserIdentity> {
    Json(identity)
}

async fn health_check_handler() -> &'static str {
    "OK"
}

fn cors_layer(frontend_url: Option<&str>) -> CorsLayer {
    let origin = match frontend_url.map(HeaderValue::from_str) {
        Some(Ok(origin)) => AllowOrigin::exact(origin),
        Some(Err(e)) => {
            warn!(error = %e, "FRONTEND_URL is not a valid origin, allowing any origin.");
            AllowOrigin::from(Any)
        }
        None => AllowOrigin::from(Any),
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(vec![Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = cors_layer(app_state.config.frontend_url.as_deref());
    let auth_state = app_state.clone();
    let require_auth = move || axum_middleware::from_fn_with_state(auth_state.clone(), auth::auth);

    Router::new()
        .route("/api/health", get(health_check_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/logout", post(logout_handler).route_layer(require_auth()))
        .route("/api/auth/me", get(me_handler).route_layer(require_auth()))
        .nest(
            "/api/dsr",
            dsr_routes::create_dsr_router().route_layer(require_auth()),
        )
        .nest(
            "/api/organizations",
            organization_routes::create_organization_router().route_layer(require_auth()),
        )
        .nest(
            "/api/users",
            user_routes::create_user_router().route_layer(require_auth()),
        )
        .with_state(app_state)
        .layer(cors)
}
