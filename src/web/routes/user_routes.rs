use axum::{
    Json, Router,
    extract::{Extension, State},
    http::StatusCode,
    routing::post,
};
use std::sync::Arc;

use crate::db::models::UserIdentity;
use crate::web::models::CreateUserRequest;
use crate::web::{AppError, AppState};

pub fn create_user_router() -> Router<Arc<AppState>> {
    Router::new().route("/", post(create_user_handler))
}

async fn create_user_handler(
    Extension(identity): Extension<UserIdentity>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserIdentity>), AppError> {
    let created = app_state
        .auth_service
        .create_user(&identity, payload.into())
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}
