use axum::{
    Json, Router,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};
use std::sync::Arc;

use crate::db::models::{Organization, UserIdentity};
use crate::web::models::{OrganizationRequest, OrganizationSearchParams};
use crate::web::{AppError, AppState};

pub fn create_organization_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            get(list_organizations_handler).post(create_organization_handler),
        )
        .route(
            "/{id}",
            put(rename_organization_handler).delete(delete_organization_handler),
        )
}

async fn list_organizations_handler(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<OrganizationSearchParams>,
) -> Result<Json<Vec<Organization>>, AppError> {
    let organizations = app_state
        .organization_service
        .list_organizations(params.search.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(organizations))
}

async fn create_organization_handler(
    Extension(identity): Extension<UserIdentity>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<OrganizationRequest>,
) -> Result<(StatusCode, Json<Organization>), AppError> {
    let organization = app_state
        .organization_service
        .create_organization(&identity, &payload.name)
        .await?;
    Ok((StatusCode::CREATED, Json(organization)))
}

async fn rename_organization_handler(
    Extension(identity): Extension<UserIdentity>,
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<OrganizationRequest>,
) -> Result<Json<Organization>, AppError> {
    let organization = app_state
        .organization_service
        .rename_organization(&identity, id, &payload.name)
        .await?;
    Ok(Json(organization))
}

async fn delete_organization_handler(
    Extension(identity): Extension<UserIdentity>,
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    app_state
        .organization_service
        .delete_organization(&identity, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
