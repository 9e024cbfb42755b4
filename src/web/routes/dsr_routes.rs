use axum::{
    Json, Router,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use std::sync::Arc;

use crate::db::models::{TrackingRecord, UserIdentity};
use crate::services::dsr_service::ListPage;
use crate::services::export_service::{ExportSheet, build_export_sheet};
use crate::web::models::{
    AppendCommentRequest, CreateRecordRequest, ListParams, UpdateRecordRequest,
};
use crate::web::{AppError, AppState};

pub fn create_dsr_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_records_handler).post(create_record_handler))
        .route("/export", get(export_records_handler))
        .route(
            "/{id}",
            get(get_record_handler)
                .put(update_record_handler)
                .delete(delete_record_handler),
        )
        .route("/{id}/comments", post(append_comment_handler))
}

async fn list_records_handler(
    Extension(identity): Extension<UserIdentity>,
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListPage>, AppError> {
    let request = params.to_list_request(app_state.dsr_service.page_size())?;
    let page = app_state.dsr_service.list_for(&identity, &request).await?;
    Ok(Json(page))
}

async fn export_records_handler(
    Extension(identity): Extension<UserIdentity>,
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<ExportSheet>, AppError> {
    let records = app_state
        .dsr_service
        .export_records(&identity, params.search_term(), params.sort_spec()?)
        .await?;
    Ok(Json(build_export_sheet(&records)))
}

async fn get_record_handler(
    Extension(identity): Extension<UserIdentity>,
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<TrackingRecord>, AppError> {
    let record = app_state.dsr_service.get_record(&identity, id).await?;
    Ok(Json(record))
}

async fn create_record_handler(
    Extension(identity): Extension<UserIdentity>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CreateRecordRequest>,
) -> Result<(StatusCode, Json<TrackingRecord>), AppError> {
    let record = app_state
        .dsr_service
        .create_record(&identity, payload.into())
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn update_record_handler(
    Extension(identity): Extension<UserIdentity>,
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateRecordRequest>,
) -> Result<Json<TrackingRecord>, AppError> {
    let record = app_state
        .dsr_service
        .update_record(&identity, id, payload.into())
        .await?;
    Ok(Json(record))
}

async fn delete_record_handler(
    Extension(identity): Extension<UserIdentity>,
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    app_state.dsr_service.delete_record(&identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn append_comment_handler(
    Extension(identity): Extension<UserIdentity>,
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<AppendCommentRequest>,
) -> Result<Json<TrackingRecord>, AppError> {
    let record = app_state
        .dsr_service
        .append_comment(&identity, id, &payload.comment)
        .await?;
    Ok(Json(record))
}
