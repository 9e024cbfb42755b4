use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::enums::SortSpec;
use crate::db::models::{
    Comment, CommentLog, NewRecord, RecordPatch, TrackingRecord, UserIdentity,
};
use crate::db::store::{RecordQuery, RecordStore, StoreError};
use crate::services::access_policy::{can_view, require_admin, require_writer, visibility_for};
use crate::services::list_view::{ListView, total_pages};
use crate::services::timestamp_now;
use crate::web::error::AppError;

/// Parameters of one listing request. `page` is 1-indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub page: u64,
    pub page_size: u64,
    pub search: String,
    pub sort: SortSpec,
}

impl From<&ListView> for ListRequest {
    fn from(view: &ListView) -> Self {
        Self {
            page: view.page,
            page_size: view.page_size,
            search: view.search.clone(),
            sort: view.sort,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListPage {
    pub data: Vec<TrackingRecord>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, Default)]
pub struct CreateRecord {
    pub tracking_number: String,
    /// Defaults to the creator's organization.
    pub organization: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateRecord {
    pub tracking_number: Option<String>,
    pub organization: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct DsrSettings {
    pub page_size: u64,
    /// Total tries of a comment append when the record keeps changing under it.
    pub comment_append_attempts: u32,
}

const MAX_WINDOW: u64 = i64::MAX as u64;

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Builds the store query for a listing: search, visibility, ordering and
/// the offset/limit window of the requested page.
pub fn compose_query(
    request: &ListRequest,
    visibility: Option<String>,
) -> Result<RecordQuery, AppError> {
    if request.page == 0 {
        return Err(AppError::ValidationFailed("Page numbers start at 1.".to_string()));
    }
    if request.page_size == 0 {
        return Err(AppError::ValidationFailed(
            "Page size must be a positive number.".to_string(),
        ));
    }
    // Stores take a signed 64-bit window; pages past it are simply empty
    let offset = (request.page - 1)
        .saturating_mul(request.page_size)
        .min(MAX_WINDOW);

    Ok(RecordQuery {
        search: non_empty(Some(request.search.as_str())),
        organization: visibility,
        sort: request.sort,
        offset,
        limit: Some(request.page_size.min(MAX_WINDOW)),
    })
}

/// Record listing, lifecycle and comment operations over a `RecordStore`.
#[derive(Clone)]
pub struct DsrService {
    records: Arc<dyn RecordStore>,
    settings: DsrSettings,
}

impl DsrService {
    pub fn new(records: Arc<dyn RecordStore>, settings: DsrSettings) -> Self {
        Self { records, settings }
    }

    pub fn page_size(&self) -> u64 {
        self.settings.page_size
    }

    pub async fn list_records(
        &self,
        request: &ListRequest,
        visibility: Option<String>,
    ) -> Result<ListPage, AppError> {
        let query = compose_query(request, visibility)?;
        let page = self.records.query(&query).await?;

        Ok(ListPage {
            data: page.records,
            total: page.total,
            page: request.page,
            page_size: request.page_size,
            total_pages: total_pages(page.total, request.page_size),
        })
    }

    /// Lists records on behalf of `identity`, applying its visibility.
    pub async fn list_for(
        &self,
        identity: &UserIdentity,
        request: &ListRequest,
    ) -> Result<ListPage, AppError> {
        self.list_records(request, visibility_for(identity)).await
    }

    /// Every record matching the current search and visibility, in display
    /// order, without pagination.
    pub async fn export_records(
        &self,
        identity: &UserIdentity,
        search: &str,
        sort: SortSpec,
    ) -> Result<Vec<TrackingRecord>, AppError> {
        let query = RecordQuery {
            search: non_empty(Some(search)),
            organization: visibility_for(identity),
            sort,
            offset: 0,
            limit: None,
        };
        Ok(self.records.query(&query).await?.records)
    }

    pub async fn get_record(
        &self,
        identity: &UserIdentity,
        id: i64,
    ) -> Result<TrackingRecord, AppError> {
        self.records
            .get(id)
            .await?
            .filter(|record| can_view(identity, record))
            .ok_or_else(|| AppError::NotFound(format!("DSR {id} not found")))
    }

    pub async fn create_record(
        &self,
        identity: &UserIdentity,
        request: CreateRecord,
    ) -> Result<TrackingRecord, AppError> {
        require_writer(identity, "create DSRs")?;

        let tracking_number = non_empty(Some(request.tracking_number.as_str())).ok_or_else(|| {
            AppError::ValidationFailed("Tracking number must not be empty.".to_string())
        })?;
        let organization = non_empty(request.organization.as_deref())
            .unwrap_or_else(|| identity.organization.clone());

        let now = timestamp_now();
        let mut comments = CommentLog::new();
        if let Some(text) = non_empty(request.comment.as_deref()) {
            comments.push(Comment {
                date: now,
                user: identity.user_id.clone(),
                comment: text,
            });
        }

        let record = self
            .records
            .insert(NewRecord {
                tracking_number,
                organization,
                created_by: identity.user_id.clone(),
                created_at: now,
                comments,
            })
            .await?;

        info!(record_id = record.id, user_id = %identity.user_id, "DSR created.");
        Ok(record)
    }

    pub async fn update_record(
        &self,
        identity: &UserIdentity,
        id: i64,
        request: UpdateRecord,
    ) -> Result<TrackingRecord, AppError> {
        require_writer(identity, "update DSRs")?;

        let tracking_number = required_if_given(request.tracking_number.as_deref(), "Tracking number")?;
        let organization = required_if_given(request.organization.as_deref(), "Organization")?;

        let patch = RecordPatch {
            tracking_number,
            organization,
            ..RecordPatch::touch(timestamp_now(), identity.user_id.clone())
        };
        let record = self.records.update(id, patch, None).await?;

        info!(record_id = id, user_id = %identity.user_id, "DSR updated.");
        Ok(record)
    }

    pub async fn delete_record(&self, identity: &UserIdentity, id: i64) -> Result<(), AppError> {
        require_admin(identity, "delete DSRs")?;

        self.records.delete(id).await?;
        info!(record_id = id, user_id = %identity.user_id, "DSR deleted.");
        Ok(())
    }

    /// Appends a comment to record `id`, reading its current state first.
    pub async fn append_comment(
        &self,
        identity: &UserIdentity,
        id: i64,
        text: &str,
    ) -> Result<TrackingRecord, AppError> {
        require_writer(identity, "update DSRs")?;
        validate_comment(text)?;

        let snapshot = self.get_record(identity, id).await?;
        self.append_from_snapshot(identity, snapshot, text).await
    }

    /// Appends a comment starting from an already loaded copy of the record.
    /// A stale copy costs one extra round trip; it never loses comments.
    pub async fn append_comment_to(
        &self,
        identity: &UserIdentity,
        snapshot: TrackingRecord,
        text: &str,
    ) -> Result<TrackingRecord, AppError> {
        require_writer(identity, "update DSRs")?;
        validate_comment(text)?;

        self.append_from_snapshot(identity, snapshot, text).await
    }

    // The write is conditioned on the `last_updated_at` that was read. A
    // conflict means someone else wrote in between, so the log is re-read
    // and the same comment re-applied on top of it.
    async fn append_from_snapshot(
        &self,
        identity: &UserIdentity,
        mut snapshot: TrackingRecord,
        text: &str,
    ) -> Result<TrackingRecord, AppError> {
        let attempts = self.settings.comment_append_attempts.max(1);
        let record_id = snapshot.id;

        for attempt in 1..=attempts {
            let now = append_time(&snapshot);
            let comments = snapshot.comments.appended(Comment {
                date: now,
                user: identity.user_id.clone(),
                comment: text.to_string(),
            });
            let patch = RecordPatch {
                comments: Some(comments),
                ..RecordPatch::touch(now, identity.user_id.clone())
            };

            match self
                .records
                .update(record_id, patch, Some(snapshot.last_updated_at))
                .await
            {
                Ok(updated) => {
                    info!(
                        record_id = updated.id,
                        user_id = %identity.user_id,
                        comments = updated.comments.len(),
                        "Comment appended to DSR."
                    );
                    return Ok(updated);
                }
                Err(StoreError::Conflict) if attempt < attempts => {
                    warn!(record_id, attempt, "DSR changed during comment append, retrying.");
                    snapshot = self
                        .records
                        .get(record_id)
                        .await?
                        .ok_or_else(|| AppError::NotFound(format!("DSR {record_id} not found")))?;
                }
                Err(err) => {
                    warn!(record_id, error = %err, "Comment append failed.");
                    return Err(err.into());
                }
            }
        }

        Err(StoreError::Conflict.into())
    }
}

/// Time stamp for a new comment on `snapshot`: never earlier than any entry
/// already in its log, and strictly after its `last_updated_at`.
fn append_time(snapshot: &TrackingRecord) -> DateTime<Utc> {
    let after_last_write = snapshot.last_updated_at + Duration::microseconds(1);
    let floor = timestamp_now().max(after_last_write);

    snapshot
        .comments
        .entries()
        .iter()
        .map(|c| c.date)
        .fold(floor, Ord::max)
}

// `None` leaves the field alone; a given but blank value is an error.
fn required_if_given(value: Option<&str>, field: &str) -> Result<Option<String>, AppError> {
    match value {
        Some(raw) => non_empty(Some(raw))
            .map(Some)
            .ok_or_else(|| AppError::ValidationFailed(format!("{field} must not be empty."))),
        None => Ok(None),
    }
}

fn validate_comment(text: &str) -> Result<(), AppError> {
    if text.trim().is_empty() {
        return Err(AppError::ValidationFailed(
            "Comment must not be empty.".to_string(),
        ));
    }
    Ok(())
}
