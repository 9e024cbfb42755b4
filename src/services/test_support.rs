//! Test doubles shared by the service tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::db::enums::Role;
use crate::db::memory_store::MemoryStore;
use crate::db::models::{
    Comment, CommentLog, NewRecord, RecordPatch, TrackingRecord, UserIdentity,
};
use crate::db::store::{RecordPage, RecordQuery, RecordStore, StoreError};

pub fn identity(user_id: &str, role: Role, organization: &str) -> UserIdentity {
    UserIdentity {
        user_id: user_id.to_string(),
        role,
        organization: organization.to_string(),
    }
}

pub fn seed_time(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
}

/// Wraps a `MemoryStore`, counting calls and optionally injecting failures
/// or a competing writer.
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    calls: AtomicUsize,
    competing_appends: AtomicUsize,
    update_failure: Mutex<Option<StoreError>>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }

    /// Makes the next `count` updates race with another user appending a
    /// comment to the same record just before the write lands.
    pub fn interleave_competing_appends(&self, count: usize) {
        self.competing_appends.store(count, Ordering::SeqCst);
    }

    pub fn fail_updates_with(&self, error: StoreError) {
        *self.update_failure.lock().unwrap() = Some(error);
    }

    pub async fn seed(&self, tracking_number: &str, organization: &str, minutes: i64) -> TrackingRecord {
        self.inner
            .insert(NewRecord {
                tracking_number: tracking_number.to_string(),
                organization: organization.to_string(),
                created_by: "seed".to_string(),
                created_at: seed_time(minutes),
                comments: CommentLog::new(),
            })
            .await
            .unwrap()
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for CountingStore {
    async fn query(&self, query: &RecordQuery) -> Result<RecordPage, StoreError> {
        self.hit();
        self.inner.query(query).await
    }

    async fn get(&self, id: i64) -> Result<Option<TrackingRecord>, StoreError> {
        self.hit();
        self.inner.get(id).await
    }

    async fn insert(&self, record: NewRecord) -> Result<TrackingRecord, StoreError> {
        self.hit();
        self.inner.insert(record).await
    }

    async fn update(
        &self,
        id: i64,
        patch: RecordPatch,
        expected_last_updated_at: Option<DateTime<Utc>>,
    ) -> Result<TrackingRecord, StoreError> {
        self.hit();
        if let Some(error) = self.update_failure.lock().unwrap().clone() {
            return Err(error);
        }

        let competing = self
            .competing_appends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if competing {
            let current = self.inner.get(id).await?.ok_or(StoreError::NotFound)?;
            let at = current.last_updated_at + Duration::seconds(1);
            let comments = current.comments.appended(Comment {
                date: at,
                user: "rival".to_string(),
                comment: "concurrent note".to_string(),
            });
            let rival_patch = RecordPatch {
                comments: Some(comments),
                ..RecordPatch::touch(at, "rival")
            };
            self.inner.update(id, rival_patch, None).await?;
        }

        self.inner.update(id, patch, expected_last_updated_at).await
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.hit();
        self.inner.delete(id).await
    }
}
