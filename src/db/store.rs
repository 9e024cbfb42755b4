//! Storage seams. Everything persistent goes through these traits so the
//! services above them do not care whether rows live in Postgres or in memory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::enums::SortSpec;
use crate::db::models::{
    NewOrganization, NewRecord, NewUserAccount, Organization, RecordPatch, TrackingRecord,
    UserAccount,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Record not found")]
    NotFound,
    #[error("Record was modified concurrently")]
    Conflict,
    #[error("Duplicate value: {0}")]
    Duplicate(String),
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// A fully composed listing query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    /// Case-insensitive substring matched against the tracking number.
    pub search: Option<String>,
    /// Equality constraint on the owning organization.
    pub organization: Option<String>,
    pub sort: SortSpec,
    pub offset: u64,
    /// `None` returns every matching row from `offset` on.
    pub limit: Option<u64>,
}

/// One slice of a listing plus the number of rows matching the filters
/// before pagination.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPage {
    pub records: Vec<TrackingRecord>,
    pub total: u64,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn query(&self, query: &RecordQuery) -> Result<RecordPage, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<TrackingRecord>, StoreError>;

    async fn insert(&self, record: NewRecord) -> Result<TrackingRecord, StoreError>;

    /// Applies `patch` to record `id`.
    ///
    /// When `expected_last_updated_at` is set the write only happens if the
    /// stored `last_updated_at` still equals it; otherwise `StoreError::Conflict`
    /// is returned and nothing changes.
    async fn update(
        &self,
        id: i64,
        patch: RecordPatch,
        expected_last_updated_at: Option<DateTime<Utc>>,
    ) -> Result<TrackingRecord, StoreError>;

    async fn delete(&self, id: i64) -> Result<(), StoreError>;
}

#[async_trait]
pub trait OrganizationStore: Send + Sync {
    /// All organizations, newest first.
    async fn list(&self) -> Result<Vec<Organization>, StoreError>;

    async fn insert(&self, organization: NewOrganization) -> Result<Organization, StoreError>;

    async fn rename(
        &self,
        id: i64,
        name: String,
        updated_by: String,
        updated_at: DateTime<Utc>,
    ) -> Result<Organization, StoreError>;

    async fn delete(&self, id: i64) -> Result<(), StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<UserAccount>, StoreError>;

    async fn insert(&self, account: NewUserAccount) -> Result<UserAccount, StoreError>;
}
