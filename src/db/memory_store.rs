//! In-memory storage backend for tests and local development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::db::enums::{SortDirection, SortField, SortSpec};
use crate::db::models::{
    NewOrganization, NewRecord, NewUserAccount, Organization, RecordPatch, TrackingRecord,
    UserAccount,
};
use crate::db::store::{
    OrganizationStore, RecordPage, RecordQuery, RecordStore, StoreError, UserStore,
};

/// Keeps every table in process memory. Rows are keyed by id, so iteration
/// order is insertion order and doubles as the natural order for sort ties.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<MemoryTables>>,
}

#[derive(Default)]
struct MemoryTables {
    records: BTreeMap<i64, TrackingRecord>,
    organizations: BTreeMap<i64, Organization>,
    users: BTreeMap<i64, UserAccount>,
    next_record_id: i64,
    next_organization_id: i64,
    next_user_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

fn compare_by(field: SortField, a: &TrackingRecord, b: &TrackingRecord) -> Ordering {
    match field {
        SortField::TrackingNumber => a.tracking_number.cmp(&b.tracking_number),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::CreatedBy => a.created_by.cmp(&b.created_by),
        SortField::LastUpdatedAt => a.last_updated_at.cmp(&b.last_updated_at),
        SortField::LastUpdatedBy => a.last_updated_by.cmp(&b.last_updated_by),
        SortField::Organization => a.organization.cmp(&b.organization),
    }
}

fn matches(query: &RecordQuery, record: &TrackingRecord) -> bool {
    let search_ok = match query.search.as_deref() {
        Some(term) => record
            .tracking_number
            .to_lowercase()
            .contains(&term.to_lowercase()),
        None => true,
    };
    let organization_ok = match query.organization.as_deref() {
        Some(org) => record.organization == org,
        None => true,
    };
    search_ok && organization_ok
}

fn sort_records(records: &mut [TrackingRecord], sort: SortSpec) {
    // sort_by is stable, so ties keep id order
    records.sort_by(|a, b| {
        let ordering = compare_by(sort.field, a, b);
        match sort.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn query(&self, query: &RecordQuery) -> Result<RecordPage, StoreError> {
        let tables = self.data.read().await;
        let mut matching: Vec<TrackingRecord> = tables
            .records
            .values()
            .filter(|record| matches(query, record))
            .cloned()
            .collect();
        let total = matching.len() as u64;

        sort_records(&mut matching, query.sort);

        let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
        let records = match query.limit {
            Some(limit) => matching
                .into_iter()
                .skip(offset)
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .collect(),
            None => matching.into_iter().skip(offset).collect(),
        };

        Ok(RecordPage { records, total })
    }

    async fn get(&self, id: i64) -> Result<Option<TrackingRecord>, StoreError> {
        Ok(self.data.read().await.records.get(&id).cloned())
    }

    async fn insert(&self, record: NewRecord) -> Result<TrackingRecord, StoreError> {
        let mut tables = self.data.write().await;
        let id = next_id(&mut tables.next_record_id);
        let stored = TrackingRecord {
            id,
            created_at: record.created_at,
            tracking_number: record.tracking_number,
            last_updated_at: record.created_at,
            last_updated_by: record.created_by.clone(),
            created_by: record.created_by,
            organization: record.organization,
            comments: record.comments,
        };
        tables.records.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update(
        &self,
        id: i64,
        patch: RecordPatch,
        expected_last_updated_at: Option<DateTime<Utc>>,
    ) -> Result<TrackingRecord, StoreError> {
        let mut tables = self.data.write().await;
        let record = tables.records.get_mut(&id).ok_or(StoreError::NotFound)?;

        if let Some(expected) = expected_last_updated_at {
            if record.last_updated_at != expected {
                return Err(StoreError::Conflict);
            }
        }

        if let Some(tracking_number) = patch.tracking_number {
            record.tracking_number = tracking_number;
        }
        if let Some(organization) = patch.organization {
            record.organization = organization;
        }
        if let Some(comments) = patch.comments {
            record.comments = comments;
        }
        record.last_updated_at = patch.last_updated_at;
        record.last_updated_by = patch.last_updated_by;

        Ok(record.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.data
            .write()
            .await
            .records
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl OrganizationStore for MemoryStore {
    async fn list(&self) -> Result<Vec<Organization>, StoreError> {
        let tables = self.data.read().await;
        let mut organizations: Vec<Organization> =
            tables.organizations.values().cloned().collect();
        organizations.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(organizations)
    }

    async fn insert(&self, organization: NewOrganization) -> Result<Organization, StoreError> {
        let mut tables = self.data.write().await;
        if tables
            .organizations
            .values()
            .any(|existing| existing.name == organization.name)
        {
            return Err(StoreError::Duplicate(organization.name));
        }
        let id = next_id(&mut tables.next_organization_id);
        let stored = Organization {
            id,
            name: organization.name,
            created_at: organization.created_at,
            created_by: organization.created_by.clone(),
            last_updated_at: organization.created_at,
            last_updated_by: organization.created_by,
        };
        tables.organizations.insert(id, stored.clone());
        Ok(stored)
    }

    async fn rename(
        &self,
        id: i64,
        name: String,
        updated_by: String,
        updated_at: DateTime<Utc>,
    ) -> Result<Organization, StoreError> {
        let mut tables = self.data.write().await;
        if tables
            .organizations
            .values()
            .any(|existing| existing.id != id && existing.name == name)
        {
            return Err(StoreError::Duplicate(name));
        }
        let organization = tables
            .organizations
            .get_mut(&id)
            .ok_or(StoreError::NotFound)?;
        organization.name = name;
        organization.last_updated_by = updated_by;
        organization.last_updated_at = updated_at;
        Ok(organization.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.data
            .write()
            .await
            .organizations
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<UserAccount>, StoreError> {
        let tables = self.data.read().await;
        Ok(tables
            .users
            .values()
            .find(|account| account.user_id == user_id)
            .cloned())
    }

    async fn insert(&self, account: NewUserAccount) -> Result<UserAccount, StoreError> {
        let mut tables = self.data.write().await;
        if tables
            .users
            .values()
            .any(|existing| existing.user_id == account.user_id)
        {
            return Err(StoreError::Duplicate(account.user_id));
        }
        let id = next_id(&mut tables.next_user_id);
        let stored = UserAccount {
            id,
            user_id: account.user_id,
            password_hash: account.password_hash,
            role: account.role,
            organization: account.organization,
            created_at: account.created_at,
            last_updated_at: account.created_at,
        };
        tables.users.insert(id, stored.clone());
        Ok(stored)
    }
}
