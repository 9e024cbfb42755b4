use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::{Expr, Func, LikeExpr},
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RuntimeErr, Select, Set,
};

use crate::db::entities::{dsr_tracker, user_org, user_table};
use crate::db::enums::{Role, SortDirection, SortField};
use crate::db::models::{
    CommentLog, NewOrganization, NewRecord, NewUserAccount, Organization, RecordPatch,
    TrackingRecord, UserAccount,
};
use crate::db::store::{
    OrganizationStore, RecordPage, RecordQuery, RecordStore, StoreError, UserStore,
};

/// Store backed by the hosted Postgres schema through sea-orm.
pub struct PostgresStore {
    db: DatabaseConnection,
}

impl PostgresStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    // The hosted schema carries no unique index on org_name or user_id, so
    // uniqueness is checked here before writing.
    async fn ensure_org_name_free(&self, name: &str, except_id: Option<i64>) -> Result<(), StoreError> {
        let mut select = user_org::Entity::find().filter(user_org::Column::OrgName.eq(name));
        if let Some(id) = except_id {
            select = select.filter(user_org::Column::Id.ne(id));
        }
        match select.one(&self.db).await? {
            Some(_) => Err(StoreError::Duplicate(name.to_string())),
            None => Ok(()),
        }
    }
}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        match &err {
            DbErr::RecordNotFound(_) | DbErr::RecordNotUpdated => StoreError::NotFound,
            DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::Database(database_error)))
            | DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::Database(database_error)))
                if database_error.is_unique_violation() =>
            {
                StoreError::Duplicate(database_error.message().to_string())
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Backend(format!("Failed to encode comment log: {err}"))
    }
}

fn sort_column(field: SortField) -> dsr_tracker::Column {
    match field {
        SortField::TrackingNumber => dsr_tracker::Column::PoNumber,
        SortField::CreatedAt => dsr_tracker::Column::CreatedDt,
        SortField::CreatedBy => dsr_tracker::Column::CreatedBy,
        SortField::LastUpdatedAt => dsr_tracker::Column::LastUpdDt,
        SortField::LastUpdatedBy => dsr_tracker::Column::LastUpdBy,
        SortField::Organization => dsr_tracker::Column::UserOrg,
    }
}

/// Escapes LIKE wildcards so a search term only ever matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Filters of a listing query, without ordering or pagination.
fn filtered_select(query: &RecordQuery) -> Select<dsr_tracker::Entity> {
    let mut select = dsr_tracker::Entity::find();

    if let Some(term) = query.search.as_deref() {
        let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
        select = select.filter(
            Expr::expr(Func::lower(Expr::col((
                dsr_tracker::Entity,
                dsr_tracker::Column::PoNumber,
            ))))
            .like(LikeExpr::new(pattern).escape('\\')),
        );
    }

    if let Some(organization) = query.organization.as_deref() {
        select = select.filter(dsr_tracker::Column::UserOrg.eq(organization));
    }

    select
}

/// Full listing statement: filters, ordering, then offset/limit.
pub(crate) fn page_select(query: &RecordQuery) -> Select<dsr_tracker::Entity> {
    let order = match query.sort.direction {
        SortDirection::Asc => Order::Asc,
        SortDirection::Desc => Order::Desc,
    };

    let mut select = filtered_select(query)
        .order_by(sort_column(query.sort.field), order)
        .order_by_asc(dsr_tracker::Column::Id)
        .offset(query.offset);

    if let Some(limit) = query.limit {
        select = select.limit(limit);
    }
    select
}

fn record_from_model(model: dsr_tracker::Model) -> TrackingRecord {
    TrackingRecord {
        id: model.id,
        created_at: model.created_dt,
        tracking_number: model.po_number,
        last_updated_at: model.last_upd_dt,
        last_updated_by: model.last_upd_by,
        created_by: model.created_by,
        organization: model.user_org,
        comments: CommentLog::from_json(&model.comments),
    }
}

fn organization_from_model(model: user_org::Model) -> Organization {
    Organization {
        id: model.id,
        name: model.org_name,
        created_at: model.created_at,
        created_by: model.created_by,
        last_updated_at: model.last_upd,
        last_updated_by: model.last_upd_by,
    }
}

fn account_from_model(model: user_table::Model) -> UserAccount {
    UserAccount {
        id: model.id,
        role: Role::from_user_type(&model.user_type),
        user_id: model.user_id,
        password_hash: model.password,
        organization: model.user_org,
        created_at: model.created_at,
        last_updated_at: model.last_upd,
    }
}

#[async_trait]
impl RecordStore for PostgresStore {
    async fn query(&self, query: &RecordQuery) -> Result<RecordPage, StoreError> {
        let total = filtered_select(query).count(&self.db).await?;
        let models = page_select(query).all(&self.db).await?;
        let records = models.into_iter().map(record_from_model).collect();
        Ok(RecordPage { records, total })
    }

    async fn get(&self, id: i64) -> Result<Option<TrackingRecord>, StoreError> {
        Ok(dsr_tracker::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(record_from_model))
    }

    async fn insert(&self, record: NewRecord) -> Result<TrackingRecord, StoreError> {
        let new_row = dsr_tracker::ActiveModel {
            created_dt: Set(record.created_at),
            po_number: Set(record.tracking_number),
            last_upd_dt: Set(record.created_at),
            last_upd_by: Set(record.created_by.clone()),
            created_by: Set(record.created_by),
            user_org: Set(record.organization),
            comments: Set(record.comments.to_json()?),
            ..Default::default() // id is assigned by the database
        };
        Ok(record_from_model(new_row.insert(&self.db).await?))
    }

    async fn update(
        &self,
        id: i64,
        patch: RecordPatch,
        expected_last_updated_at: Option<DateTime<Utc>>,
    ) -> Result<TrackingRecord, StoreError> {
        let mut statement = dsr_tracker::Entity::update_many()
            .col_expr(dsr_tracker::Column::LastUpdDt, Expr::value(patch.last_updated_at))
            .col_expr(dsr_tracker::Column::LastUpdBy, Expr::value(patch.last_updated_by))
            .filter(dsr_tracker::Column::Id.eq(id));

        if let Some(tracking_number) = patch.tracking_number {
            statement = statement.col_expr(dsr_tracker::Column::PoNumber, Expr::value(tracking_number));
        }
        if let Some(organization) = patch.organization {
            statement = statement.col_expr(dsr_tracker::Column::UserOrg, Expr::value(organization));
        }
        if let Some(comments) = patch.comments {
            statement = statement.col_expr(dsr_tracker::Column::Comments, Expr::value(comments.to_json()?));
        }
        if let Some(expected) = expected_last_updated_at {
            statement = statement.filter(dsr_tracker::Column::LastUpdDt.eq(expected));
        }

        let result = statement.exec(&self.db).await?;
        if result.rows_affected == 0 {
            // Either the row is gone or the guard did not match.
            return match self.get(id).await? {
                Some(_) => Err(StoreError::Conflict),
                None => Err(StoreError::NotFound),
            };
        }

        self.get(id).await?.ok_or(StoreError::NotFound)
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let result = dsr_tracker::Entity::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl OrganizationStore for PostgresStore {
    async fn list(&self) -> Result<Vec<Organization>, StoreError> {
        let models = user_org::Entity::find()
            .order_by_desc(user_org::Column::CreatedAt)
            .order_by_desc(user_org::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(organization_from_model).collect())
    }

    async fn insert(&self, organization: NewOrganization) -> Result<Organization, StoreError> {
        self.ensure_org_name_free(&organization.name, None).await?;
        let new_row = user_org::ActiveModel {
            org_name: Set(organization.name),
            created_at: Set(organization.created_at),
            created_by: Set(organization.created_by.clone()),
            last_upd: Set(organization.created_at),
            last_upd_by: Set(organization.created_by),
            ..Default::default()
        };
        Ok(organization_from_model(new_row.insert(&self.db).await?))
    }

    async fn rename(
        &self,
        id: i64,
        name: String,
        updated_by: String,
        updated_at: DateTime<Utc>,
    ) -> Result<Organization, StoreError> {
        self.ensure_org_name_free(&name, Some(id)).await?;
        let mut row: user_org::ActiveModel = user_org::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(StoreError::NotFound)?
            .into();

        row.org_name = Set(name);
        row.last_upd = Set(updated_at);
        row.last_upd_by = Set(updated_by);
        Ok(organization_from_model(row.update(&self.db).await?))
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let result = user_org::Entity::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<UserAccount>, StoreError> {
        let model = user_table::Entity::find()
            .filter(user_table::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?;
        Ok(model.map(account_from_model))
    }

    async fn insert(&self, account: NewUserAccount) -> Result<UserAccount, StoreError> {
        if self.find_by_user_id(&account.user_id).await?.is_some() {
            return Err(StoreError::Duplicate(account.user_id));
        }
        let new_row = user_table::ActiveModel {
            created_at: Set(account.created_at),
            last_upd: Set(account.created_at),
            user_id: Set(account.user_id),
            password: Set(account.password_hash),
            user_type: Set(account.role.as_user_type().to_string()),
            user_org: Set(account.organization),
            ..Default::default()
        };
        Ok(account_from_model(new_row.insert(&self.db).await?))
    }
}
