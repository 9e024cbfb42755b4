use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One Daily Status Report row. `comments` holds the serialized comment log.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "dsr_tracker")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub created_dt: ChronoDateTimeUtc,
    pub po_number: String,
    pub last_upd_dt: ChronoDateTimeUtc,
    pub last_upd_by: String,
    pub created_by: String,
    pub user_org: String,
    pub comments: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
