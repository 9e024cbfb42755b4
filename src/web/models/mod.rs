use serde::{Deserialize, Serialize};

use crate::db::enums::{Role, SortSpec};
use crate::db::models::UserIdentity;
use crate::services::auth_service::NewUser;
use crate::services::dsr_service::{CreateRecord, ListRequest, UpdateRecord};
use crate::web::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub user_id: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserIdentity,
}

/// Query string of the listing and export endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u64>,
    pub search: Option<String>,
    pub sort_field: Option<String>,
    pub sort_direction: Option<String>,
}

impl ListParams {
    /// Missing parts fall back to the default ordering; unknown names are
    /// rejected rather than ignored.
    pub fn sort_spec(&self) -> Result<SortSpec, AppError> {
        let mut sort = SortSpec::default();
        if let Some(field) = self.sort_field.as_deref().filter(|f| !f.is_empty()) {
            sort.field = field.parse().map_err(AppError::ValidationFailed)?;
        }
        if let Some(direction) = self.sort_direction.as_deref().filter(|d| !d.is_empty()) {
            sort.direction = direction.parse().map_err(AppError::ValidationFailed)?;
        }
        Ok(sort)
    }

    pub fn search_term(&self) -> &str {
        self.search.as_deref().unwrap_or_default()
    }

    pub fn to_list_request(&self, page_size: u64) -> Result<ListRequest, AppError> {
        Ok(ListRequest {
            page: self.page.unwrap_or(1),
            page_size,
            search: self.search_term().to_string(),
            sort: self.sort_spec()?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRecordRequest {
    pub tracking_number: String,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl From<CreateRecordRequest> for CreateRecord {
    fn from(req: CreateRecordRequest) -> Self {
        CreateRecord {
            tracking_number: req.tracking_number,
            organization: req.organization,
            comment: req.comment,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateRecordRequest {
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
}

impl From<UpdateRecordRequest> for UpdateRecord {
    fn from(req: UpdateRecordRequest) -> Self {
        UpdateRecord {
            tracking_number: req.tracking_number,
            organization: req.organization,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AppendCommentRequest {
    pub comment: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrganizationSearchParams {
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrganizationRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub user_id: String,
    pub password: String,
    /// Stored user type string, e.g. `Guest` or `TSV-Admin`.
    pub role: String,
    #[serde(default)]
    pub organization: String,
}

impl From<CreateUserRequest> for NewUser {
    fn from(req: CreateUserRequest) -> Self {
        NewUser {
            user_id: req.user_id,
            password: req.password,
            role: Role::from_user_type(&req.role),
            organization: req.organization,
        }
    }
}
