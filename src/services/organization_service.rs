use std::sync::Arc;
use tracing::info;

use crate::db::models::{NewOrganization, Organization, UserIdentity};
use crate::db::store::OrganizationStore;
use crate::services::access_policy::require_admin;
use crate::services::timestamp_now;
use crate::web::error::AppError;

#[derive(Clone)]
pub struct OrganizationService {
    organizations: Arc<dyn OrganizationStore>,
}

fn validated_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::ValidationFailed(
            "Organization name must not be empty.".to_string(),
        ));
    }
    Ok(name.to_string())
}

impl OrganizationService {
    pub fn new(organizations: Arc<dyn OrganizationStore>) -> Self {
        Self { organizations }
    }

    /// Newest first, optionally narrowed to names containing `search`
    /// (case-insensitive).
    pub async fn list_organizations(&self, search: &str) -> Result<Vec<Organization>, AppError> {
        let needle = search.trim().to_lowercase();
        let organizations = self.organizations.list().await?;
        if needle.is_empty() {
            return Ok(organizations);
        }
        Ok(organizations
            .into_iter()
            .filter(|org| org.name.to_lowercase().contains(&needle))
            .collect())
    }

    pub async fn create_organization(
        &self,
        identity: &UserIdentity,
        name: &str,
    ) -> Result<Organization, AppError> {
        require_admin(identity, "manage organizations")?;
        let name = validated_name(name)?;

        let organization = self
            .organizations
            .insert(NewOrganization {
                name,
                created_by: identity.user_id.clone(),
                created_at: timestamp_now(),
            })
            .await?;

        info!(organization_id = organization.id, name = %organization.name, "Organization created.");
        Ok(organization)
    }

    pub async fn rename_organization(
        &self,
        identity: &UserIdentity,
        id: i64,
        name: &str,
    ) -> Result<Organization, AppError> {
        require_admin(identity, "manage organizations")?;
        let name = validated_name(name)?;

        let organization = self
            .organizations
            .rename(id, name, identity.user_id.clone(), timestamp_now())
            .await?;

        info!(organization_id = id, name = %organization.name, "Organization renamed.");
        Ok(organization)
    }

    pub async fn delete_organization(&self, identity: &UserIdentity, id: i64) -> Result<(), AppError> {
        require_admin(identity, "manage organizations")?;

        self.organizations.delete(id).await?;
        info!(organization_id = id, "Organization deleted.");
        Ok(())
    }
}
