//! Role checks and the organization visibility rule.
//!
//! Every check here runs before any store call, so a rejected caller never
//! causes a round trip.

use tracing::warn;

use crate::db::enums::Role;
use crate::db::models::{TrackingRecord, UserIdentity};
use crate::web::error::AppError;

/// Extra equality constraint on `organization` applied to every listing.
///
/// Guests only see their own organization's records. A guest without an
/// organization, and every other role, sees everything.
pub fn visibility_filter(role: Role, organization: &str) -> Option<String> {
    match role {
        Role::Guest if !organization.is_empty() => Some(organization.to_string()),
        Role::Guest | Role::Standard | Role::Admin => None,
    }
}

pub fn visibility_for(identity: &UserIdentity) -> Option<String> {
    visibility_filter(identity.role, &identity.organization)
}

pub fn can_view(identity: &UserIdentity, record: &TrackingRecord) -> bool {
    match visibility_for(identity) {
        Some(organization) => record.organization == organization,
        None => true,
    }
}

/// Creating, editing and commenting need any role above guest.
pub fn require_writer(identity: &UserIdentity, action: &str) -> Result<(), AppError> {
    match identity.role {
        Role::Standard | Role::Admin => Ok(()),
        Role::Guest => {
            warn!(user_id = %identity.user_id, action, "Guest attempted a write.");
            Err(AppError::PermissionDenied(format!(
                "Guest users are not allowed to {action}."
            )))
        }
    }
}

pub fn require_admin(identity: &UserIdentity, action: &str) -> Result<(), AppError> {
    match identity.role {
        Role::Admin => Ok(()),
        Role::Guest | Role::Standard => {
            warn!(user_id = %identity.user_id, role = %identity.role, action, "Non-admin attempted an admin action.");
            Err(AppError::PermissionDenied(format!(
                "Only administrators are allowed to {action}."
            )))
        }
    }
}
