use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Access level of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Guest,
    Standard,
    Admin,
}

impl Role {
    /// Maps the free-form `user_type` column onto a role. Unknown values are
    /// treated as standard users, matching how the dashboard has always behaved.
    pub fn from_user_type(user_type: &str) -> Self {
        match user_type.trim() {
            "Guest" => Role::Guest,
            "TSV-Admin" | "admin" | "Admin" => Role::Admin,
            _ => Role::Standard,
        }
    }

    /// Value written to the `user_type` column.
    pub fn as_user_type(&self) -> &'static str {
        match self {
            Role::Guest => "Guest",
            Role::Standard => "Standard",
            Role::Admin => "TSV-Admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Columns a record listing can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    TrackingNumber,
    CreatedAt,
    CreatedBy,
    LastUpdatedAt,
    LastUpdatedBy,
    Organization,
}

impl FromStr for SortField {
    type Err = String;

    // Accepts both the API names and the legacy column names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tracking_number" | "po_number" => Ok(SortField::TrackingNumber),
            "created_at" | "created_dt" => Ok(SortField::CreatedAt),
            "created_by" => Ok(SortField::CreatedBy),
            "last_updated_at" | "last_upd_dt" => Ok(SortField::LastUpdatedAt),
            "last_updated_by" | "last_upd_by" => Ok(SortField::LastUpdatedBy),
            "organization" | "user_org" => Ok(SortField::Organization),
            other => Err(format!("Unknown sort field: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(format!("Unknown sort direction: {other}")),
        }
    }
}

/// Ordering applied to a record listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: SortField::LastUpdatedAt,
            direction: SortDirection::Desc,
        }
    }
}
