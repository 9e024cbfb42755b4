use chrono::{DateTime, SubsecRound, Utc};

pub mod access_policy;
pub mod auth_service;
pub mod dsr_service;
pub mod export_service;
pub mod list_view;
pub mod organization_service;

#[cfg(test)]
pub(crate) mod test_support;

/// Current time at the precision Postgres stores, so a value read back
/// compares equal to the one written.
pub(crate) fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
