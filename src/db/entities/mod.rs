//! SeaORM entities for the tables backing the DSR tracker.
//!
//! Column names follow the existing hosted schema, which is why they differ
//! from the field names used by the domain models in `crate::db::models`.

pub mod dsr_tracker;
pub mod user_org;
pub mod user_table;
