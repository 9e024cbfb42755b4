pub mod entities;
pub mod enums;
pub mod memory_store;
pub mod models;
pub mod postgres_store;
pub mod store;
