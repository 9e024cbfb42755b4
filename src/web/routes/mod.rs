pub mod dsr_routes;
pub mod organization_routes;
pub mod user_routes;
