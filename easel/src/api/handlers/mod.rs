//! Axum route handlers for the REST API.

pub mod generations;
pub mod provider_configs;
pub mod redemption_codes;
pub mod users;
