//! Database models: request/response types exchanged with the repository layer.
//!
//! Naming follows a consistent convention:
//! - `*CreateDBRequest` / `*UpdateDBRequest`: write payloads
//! - `*DBResponse`: rows read back from the database

pub mod generations;
pub mod provider_configs;
pub mod redemption_codes;
pub mod users;
