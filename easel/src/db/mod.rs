//! Database layer: repositories, entity models, and error categorization.

pub mod errors;
pub mod handlers;
pub mod models;
