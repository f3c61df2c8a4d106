//! Request/response data structures for the REST API.
//!
//! Wire types are kept separate from the database models in `db::models`;
//! conversions live on the response types via `From` impls.

pub mod generations;
pub mod pagination;
pub mod provider_configs;
pub mod redemption_codes;
pub mod users;
