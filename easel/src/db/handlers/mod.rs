//! Repository implementations for database access.
//!
//! Each repository:
//! - Wraps a SQLx connection or transaction
//! - Provides strongly-typed CRUD operations
//! - Handles query construction and parameter binding
//! - Returns domain models from [`crate::db::models`]
//!
//! # Available Repositories
//!
//! - [`Users`]: Account management and atomic point-balance updates
//! - [`Generations`]: Generation record lifecycle and history queries
//! - [`ProviderConfigs`]: Provider configuration management
//! - [`RedemptionCodes`]: Redemption code lifecycle
//!
//! All repositories follow this usage pattern:
//!
//! ```ignore
//! use easel::db::handlers::Users;
//!
//! async fn example(pool: &sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tx = pool.begin().await?;
//!     let mut repo = Users::new(&mut tx);
//!     let users = repo.list(0, 50).await?;
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```

pub mod generations;
pub mod provider_configs;
pub mod redemption_codes;
pub mod users;

pub use generations::Generations;
pub use provider_configs::ProviderConfigs;
pub use redemption_codes::RedemptionCodes;
pub use users::Users;
