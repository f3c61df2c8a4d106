//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! All endpoints are documented with OpenAPI annotations via `utoipa`; the
//! rendered documentation is served at `/docs` when the server is running.

pub mod handlers;
pub mod models;

use utoipa::OpenApi;

/// OpenAPI documentation for the REST API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "easel API",
        description = "Accounts, points, and multi-model image generation"
    ),
    paths(
        handlers::users::create_user,
        handlers::users::get_user,
        handlers::users::list_users,
        handlers::users::get_balance,
        handlers::users::grant_points,
        handlers::generations::create_generation,
        handlers::generations::list_generations,
        handlers::generations::delete_generations,
        handlers::generations::clear_generations,
        handlers::provider_configs::create_provider_config,
        handlers::provider_configs::list_provider_configs,
        handlers::provider_configs::get_provider_config,
        handlers::provider_configs::update_provider_config,
        handlers::provider_configs::activate_provider_config,
        handlers::provider_configs::delete_provider_config,
        handlers::redemption_codes::create_redemption_code,
        handlers::redemption_codes::list_redemption_codes,
        handlers::redemption_codes::redeem_code,
    ),
    components(schemas(
        models::users::UserCreate,
        models::users::UserResponse,
        models::users::PointsGrant,
        models::users::BalanceResponse,
        models::generations::GenerationCreate,
        models::generations::GenerationResponse,
        models::generations::GenerationDeleteRequest,
        models::generations::GenerationDeleteResponse,
        models::provider_configs::ProviderConfigCreate,
        models::provider_configs::ProviderConfigUpdate,
        models::provider_configs::ProviderConfigResponse,
        models::redemption_codes::RedemptionCodeCreate,
        models::redemption_codes::RedemptionCodeResponse,
        models::redemption_codes::RedeemRequest,
        models::redemption_codes::RedeemResponse,
    )),
    tags(
        (name = "users", description = "Account management"),
        (name = "points", description = "Point balances and grants"),
        (name = "generations", description = "Image generation and history"),
        (name = "provider-configs", description = "Provider configuration administration"),
        (name = "redemption-codes", description = "Redemption code administration and redemption"),
    )
)]
pub struct ApiDoc;
