//! # easel: points-metered multi-model image generation
//!
//! `easel` is the backend for an AI-image-generation service. It manages user
//! accounts with an integer point balance, proxies prompts to an external
//! OpenAI-compatible provider, and settles a flat point charge per generation
//! batch. Points enter the system through administrative grants and
//! single-use redemption codes.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for
//! the HTTP layer and uses PostgreSQL for persistence.
//!
//! ### Request flow
//!
//! A generation request names a prompt and a list of target models. The
//! orchestrator ([`generation::GenerationService`]) optionally rewrites the
//! prompt through a text-completion call, creates one `processing` record per
//! model, issues the per-model image calls concurrently, and then settles the
//! batch: one flat debit through the [`ledger::Ledger`] when at least one
//! model succeeded, nothing otherwise. Per-model failures never abort
//! sibling calls, and the response always carries one record per requested
//! model.
//!
//! ### Core components
//!
//! The **API layer** ([`api`]) exposes RESTful endpoints under `/api/v1` for
//! accounts, points, generations, provider configurations, and redemption
//! codes, documented with OpenAPI at `/docs`.
//!
//! The **database layer** ([`db`]) uses the repository pattern; each entity
//! has a repository in `db::handlers` operating over a `PgConnection`. The
//! **store layer** ([`store`]) narrows that surface behind traits so the
//! orchestrator can be exercised against an in-memory implementation.
//!
//! ## Quick start
//!
//! ```no_run
//! use clap::Parser;
//! use easel::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = easel::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     easel::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod generation;
pub mod ledger;
pub mod store;
pub mod telemetry;
pub mod types;

use crate::db::{handlers::Users, models::users::UserCreateDBRequest};
use crate::generation::GenerationService;
use crate::generation::provider::ReqwestProviderClient;
use crate::store::PgStore;
use axum::{
    Router,
    http::HeaderValue,
    routing::{delete, get, post, put},
};
use bon::Builder;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, info, instrument};
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

pub use config::{Config, CorsOrigin};
pub use types::{GenerationId, ProviderConfigId, RedemptionCodeId, UserId};

/// Type of the production generation service wired into [`AppState`].
pub type AppGenerationService = GenerationService<PgStore, ReqwestProviderClient>;

/// Application state shared across all request handlers.
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub generations: Arc<AppGenerationService>,
}

/// Get the easel database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial admin account if it doesn't exist.
///
/// Idempotent: a second startup with the same configured username is a no-op.
/// Returns the id of the created or existing account.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(
    username: &str,
    email: &str,
    db: &PgPool,
) -> anyhow::Result<UserId> {
    let mut tx = db.begin().await?;
    let mut repo = Users::new(&mut tx);

    if let Some(existing) = repo.get_by_username(username).await? {
        tx.commit().await?;
        return Ok(existing.id);
    }

    let created = repo
        .create(&UserCreateDBRequest {
            username: username.to_string(),
            email: email.to_string(),
            points: 0,
            is_admin: true,
        })
        .await?;
    tx.commit().await?;

    info!("Created initial admin account '{username}'");
    Ok(created.id)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(config.cors.allow_credentials)
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the main application router with all endpoints and middleware.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let api_routes = Router::new()
        // Account management
        .route("/users", get(api::handlers::users::list_users))
        .route("/users", post(api::handlers::users::create_user))
        .route("/users/{user_id}", get(api::handlers::users::get_user))
        // Points ledger
        .route("/users/{user_id}/points", get(api::handlers::users::get_balance))
        .route("/users/{user_id}/points", post(api::handlers::users::grant_points))
        // Generation submission and history
        .route(
            "/users/{user_id}/generations",
            post(api::handlers::generations::create_generation),
        )
        .route(
            "/users/{user_id}/generations",
            get(api::handlers::generations::list_generations),
        )
        .route(
            "/users/{user_id}/generations",
            delete(api::handlers::generations::delete_generations),
        )
        .route(
            "/users/{user_id}/generations/all",
            delete(api::handlers::generations::clear_generations),
        )
        // Code redemption
        .route(
            "/users/{user_id}/redemptions",
            post(api::handlers::redemption_codes::redeem_code),
        )
        // Provider configuration administration
        .route(
            "/admin/provider-configs",
            get(api::handlers::provider_configs::list_provider_configs),
        )
        .route(
            "/admin/provider-configs",
            post(api::handlers::provider_configs::create_provider_config),
        )
        .route(
            "/admin/provider-configs/{config_key}",
            get(api::handlers::provider_configs::get_provider_config),
        )
        .route(
            "/admin/provider-configs/{config_key}",
            put(api::handlers::provider_configs::update_provider_config),
        )
        .route(
            "/admin/provider-configs/{config_key}",
            delete(api::handlers::provider_configs::delete_provider_config),
        )
        .route(
            "/admin/provider-configs/{config_key}/activate",
            post(api::handlers::provider_configs::activate_provider_config),
        )
        // Redemption code administration
        .route(
            "/admin/redemption-codes",
            get(api::handlers::redemption_codes::list_redemption_codes),
        )
        .route(
            "/admin/redemption-codes",
            post(api::handlers::redemption_codes::create_redemption_code),
        );

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api/v1", api_routes)
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", api::ApiDoc::openapi()).path("/docs"))
        .with_state(state.clone());

    let cors_layer = create_cors_layer(&state.config)?;

    Ok(router.layer(cors_layer).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    ))
}

/// Connect to the database, run migrations, and ensure the admin account
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(
            config.database.acquire_timeout_secs,
        ))
        .connect(&config.database.url)
        .await?;

    migrator().run(&pool).await?;

    create_initial_admin_user(&config.admin_username, &config.admin_email, &pool).await?;

    Ok(pool)
}

/// The assembled application: router, state, and database pool.
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        tracing::debug!("Starting easel with configuration: {:#?}", config);

        let pool = setup_database(&config).await?;

        let store = Arc::new(PgStore::new(pool.clone()));
        let provider = Arc::new(ReqwestProviderClient::new());
        let generations = Arc::new(GenerationService::new(
            store,
            provider,
            config.generation.clone(),
        ));

        let state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .generations(generations)
            .build();

        let router = build_router(state)?;

        Ok(Self {
            router,
            config,
            pool,
        })
    }

    /// Start serving the application until the shutdown future resolves
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("easel listening on http://{bind_addr}");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        self.pool.close().await;
        Ok(())
    }
}
