//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `EASEL_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `EASEL_` override YAML values
//! 3. **DATABASE_URL** - Special case: overrides `database.url` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `EASEL_GENERATION__IMAGE_TIMEOUT=90s` sets the `generation.image_timeout` field.

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "EASEL_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have sensible defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Username for the initial admin account (created on first startup)
    pub admin_username: String,
    /// Email address for the initial admin account
    pub admin_email: String,
    /// Points system configuration
    pub points: PointsConfig,
    /// Generation pipeline configuration (timeouts, optimizer sampling)
    pub generation: GenerationConfig,
    /// CORS configuration for browser clients
    pub cors: CorsConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Connection string for the PostgreSQL database
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Maximum time to wait for a connection (seconds)
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost:5432/easel".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
        }
    }
}

/// Points system configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PointsConfig {
    /// Initial points granted to newly created accounts (default: 0)
    pub initial_points_for_new_users: i64,
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            initial_points_for_new_users: 0,
        }
    }
}

/// Generation pipeline configuration.
///
/// The optimizer timeout is deliberately shorter than the image timeout:
/// prompt optimization is a small text completion, image payloads are larger.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
    /// Timeout for the prompt optimizer call
    #[serde(with = "humantime_serde")]
    pub optimizer_timeout: Duration,
    /// Timeout for each per-model image provider call
    #[serde(with = "humantime_serde")]
    pub image_timeout: Duration,
    /// Maximum tokens requested from the optimizer
    pub optimizer_max_tokens: u32,
    /// Sampling temperature for the optimizer
    pub optimizer_temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            optimizer_timeout: Duration::from_secs(30),
            image_timeout: Duration::from_secs(60),
            optimizer_max_tokens: 500,
            optimizer_temperature: 0.7,
        }
    }
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Allow credentials (cookies) in CORS requests
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![CorsOrigin::Url(Url::parse("http://localhost:5173").unwrap())],
            allow_credentials: true,
            max_age: Some(3600),
        }
    }
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            database: DatabaseConfig::default(),
            admin_username: "admin".to_string(),
            admin_email: "admin@example.com".to_string(),
            points: PointsConfig::default(),
            generation: GenerationConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

impl Config {
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        // DATABASE_URL takes precedence over anything in the file
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = url;
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("EASEL_").split("__"))
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.generation.optimizer_timeout.is_zero() || self.generation.image_timeout.is_zero() {
            anyhow::bail!("generation timeouts must be non-zero");
        }
        if !(0.0..=2.0).contains(&self.generation.optimizer_temperature) {
            anyhow::bail!(
                "optimizer_temperature must be between 0.0 and 2.0, got {}",
                self.generation.optimizer_temperature
            );
        }
        if self.points.initial_points_for_new_users < 0 {
            anyhow::bail!("initial_points_for_new_users must not be negative");
        }
        Ok(())
    }

    /// Get the address to bind the HTTP server to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_address(), "0.0.0.0:3001");
    }

    #[test]
    fn optimizer_times_out_before_images() {
        let config = GenerationConfig::default();
        assert!(config.optimizer_timeout < config.image_timeout);
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        let config = Config {
            generation: GenerationConfig {
                optimizer_temperature: 3.5,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_negative_initial_points() {
        let config = Config {
            points: PointsConfig {
                initial_points_for_new_users: -5,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
