//! Configuration management for the bakery production server
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with BAKERY_ prefix

use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Production engine defaults
    pub production: ProductionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProductionConfig {
    /// Deepest pre-dough nesting the loader will follow
    pub max_composition_depth: usize,

    /// Mixer friction used when a request does not supply one (°C)
    pub default_mixer_friction: Decimal,

    /// Tap water temperature used when a request does not supply one (°C)
    pub default_water_temperature: Decimal,

    /// Currency of stock values
    pub currency: String,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("BAKERY_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("production.max_composition_depth", 16)?
            .set_default("production.default_mixer_friction", "1")?
            .set_default("production.default_water_temperature", "20")?
            .set_default("production.currency", "THB")?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (BAKERY_ prefix)
            .add_source(
                Environment::with_prefix("BAKERY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
