//! Application configuration.
//!
//! Configuration is read from environment variables with the `GREENKEEP`
//! prefix, using `__` between nested keys. A `.env` file is loaded first when
//! present.
//!
//! ```no_run
//! use greenkeep::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod ai;
mod auth;
mod database;
mod error;
mod payment;
mod redis;
mod server;
mod storage;

pub use ai::AiConfig;
pub use auth::AuthConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use payment::PaymentConfig;
pub use redis::RedisConfig;
pub use server::{Environment, ServerConfig};
pub use storage::{StorageBackend, StorageConfig, UsageCounterBackend};

use serde::Deserialize;

use crate::domain::usage::FreeTierLimits;

/// Root application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// Required when `storage.backend = postgres`
    pub database: Option<DatabaseConfig>,

    /// Required when `storage.usage_counters = redis`
    pub redis: Option<RedisConfig>,

    #[serde(default)]
    pub storage: StorageConfig,

    pub auth: AuthConfig,

    #[serde(default)]
    pub payment: PaymentConfig,

    /// Free-tier quotas per billing period
    #[serde(default)]
    pub limits: FreeTierLimits,

    #[serde(default)]
    pub ai: AiConfig,
}

impl AppConfig {
    /// Load configuration from the environment.
    ///
    /// - `GREENKEEP__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `GREENKEEP__LIMITS__AI_CHAT_LIMIT=10` -> `limits.ai_chat_limit = 10`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values
    /// cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("GREENKEEP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate each section and the constraints between them.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.storage.validate()?;
        self.auth.validate(self.server.environment)?;
        self.payment.validate()?;
        self.ai.validate()?;

        match (&self.storage.backend, &self.database) {
            (StorageBackend::Postgres, None) => {
                return Err(ValidationError::MissingRequired("DATABASE__URL"))
            }
            (_, Some(database)) => database.validate()?,
            _ => {}
        }

        match (&self.storage.usage_counters, &self.redis) {
            (UsageCounterBackend::Redis, None) => {
                return Err(ValidationError::MissingRequired("REDIS__URL"))
            }
            (_, Some(redis)) => redis.validate()?,
            _ => {}
        }

        if self.is_production() {
            if self.storage.backend == StorageBackend::Memory {
                return Err(ValidationError::MissingRequired("STORAGE__BACKEND"));
            }
            if !self.ai.has_api_key() {
                return Err(ValidationError::MissingRequired("AI__API_KEY"));
            }
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
