//! Greenkeep API server.

use std::sync::Arc;

use axum::http::HeaderValue;
use sqlx::PgPool;
use thiserror::Error;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use greenkeep::adapters::ai::{MockAssistantProvider, OpenAIProvider};
use greenkeep::adapters::auth::JwtSessionValidator;
use greenkeep::adapters::memory::{InMemorySubscriptionStore, InMemoryUsageStore};
use greenkeep::adapters::postgres::{PostgresSubscriptionStore, PostgresUsageStore};
use greenkeep::adapters::redis::RedisUsageStore;
use greenkeep::adapters::resilience::{TimeoutSubscriptionStore, TimeoutUsageStore};
use greenkeep::adapters::SystemClock;
use greenkeep::config::{
    AppConfig, ConfigError, StorageBackend, UsageCounterBackend, ValidationError,
};
use greenkeep::ports::{AssistantError, AssistantProvider, SubscriptionStore, UsageStore};
use greenkeep::{build_router, AppDependencies};

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("assistant provider: {0}")]
    Assistant(#[from] AssistantError),

    #[error("server: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    tracing::info!(
        environment = ?config.server.environment,
        backend = ?config.storage.backend,
        usage_counters = ?config.storage.usage_counters,
        ai_chat_limit = config.limits.ai_chat_limit,
        photo_diagnosis_limit = config.limits.photo_diagnosis_limit,
        "starting greenkeep"
    );

    let pool = connect_database(&config).await?;
    let (subscriptions, usage) = build_stores(&config, pool.as_ref()).await?;

    let deps = AppDependencies {
        subscriptions,
        usage,
        clock: Arc::new(SystemClock),
        assistant: build_assistant(&config)?,
        sessions: Arc::new(JwtSessionValidator::new(&config.auth.jwt_config())),
        limits: config.limits,
        webhook_verifier: config.payment.webhook_verifier(),
        billing: config.payment.billing_settings(),
    };
    if deps.webhook_verifier.is_none() {
        tracing::warn!("payment.webhook_secret not set; billing webhooks will be refused");
    }

    let app = build_router(deps)
        .layer(TimeoutLayer::new(config.server.request_timeout()))
        .layer(cors_layer(&config.server.cors_origins_list()))
        .layer(TraceLayer::new_for_http());

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(pool) = pool {
        pool.close().await;
    }
    tracing::info!("shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.is_production() {
        registry
            .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn connect_database(config: &AppConfig) -> Result<Option<PgPool>, StartupError> {
    let Some(database) = &config.database else {
        return Ok(None);
    };
    if config.storage.backend != StorageBackend::Postgres {
        return Ok(None);
    }

    let pool = database.pool_options().connect(&database.url).await?;
    if database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("migrations applied");
    }
    Ok(Some(pool))
}

async fn build_stores(
    config: &AppConfig,
    pool: Option<&PgPool>,
) -> Result<(Arc<dyn SubscriptionStore>, Arc<dyn UsageStore>), StartupError> {
    let (subscriptions, primary_usage): (Arc<dyn SubscriptionStore>, Arc<dyn UsageStore>) =
        match pool {
            Some(pool) => (
                Arc::new(PostgresSubscriptionStore::new(pool.clone())),
                Arc::new(PostgresUsageStore::new(pool.clone())),
            ),
            None => {
                tracing::warn!("using in-memory storage; data is lost on restart");
                (
                    Arc::new(InMemorySubscriptionStore::new()),
                    Arc::new(InMemoryUsageStore::new()),
                )
            }
        };

    let usage: Arc<dyn UsageStore> = match (&config.storage.usage_counters, &config.redis) {
        (UsageCounterBackend::Redis, Some(redis_config)) => {
            let client = redis::Client::open(redis_config.url.as_str())?;
            let conn = client.get_multiplexed_tokio_connection().await?;
            Arc::new(RedisUsageStore::new(conn))
        }
        _ => primary_usage,
    };

    let budget = config.storage.timeout();
    Ok((
        Arc::new(TimeoutSubscriptionStore::new(subscriptions, budget)),
        Arc::new(TimeoutUsageStore::new(usage, budget)),
    ))
}

fn build_assistant(config: &AppConfig) -> Result<Arc<dyn AssistantProvider>, StartupError> {
    match config.ai.openai_config() {
        Some(openai) => Ok(Arc::new(OpenAIProvider::new(openai)?)),
        None => {
            tracing::warn!("ai.api_key not set; using the mock assistant");
            Ok(Arc::new(MockAssistantProvider::new()))
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
