use anyhow::Context;
use rusty_library_lending::{
    adapters::postgres::{PostgresLendingReadModel, PostgresLendingStore},
    api::{handlers::AppState, router::create_router},
    application::lending::ServiceDependencies,
    config::{AppConfig, LogFormat},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.as_str().into());
    let registry = tracing_subscriber::registry().with(filter);
    match config.logging.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        lock_timeout_ms = config.database.lock_timeout_ms,
        "Starting lending server"
    );

    // Initialize database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!("Database migrations completed");

    // Initialize adapters
    let store = Arc::new(PostgresLendingStore::new(
        pool.clone(),
        config.database.lock_timeout_ms,
    ));
    let read_model = Arc::new(PostgresLendingReadModel::new(pool));

    let service_deps = ServiceDependencies { store, read_model };
    let app_state = Arc::new(AppState { service_deps });
    let app = create_router(app_state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .await
        .context("Server terminated unexpectedly")?;

    Ok(())
}
