//! Kennel Server binary.

use kennel_engine::DiskAdapter;
use kennel_server::config::Config;
use kennel_server::db::{self, PostgresAdapter};
use kennel_server::models::{self, DISK_CONNECTION, POSTGRES_CONNECTION};
use kennel_server::{app, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "kennel_server=debug,kennel_engine=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Kennel Server on {}:{}", config.host, config.port);

    // Open both connections
    let pool = db::create_pool(&config.database_url, config.adapter_timeout).await?;
    let postgres = PostgresAdapter::new(POSTGRES_CONNECTION, pool);
    let disk = DiskAdapter::open(DISK_CONNECTION, &config.disk_path).await?;

    tracing::info!(migrate = ?config.migrate, "Registering collections...");
    let orm = models::connect(
        Arc::new(disk),
        Arc::new(postgres),
        config.migrate,
        config.adapter_timeout,
    )
    .await?;

    // Build application state
    let state = AppState {
        orm: Arc::new(orm),
        config: Arc::new(config.clone()),
    };

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app(state)).await?;

    Ok(())
}
