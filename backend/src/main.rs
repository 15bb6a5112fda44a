use mototaxi_api::{
    config::AppConfig,
    db,
    web_server::{run_server, AppState},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- Setup ---
    // 1. Initialize structured logging, RUST_LOG overrides the default level
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let app_config = AppConfig::from_env()?;

    // 2. Connect to the store and bring the schema up to date
    let db_pool = db::connect(&app_config.database).await?;

    tracing::info!("Running database migrations...");
    db::run_migrations(&db_pool).await?;
    tracing::info!("Migrations complete.");

    // --- Run Server ---
    tracing::info!("Initializing server...");
    run_server(AppState { db_pool, app_config }).await
}
