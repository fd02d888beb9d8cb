use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use edubase_api::app::{build_router, AppState};
use edubase_api::database::{DatabaseManager, PgStudentStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = edubase_api::config::config().clone();
    tracing::info!("Starting eduBase API in {:?} mode", config.environment);
    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set outside development");
    }

    let database = DatabaseManager::connect(&config.database).await?;
    let store = Arc::new(PgStudentStore::new(database.pool()));

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let app = build_router(AppState::new(store, config));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("eduBase API listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    database.close().await;
    Ok(())
}
