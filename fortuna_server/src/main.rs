use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use fortuna_shared::Database;

mod config;
mod routes;

use config::Config;
use routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let db = Database::connect(&config.database_url).await?;

    let state = Arc::new(AppState {
        db,
        prizes: config.prizes,
        timing: config.timing,
        api_key: config.api_key,
    });

    let app = routes::router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!("listening on {}", config.bind);
    axum::serve(listener, app).await?;
    Ok(())
}
