mod app;
mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use unihub_api::auth::{AppState, AppStateInner};
use unihub_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "unihub=debug,unihub_api=debug,unihub_db=info,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Database::open(&config.db_path)?;

    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret,
        tie_break: config.tie_break,
    });

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("UniHub server listening on {} (user tie-break: {:?})", addr, config.tie_break);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app::router(state)).await?;

    Ok(())
}
