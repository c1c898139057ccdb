//! Bookshelf server: loads config from the environment (and `.env`), prepares the
//! database, and serves the API until Ctrl+C or SIGTERM.

use bookshelf_api::{
    app, ensure_books_table, ensure_database_exists, middleware::rate_limit, AppConfig, AppState,
    PgBookStore,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("bookshelf_api=info".parse()?))
        .init();

    let config = AppConfig::from_env()?;

    ensure_database_exists(&config.database_url).await?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .idle_timeout(config.db_idle_timeout)
        .connect(&config.database_url)
        .await?;
    ensure_books_table(&pool).await?;
    tracing::info!("database connection pool established");

    let store = Arc::new(PgBookStore::new(pool));
    let state = AppState::from_config(store, &config)?;
    if let Some(limiter) = state.limiter() {
        rate_limit::spawn_pruner(limiter.clone(), rate_limit::PRUNE_INTERVAL);
    }
    let router = app(state, &config.cors_trusted_origins);

    let listener = TcpListener::bind(config.socket_addr()).await?;
    tracing::info!(addr = %listener.local_addr()?, env = %config.env, "starting server");
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
