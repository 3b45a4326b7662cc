mod config;
mod error;
mod routes;

use std::net::SocketAddr;

use rusty_charting::structs::Table;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use routes::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = AppConfig::from_env();
    let table = Table::read_file(&cfg.data)?;
    tracing::info!(
        path = %cfg.data.display(),
        symbols = table.symbols().len(),
        rows = table.len(),
        "loaded table"
    );

    let addr: SocketAddr = format!("{}:{}", cfg.bind, cfg.port).parse()?;
    let app = routes::router(AppState::new(table, cfg)).layer(CorsLayer::permissive());

    tracing::info!("serving charts on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
