use anyhow::{Context, Result};
use synthviz::config::ServerConfig;
use synthviz::web::{app, AppState};
use synthviz::{init_logging, Renderer};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_logging("info");

    let config = ServerConfig::from_env()?;
    let state = AppState::new(Renderer::graphviz(config.graphviz.clone()), config.defaults.clone());

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    tracing::info!(%address, "synthviz listening");
    axum::serve(listener, app(state)).await.context("server failed")?;
    Ok(())
}
