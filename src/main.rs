use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod backend;
mod config;
mod console;
mod error;
mod retry;
mod state;
mod web;

use api::{ApiState, build_router};
use backend::LocalBackend;
use config::ConsoleConfig;
use console::Console;
use console::session::SessionStore;
use state::StateManager;
use web::{WebState, build_web_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "samqfs_console=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting SAM-QFS console...");

    let config = ConsoleConfig::from_env()?;

    let state_manager = Arc::new(
        StateManager::load_or_seed(&config.state_path, &config.default_server)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to initialize state: {}", e))?,
    );
    tracing::info!("Inventory loaded from {}", config.state_path.display());

    let backend = Arc::new(LocalBackend::new(state_manager.clone()));
    let console = Arc::new(Console::new(backend, config.backoff()));
    let sessions = Arc::new(SessionStore::new(config.default_server.clone()));

    let api_state = Arc::new(ApiState {
        console: console.clone(),
        sessions: sessions.clone(),
        state_manager,
        default_server: config.default_server.clone(),
    });
    let web_state = Arc::new(WebState { console, sessions });

    let app = build_web_router(web_state).merge(build_router(api_state));

    let addr = config.listen_addr;
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("Managing server {}", config.default_server);
    tracing::info!("API: http://{}/api/rpc", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
