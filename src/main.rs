use anyhow::Context;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use orange_dispatch::app::{Application, Services};
use orange_dispatch::config::config;
use orange_dispatch::handlers::HandlerRegistry;
use orange_dispatch::http::web;
use orange_dispatch::session::SessionManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so DATABASE_URL and friends are picked up
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config().clone();
    info!("Starting Orange dispatch in {:?} mode", config.environment);

    let port = config.server.port;
    let sessions = SessionManager::new(config.session.ttl_secs);
    let services = Services::from_config(config, &HandlerRegistry::with_builtins())?;
    let app = web::router(Application::new(services), sessions.clone());

    // sweep idle sessions
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(600));
        loop {
            interval.tick().await;
            sessions.purge_expired().await;
        }
    });

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!("Orange dispatch listening on http://{}", bind_addr);
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
