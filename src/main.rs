use std::sync::Arc;

use anyhow::Context;
use classmates::{AppState, backend::{LocalStorage, SqliteBackend}, config::Config};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::SameSite};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("classmates=info,tower_http=info")),
        )
        .init();

    let config = Config::load()?;

    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            config.session_inactivity_minutes,
        )));

    let backend = SqliteBackend::connect(&config.database_url)
        .await
        .with_context(|| format!("failed to open {}", config.database_url))?;

    tokio::fs::create_dir_all(&config.storage_dir)
        .await
        .with_context(|| format!("failed to create {}", config.storage_dir.display()))?;
    let storage = LocalStorage::new(config.storage_dir.clone(), config.storage_public_url);

    let app_state = AppState {
        backend: Arc::new(backend),
        storage: Arc::new(storage),
        gate: config.gate,
    };

    let app = classmates::router()
        .nest_service("/storage", ServeDir::new(&config.storage_dir))
        .with_state(app_state)
        .layer(session_layer)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
