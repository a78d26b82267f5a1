//! HTTP API server for document upload and semantic search.

pub mod routes;

use crate::config::ServiceConfig;
use crate::embedding::{EmbeddingProvider, HashingEmbedder};
use crate::ingestion::{IngestionPipeline, TextPipeline};
use crate::metrics::MetricsCollector;
use crate::session::SessionStore;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// Shared application state for the HTTP server.
pub struct AppState {
    pub store: SessionStore,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub pipeline: Arc<dyn IngestionPipeline>,
    pub metrics: RwLock<MetricsCollector>,
    pub config: ServiceConfig,
}

impl AppState {
    pub fn new(
        config: ServiceConfig,
        store: SessionStore,
        embedder: Arc<dyn EmbeddingProvider>,
        pipeline: Arc<dyn IngestionPipeline>,
    ) -> Self {
        Self {
            store,
            embedder,
            pipeline,
            metrics: RwLock::new(MetricsCollector::new()),
            config,
        }
    }

    /// State wired with the built-in embedder and text pipeline.
    pub fn from_config(config: ServiceConfig, store: SessionStore) -> anyhow::Result<Self> {
        let embedder = Arc::new(HashingEmbedder::new(config.embedding.dimension)?);
        let pipeline = Arc::new(TextPipeline::from_config(&config.chunking));
        Ok(Self::new(config, store, embedder, pipeline))
    }
}

/// Open the session for serving: a fresh one by default, or the persisted
/// one when `restore_on_start` is set.
pub fn startup_session(config: &ServiceConfig) -> anyhow::Result<SessionStore> {
    if config.restore_on_start {
        return Ok(SessionStore::open(&config.index_dir)?);
    }
    let store = SessionStore::new(&config.index_dir);
    // stale files from an earlier run would no longer mirror memory
    if let Err(e) = store.clear() {
        warn!(error = %e, "could not remove stale session files");
    }
    Ok(store)
}

/// Start the HTTP server and clear the session once it shuts down.
pub async fn start(config: ServiceConfig) -> anyhow::Result<()> {
    let store = startup_session(&config)?;
    let addr = config.bind_addr.clone();
    let state = Arc::new(AppState::from_config(config, store)?);

    let app = routes::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped; clearing session");
    if let Err(e) = state.store.clear() {
        warn!(error = %e, "session cleanup on shutdown failed");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
