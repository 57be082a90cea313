//! Composition root: wires the store, cache, collaborators and routing core
//! together and serves the HTTP/WebSocket surface.

use crate::backends::{DisabledGenerator, GeminiGenerator, HttpSheetExporter, HttpSimilaritySearch};
use crate::config::DeskflowConfig;
use crate::routes;
use anyhow::Result;
use desk_core::{
    AutoReplier, Cache, ConnectionRegistry, ContentGenerator, EnrichmentConfig,
    EnrichmentCoordinator, FieldConfigService, MemoryCache, MessageRouter, NoopSheetExporter,
    NoopSimilaritySearch, SessionStore, SheetExporter, SimilaritySearch, SqliteStore, Store,
};
use desk_llm::GeminiClient;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct AppState {
    pub router: Arc<MessageRouter>,
    pub sessions: Arc<SessionStore>,
    pub store: Arc<dyn Store>,
    pub registry: Arc<ConnectionRegistry>,
    pub fields: Arc<FieldConfigService>,
}

pub async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    let cfg = DeskflowConfig::load(config_path).await?;
    let state = build_state(&cfg).await?;

    tracing::info!(
        bind_addr = %cfg.general.bind_addr,
        database_path = %cfg.general.database_path,
        model = %cfg.llm.model,
        auto_reply = cfg.llm.auto_reply,
        llm_configured = cfg.llm.gemini_api_key.is_some(),
        sheet_export_configured = cfg.integrations.sheet_export_url.is_some(),
        search_configured = cfg.integrations.search_url.is_some(),
        "deskflow starting"
    );

    let app = routes::router(state);
    let listener = tokio::net::TcpListener::bind(&cfg.general.bind_addr).await?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            signal_token.cancel();
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}

/// Validate config and exercise the storage schema without binding a port.
pub async fn doctor(config_path: Option<PathBuf>) -> Result<()> {
    let cfg = DeskflowConfig::load(config_path).await?;
    SqliteStore::open_in_memory().await?;
    tracing::info!(
        bind_addr = %cfg.general.bind_addr,
        database_path = %cfg.general.database_path,
        llm_configured = cfg.llm.gemini_api_key.is_some(),
        "config ok"
    );
    Ok(())
}

async fn build_state(cfg: &DeskflowConfig) -> Result<Arc<AppState>> {
    let sqlite = Arc::new(SqliteStore::open(&cfg.general.database_path).await?);
    let store: Arc<dyn Store> = sqlite;
    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());

    let registry = Arc::new(ConnectionRegistry::new());
    let sessions = Arc::new(SessionStore::new(store.clone(), cache.clone()));
    let fields = Arc::new(FieldConfigService::new(store.clone(), cache));

    let generator: Arc<dyn ContentGenerator> = match &cfg.llm.gemini_api_key {
        Some(key) => Arc::new(GeminiGenerator::new(
            GeminiClient::new(key).with_model(&cfg.llm.model),
        )),
        None => {
            tracing::warn!("no LLM key configured; enrichment and auto-reply are disabled");
            Arc::new(DisabledGenerator)
        }
    };

    let exporter: Arc<dyn SheetExporter> = match &cfg.integrations.sheet_export_url {
        Some(url) => Arc::new(HttpSheetExporter::new(url)?),
        None => {
            tracing::info!("no sheet export endpoint configured; export is a no-op");
            Arc::new(NoopSheetExporter)
        }
    };

    let search: Arc<dyn SimilaritySearch> = match &cfg.integrations.search_url {
        Some(url) => Arc::new(HttpSimilaritySearch::new(url)?),
        None => Arc::new(NoopSimilaritySearch),
    };

    let enrichment = Arc::new(EnrichmentCoordinator::new(
        store.clone(),
        sessions.clone(),
        registry.clone(),
        fields.clone(),
        generator.clone(),
        exporter,
        EnrichmentConfig {
            history_limit: cfg.enrichment.history_limit,
            timeout: Duration::from_secs(cfg.enrichment.timeout_seconds),
        },
    ));

    let responder = (cfg.llm.auto_reply && cfg.llm.gemini_api_key.is_some()).then(|| {
        Arc::new(AutoReplier::new(
            store.clone(),
            fields.clone(),
            generator,
            search,
        ))
    });

    let router = Arc::new(MessageRouter::new(
        store.clone(),
        sessions.clone(),
        registry.clone(),
        enrichment,
        responder,
    ));

    Ok(Arc::new(AppState {
        router,
        sessions,
        store,
        registry,
        fields,
    }))
}
