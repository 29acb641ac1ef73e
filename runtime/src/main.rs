use std::{env, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use content_analysis::{
    AppState,
    config::{AppConfig, load_config},
    pipeline::{AnalysisPipeline, ContentAnalyzer, PdfTextExtractor, YoutubeTranscriptFetcher},
    routes,
    storage::{
        AnalysisStore, FsBlobStorage, FsBlobStorageConfig, JsonKvStorage, JsonKvStorageConfig,
        StorageManager,
    },
};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(error = %err, "content analysis service crashed");
        eprintln!("content analysis service crashed: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_tracing();
    if let Err(err) = dotenvy::dotenv() {
        info!(error = %err, "no .env file loaded");
    }
    let api_key = env::var("OPENAI_API_KEY").context("OPENAI_API_KEY not set")?;

    let config = load_config()
        .await
        .context("Failed to load application configuration")?;
    let workspace = workspace_from_env();

    let (store, mut storage_manager) = open_store(&config, workspace.as_deref());
    storage_manager.initialize_all().await?;

    let analyzer = ContentAnalyzer::from_config(&config.ai, api_key)?;
    let transcripts = YoutubeTranscriptFetcher::new(
        config.transcripts.base_url.clone(),
        config.transcripts.languages.clone(),
        Duration::from_secs(config.transcripts.request_timeout_secs),
    )
    .context("failed to build transcript client")?;

    let pipeline = AnalysisPipeline::new(
        Arc::new(PdfTextExtractor::new()),
        Arc::new(transcripts),
        analyzer,
        store,
    );

    let addr_string = format!("{}:{}", config.server.host, config.server.port);
    let addr = addr_string
        .parse::<SocketAddr>()
        .with_context(|| format!("Invalid server address: {addr_string}"))?;
    info!(
        model = %config.ai.model,
        working_dir = %config.working_dir,
        workspace = workspace.as_deref().unwrap_or("_"),
        "configuration loaded"
    );

    let app = routes::build_router(Arc::new(AppState {
        config: Arc::new(config),
        pipeline: Arc::new(pipeline),
    }));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind TCP listener on {addr}"))?;
    info!(%addr, "content analysis service listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    if let Err(err) = storage_manager.finalize_all().await {
        warn!(error = %err, "storages were not flushed cleanly");
    }
    served.context("Server encountered a fatal error")
}

fn workspace_from_env() -> Option<String> {
    env::var("WORKSPACE")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn open_store(config: &AppConfig, workspace: Option<&str>) -> (AnalysisStore, StorageManager) {
    let working_dir = config.working_dir();
    let records = Arc::new(JsonKvStorage::new(JsonKvStorageConfig {
        working_dir: working_dir.clone(),
        namespace: "analyses".into(),
        workspace: workspace.map(str::to_string),
    }));
    let blobs = Arc::new(FsBlobStorage::new(FsBlobStorageConfig {
        working_dir,
        namespace: "source_blobs".into(),
        workspace: workspace.map(str::to_string),
    }));

    let mut manager = StorageManager::new();
    manager.register_kv("analyses", records.clone());
    manager.register_blob("source_blobs", blobs.clone());
    (AnalysisStore::new(records, blobs), manager)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = signal::ctrl_c() => {
            if let Err(err) = result {
                error!(error = %err, "Ctrl+C handler failed");
            }
            info!("shutting down on Ctrl+C");
        }
        _ = terminate => info!("shutting down on SIGTERM"),
    }
}
