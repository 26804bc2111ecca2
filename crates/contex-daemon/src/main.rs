#![deny(unsafe_code)]
use anyhow::{Context, Result};
use clap::Parser;
use contex_daemon::{router, Contex};
use contex_delivery::InProcessBroker;
use contex_embed::{DeterministicEmbeddingClient, EmbeddingClient, HttpEmbeddingClient};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "contex-daemon", version, about = "Contex project-scoped context-distribution daemon")]
struct Args {
    /// Bind address, overrides the config file's `bind`.
    #[arg(long)]
    bind: Option<String>,

    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Similarity threshold (tau) override, in `[0.0, 1.0]`.
    #[arg(long)]
    threshold: Option<f32>,

    /// Enable debug-level logging.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    contex_telemetry::init_tracing(args.debug);

    let mut config = contex_config::load_config(args.config.as_deref())
        .with_context(|| "loading contex-daemon configuration")?;

    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(threshold) = args.threshold {
        config.similarity_threshold = threshold;
    }

    let warnings = contex_config::validate_config(&config)
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    for warning in &warnings {
        tracing::warn!(%warning, "configuration warning");
    }

    let embedding: Arc<dyn EmbeddingClient> = match &config.embedding_endpoint {
        Some(endpoint) => Arc::new(HttpEmbeddingClient::new(
            endpoint.clone(),
            config.embedding_dimensions,
            config.embedding_timeout(),
        )),
        None => Arc::new(DeterministicEmbeddingClient::new(config.embedding_dimensions)),
    };

    let broker = Arc::new(InProcessBroker::new());
    let bind = config.bind.clone();
    let threshold = config.similarity_threshold;
    let ctx = Contex::new(config, embedding, broker);
    let app = router(ctx);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("bind {bind}"))?;
    info!(%bind, threshold, "contex-daemon listening");

    axum::serve(listener, app).await.context("serve")
}
