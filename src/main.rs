//! Process entry point: config, tracing, transport selection.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use vectorgate::adapters::embeddings::FastembedFactory;
use vectorgate::adapters::mcp::{HttpServer, StdioServer};
use vectorgate::adapters::qdrant::{QdrantConfig, QdrantHttpStore};
use vectorgate::services::{EmbedderPool, ModelRegistry, SemanticGateway};
use vectorgate::{ConfigLoader, Settings};

#[derive(Parser)]
#[command(name = "vectorgate", version, about = "Collection-aware semantic-search gateway over Qdrant")]
struct Cli {
    /// Load configuration from this file instead of the default chain.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve MCP over stdio (JSON-RPC 2.0, newline-delimited).
    Serve,
    /// Serve the HTTP/JSON transport.
    ServeHttp,
    /// Validate configuration and print the effective model mappings.
    CheckConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };

    init_tracing(matches!(cli.command, Command::Serve));

    match cli.command {
        Command::Serve => {
            let gateway = build_gateway(&settings)?;
            StdioServer::new(gateway, settings.default_collection.clone())
                .run()
                .await
        }
        Command::ServeHttp => {
            let gateway = build_gateway(&settings)?;
            HttpServer::new(gateway, settings.http.clone())
                .serve_with_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await
        }
        Command::CheckConfig => {
            let gateway = build_gateway(&settings)?;
            let report = serde_json::to_string_pretty(&gateway.model_mappings())?;
            println!("{report}");
            Ok(())
        }
    }
}

fn build_gateway(settings: &Settings) -> anyhow::Result<Arc<SemanticGateway>> {
    let store = Arc::new(QdrantHttpStore::new(QdrantConfig {
        url: settings.backend_url.clone(),
        api_key: settings.backend_api_key.clone(),
        timeout: Duration::from_secs(settings.backend_timeout_secs),
    })?);
    let registry = Arc::new(ModelRegistry::from_settings(settings));
    let factory = Arc::new(FastembedFactory::new(
        settings.gpu_enabled,
        settings.model_cache_dir.clone().map(PathBuf::from),
    ));
    let pool = EmbedderPool::new(factory);

    Ok(Arc::new(SemanticGateway::new(
        store, registry, pool, settings,
    )))
}

/// Stdio transport logs to stderr only; stdout carries the protocol.
fn init_tracing(stderr_only: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if stderr_only {
        builder.with_writer(std::io::stderr).init();
    } else {
        builder.init();
    }
}
