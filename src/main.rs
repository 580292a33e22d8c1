use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use tutor_openrouter::{OpenRouterClient, OpenRouterConfig};
use tutor_rag::{AnswerAssembler, IndexedChunk, RetrievalFailurePolicy};
use tutor_server::{AppState, ServerConfig};
use tutor_store::{Database, DocumentRow, SqliteInteractionRecorder};

mod retrieval;

#[derive(Parser)]
#[command(name = "tutor")]
#[command(about = "Retrieval-augmented tutor for the Physical AI & Humanoid Robotics textbook", long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP gateway
    Serve {
        /// Bind host (overrides HOST)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Markdown files or directories to index before binding
        #[arg(long, num_args = 1..)]
        docs: Vec<PathBuf>,
    },
    /// Index Markdown files or directories into the similarity index
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let mut config = ServerConfig::from_env()?;

    match cli.command {
        Commands::Serve { host, port, docs } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            serve(config, docs).await
        }
        Commands::Ingest { paths } => ingest(config, paths).await,
    }
}

fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn init_tracing(verbose: u8, json: bool) {
    // RUST_LOG wins over -v
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_filter(verbose)))
    };

    let text_layer = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(filter())
    });
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(filter())
    });

    tracing_subscriber::registry()
        .with(text_layer)
        .with(json_layer)
        .init();
}

async fn serve(config: ServerConfig, docs: Vec<PathBuf>) -> Result<()> {
    // A missing generation key is fatal before anything binds.
    let generation = OpenRouterConfig::from_env().context("loading generation provider settings")?;
    let generator = Arc::new(OpenRouterClient::new(generation)?);

    let db = Database::open(&config.database_path)?;
    let recorder = Arc::new(SqliteInteractionRecorder::new(db.clone()));

    let mut assembler = AnswerAssembler::new(generator)
        .with_config(config.assembler_config())
        .with_recorder(recorder);

    let built = match retrieval::build(&config).await {
        Ok(built) => built,
        Err(e) if config.on_retrieval_failure == RetrievalFailurePolicy::Fallback => {
            warn!(error = %e, "retrieval unavailable, answering from fallback context");
            None
        }
        Err(e) => return Err(e.into()),
    };

    match built {
        Some(retrieval) => {
            if !docs.is_empty() {
                let result = retrieval::index_paths(&retrieval, &docs).await?;
                for error in &result.errors {
                    warn!(%error, "document not indexed");
                }
                let recorded = record_chunks(&db, result.chunks).await?;
                info!(
                    documents = result.documents_indexed,
                    chunks = recorded,
                    failed = result.documents_failed,
                    "preloaded documents"
                );
            }
            if let Some((embedder, index)) = retrieval::usable(&config, retrieval).await? {
                info!(
                    backend = ?config.embedding_backend,
                    dimension = config.vector_dimension,
                    "retrieval enabled"
                );
                assembler = assembler.with_retrieval(embedder, index);
            }
        }
        None => {
            if !docs.is_empty() {
                bail!("--docs needs EMBEDDING_PROVIDER set to openai or hash");
            }
            info!("no embedding provider configured, answering from fallback context");
        }
    }

    tutor_server::serve(&config.bind_address(), AppState::new(assembler, db)).await?;
    Ok(())
}

async fn ingest(config: ServerConfig, paths: Vec<PathBuf>) -> Result<()> {
    let Some(retrieval) = retrieval::build(&config).await? else {
        bail!("EMBEDDING_PROVIDER must be set to openai or hash to ingest documents");
    };
    if config.qdrant_url.is_none() {
        warn!("QDRANT_URL is not set, ingested vectors only live for this process");
    }

    let result = retrieval::index_paths(&retrieval, &paths).await?;
    for error in &result.errors {
        println!("{} {}", "✗".red(), error);
    }

    let db = Database::open(&config.database_path)?;
    let recorded = record_chunks(&db, result.chunks).await?;

    println!(
        "{} Indexed {} documents ({} chunks), {} failed",
        "✅".green(),
        result.documents_indexed,
        recorded,
        result.documents_failed
    );
    Ok(())
}

async fn record_chunks(db: &Database, chunks: Vec<IndexedChunk>) -> Result<usize> {
    let rows = chunks
        .into_iter()
        .map(|chunk| DocumentRow {
            point_id: chunk.point_id,
            title: chunk.title,
            content: chunk.content,
        })
        .collect::<Vec<_>>();
    Ok(db.record_documents(rows).await?)
}
