//! CLI interface for the document search service

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use docsearch::{
    ChunkSource, EmbeddingProvider, HashingEmbedder, IngestionPipeline, ServiceConfig,
    SessionStore, TextPipeline,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docsearch")]
#[command(about = "Upload documents and search them by meaning", long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, env = "DOCSEARCH_CONFIG")]
    config: Option<PathBuf>,

    /// Session directory (overrides `index_dir` from the config)
    #[arg(long)]
    index_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Address to bind to
        #[arg(long)]
        addr: Option<String>,
    },
    /// Add extracted document text to the persisted session
    Ingest {
        /// Text files; pages separated by form feeds
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Search the persisted session
    Query {
        /// Query text
        text: String,
        /// Number of results to return
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Delete the persisted session
    Clear,
    /// Show session size and dimension
    Stats,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn ingest(store: &SessionStore, config: &ServiceConfig, files: &[PathBuf]) -> Result<()> {
    let embedder = HashingEmbedder::new(config.embedding.dimension)?;
    let pipeline = TextPipeline::from_config(&config.chunking);

    let mut texts = Vec::new();
    let mut sources = Vec::new();
    for path in files {
        let document_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let chunks = pipeline
            .process(path)
            .with_context(|| format!("ingesting {}", path.display()))?;
        for chunk in chunks {
            sources.push(ChunkSource::new(document_name.clone(), chunk.page_number));
            texts.push(chunk.text);
        }
    }

    let outcome = store.add_batch(&texts, &sources, &embedder)?;
    println!("Added {} chunks ({} total)", outcome.added, outcome.total);
    Ok(())
}

fn query(store: &SessionStore, config: &ServiceConfig, text: &str, k: usize) -> Result<()> {
    let embedder = HashingEmbedder::new(config.embedding.dimension)?;
    if let Some(dim) = store.dimension()? {
        if dim != embedder.dimension() {
            anyhow::bail!(
                "session was built with dimension {}, but the embedder produces {}",
                dim,
                embedder.dimension()
            );
        }
    }

    let hits = store.search(text, k, &embedder)?;
    if hits.is_empty() {
        println!("No results found (session is empty)");
        return Ok(());
    }

    println!("Top {} results:", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. {} p.{} (score: {:.4})",
            i + 1,
            hit.record.source_document_name,
            hit.record.page_number,
            hit.score
        );
        println!("   {}", hit.record.text);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = ServiceConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.index_dir {
        config.index_dir = dir;
    }

    match cli.command {
        Commands::Serve { addr } => {
            if let Some(addr) = addr {
                config.bind_addr = addr;
            }
            docsearch::server::start(config).await?;
        }
        Commands::Ingest { files } => {
            let store = SessionStore::open(&config.index_dir)?;
            ingest(&store, &config, &files)?;
        }
        Commands::Query { text, k } => {
            let store = SessionStore::open(&config.index_dir)?;
            query(&store, &config, &text, k.unwrap_or(config.default_top_k))?;
        }
        Commands::Clear => {
            SessionStore::new(&config.index_dir).clear()?;
            println!("Session cleared");
        }
        Commands::Stats => {
            let store = SessionStore::open(&config.index_dir)?;
            let (vectors, records) = store.sizes()?;
            println!("Session directory: {}", store.dir().display());
            println!("Chunks: {} (metadata records: {})", vectors, records);
            match store.dimension()? {
                Some(dim) => println!("Dimension: {}", dim),
                None => println!("Dimension: unset"),
            }
        }
    }
    Ok(())
}
