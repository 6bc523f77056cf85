mod server;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use pdf_rag_core::config::{
    DEFAULT_COLLECTION, DEFAULT_EMBEDDING_MODEL, DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL,
    DEFAULT_STORAGE_PATH, DEFAULT_UPLOAD_DIR,
};
use pdf_rag_core::{expand_input_paths, Answer, RagConfig, RagService, DEFAULT_TOP_K};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-rag", version, about = "Ask grounded questions about your PDFs")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    settings: Settings,
}

#[derive(Args)]
struct Settings {
    /// Directory of the on-disk vector store
    #[arg(long, env = "VECTORSTORE_PATH", default_value = DEFAULT_STORAGE_PATH, global = true)]
    storage_path: PathBuf,

    /// Collection that ingestion writes to and queries read from
    #[arg(long, env = "RAG_COLLECTION", default_value = DEFAULT_COLLECTION, global = true)]
    collection: String,

    /// Embedding model identifier
    #[arg(long, env = "EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL, global = true)]
    embedding_model: String,

    /// OpenAI-compatible embeddings base URL; the local n-gram embedder is used when unset
    #[arg(long, env = "EMBEDDING_URL", global = true)]
    embedding_url: Option<String>,

    /// Bearer token for the embeddings endpoint
    #[arg(long, env = "EMBEDDING_API_KEY", hide_env_values = true, global = true)]
    embedding_api_key: Option<String>,

    /// Qdrant base URL; the on-disk store is used when unset
    #[arg(long, env = "QDRANT_URL", global = true)]
    qdrant_url: Option<String>,

    /// Chat model credential; answers are context-only when unset
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    openai_api_key: Option<String>,

    /// Chat model name
    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_OPENAI_MODEL, global = true)]
    openai_model: String,

    /// Chat completions base URL
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_OPENAI_BASE_URL, global = true)]
    openai_base_url: String,

    /// Soft character budget per chunk
    #[arg(long, env = "CHUNK_MAX_CHARS", default_value_t = 1200, global = true)]
    chunk_max_chars: usize,

    /// Where uploaded PDFs are written before ingestion
    #[arg(long, env = "UPLOAD_DIR", default_value = DEFAULT_UPLOAD_DIR, global = true)]
    upload_dir: PathBuf,
}

impl From<Settings> for RagConfig {
    fn from(settings: Settings) -> Self {
        RagConfig {
            storage_path: settings.storage_path,
            collection: settings.collection,
            embedding_model: settings.embedding_model,
            embedding_url: settings.embedding_url,
            embedding_api_key: settings.embedding_api_key,
            qdrant_url: settings.qdrant_url,
            openai_api_key: settings.openai_api_key,
            openai_model: settings.openai_model,
            openai_base_url: settings.openai_base_url,
            chunk_max_chars: settings.chunk_max_chars,
            upload_dir: settings.upload_dir,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API (/health, /ingest, /query).
    Serve {
        /// Address to listen on.
        #[arg(long, env = "RAG_BIND", default_value = "127.0.0.1:8000")]
        bind: String,
    },
    /// Ingest PDF files, or every PDF below the given folders.
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Answer a question from the ingested documents.
    Query {
        question: String,
        /// Number of chunks to retrieve.
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Arc::new(RagConfig::from(cli.settings));
    let service = RagService::from_config(config.clone()).context("invalid configuration")?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        storage = %config.storage_path.display(),
        collection = %config.collection,
        chat_model = %service.chat_model_id().unwrap_or_else(|| "none".to_string()),
        "pdf-rag boot"
    );

    match cli.command {
        Command::Serve { bind } => server::serve(service, &bind).await?,
        Command::Ingest { paths } => {
            let files = expand_input_paths(&paths)?;
            let summary = service.ingest(&files).await?;

            println!(
                "Ingested {} chunks into {}",
                summary.chunks_added,
                config.storage_path.display()
            );
            for id in summary.ids {
                println!("  {id}");
            }
        }
        Command::Query { question, top_k } => {
            let answer = service.answer(&question, top_k).await?;
            print_answer(&answer);
        }
    }

    Ok(())
}

fn print_answer(answer: &Answer) {
    println!("Answer\n{}\n", answer.answer);
    println!("Model: {}\n", answer.generation.model_tag());
    println!("Sources");
    for source in &answer.sources {
        println!(
            "- {} (page {}), chunk {} — id: {}",
            source.source, source.page, source.chunk_index, source.id
        );
    }
}
