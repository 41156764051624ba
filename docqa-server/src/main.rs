//! `docqa` - build a DOCX question-answering index and serve it.
//!
//! # Usage
//!
//! ```bash
//! docqa build --docs docs --index-dir index --images static/images
//! docqa serve --index-dir index --images static/images --port 5000
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use docqa_rag::ollama::{
    DEFAULT_CHAT_MODEL, DEFAULT_EMBED_MODEL, OllamaChatGenerator, OllamaEmbeddingProvider,
};
use docqa_rag::{
    CorpusPaths, DocumentQa, ImageStore, IndexBuilder, IndexedCorpus, NormalizingEmbedder,
    RagConfig, TesseractOcr,
};
use docqa_server::{AppState, ServerConfig, run_server};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Question answering over a folder of Word documents.
#[derive(Parser)]
#[command(name = "docqa", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index every .docx file in a folder
    Build(BuildArgs),
    /// Serve the web UI and /ask endpoint over a built index
    Serve(ServeArgs),
}

#[derive(Args)]
struct BuildArgs {
    /// Folder containing the source .docx files
    #[arg(long, default_value = "docs")]
    docs: PathBuf,

    /// Folder receiving doc_index.bin and doc_metadata.json
    #[arg(long, default_value = "index")]
    index_dir: PathBuf,

    /// Folder receiving extracted diagram images
    #[arg(long, default_value = "static/images")]
    images: PathBuf,

    /// JSON file overriding pipeline parameters
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ollama embedding model
    #[arg(long, default_value = DEFAULT_EMBED_MODEL)]
    embed_model: String,

    /// Path to the tesseract binary
    #[arg(long, default_value = "tesseract")]
    tesseract: PathBuf,
}

#[derive(Args)]
struct ServeArgs {
    /// Folder holding a built index
    #[arg(long, default_value = "index")]
    index_dir: PathBuf,

    /// Folder holding extracted diagram images
    #[arg(long, default_value = "static/images")]
    images: PathBuf,

    /// Listen address (default: $DOCQA_HOST or 127.0.0.1)
    #[arg(long)]
    host: Option<String>,

    /// Listen port (default: $DOCQA_PORT or 5000)
    #[arg(long)]
    port: Option<u16>,

    /// JSON file overriding pipeline parameters
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ollama embedding model; must match the one used to build
    #[arg(long, default_value = DEFAULT_EMBED_MODEL)]
    embed_model: String,

    /// Ollama chat model
    #[arg(long, default_value = DEFAULT_CHAT_MODEL)]
    chat_model: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Command::Build(args) => build(args).await,
        Command::Serve(args) => serve(args).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<RagConfig> {
    match path {
        Some(path) => RagConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(RagConfig::default()),
    }
}

fn embedder(model: &str) -> NormalizingEmbedder {
    NormalizingEmbedder::new(Arc::new(OllamaEmbeddingProvider::from_env().with_model(model)))
}

async fn build(args: BuildArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let ocr = Arc::new(TesseractOcr::new().with_binary(&args.tesseract));
    let builder = IndexBuilder::new(
        config,
        ocr,
        ImageStore::new(&args.images),
        embedder(&args.embed_model),
    );

    let (corpus, report) = builder.build_from_dir(&args.docs).await?;
    corpus.save(&CorpusPaths::in_dir(&args.index_dir))?;

    println!(
        "Indexed {} documents: {} text chunks, {} image chunks",
        report.documents, report.text_chunks, report.image_chunks
    );
    Ok(())
}

async fn serve(args: ServeArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let corpus = IndexedCorpus::load(&CorpusPaths::in_dir(&args.index_dir))?;
    info!(chunks = corpus.len(), embed_model = %args.embed_model, chat_model = %args.chat_model, "loaded index");

    let generator = Arc::new(OllamaChatGenerator::from_env().with_model(&args.chat_model));
    let qa = DocumentQa::new(Arc::new(corpus), embedder(&args.embed_model), generator, &config);

    let host = args
        .host
        .or_else(|| std::env::var("DOCQA_HOST").ok())
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let port = args
        .port
        .or_else(|| std::env::var("DOCQA_PORT").ok().and_then(|value| value.parse::<u16>().ok()))
        .unwrap_or(5000);

    let state = AppState { qa: Arc::new(qa), image_dir: args.images };
    run_server(ServerConfig { host, port }, state).await
}
