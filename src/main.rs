//! # docdex CLI
//!
//! Thin command-line surface over the docdex library.
//!
//! ```bash
//! docdex --config ./docdex.toml init
//! docdex --config ./docdex.toml add report.pdf
//! docdex --config ./docdex.toml list
//! docdex --config ./docdex.toml status <id>
//! docdex --config ./docdex.toml ask "What is the retention policy?"
//! docdex --config ./docdex.toml delete <id>
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use docdex::config::{load_config, Config};
use docdex::embedding::{EmbeddingGateway, HttpEmbedder};
use docdex::lifecycle::LifecycleManager;
use docdex::llm::create_model;
use docdex::parser::HttpParser;
use docdex::query::QueryEngine;
use docdex::store::VectorStore;

/// docdex — document ingestion and retrieval-augmented question answering.
#[derive(Parser)]
#[command(
    name = "docdex",
    about = "Ingest documents and answer questions grounded in their content",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./docdex.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Submit a document and follow its processing status until it
    /// completes or fails.
    Add {
        /// Path to the document file.
        file: PathBuf,

        /// Override the content type guessed from the file extension.
        #[arg(long)]
        content_type: Option<String>,

        /// Print the document id and exit without waiting.
        #[arg(long)]
        no_wait: bool,
    },

    /// List all documents with their status.
    List,

    /// Show one document's status.
    Status {
        /// Document id.
        id: String,
    },

    /// Delete a document and all its chunks.
    Delete {
        /// Document id.
        id: String,
    },

    /// Ask a question and print the answer with sources.
    Ask {
        question: String,

        /// Number of chunks to retrieve as context.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Retrieval only: print the most similar chunks without generating
    /// an answer.
    Search {
        question: String,

        #[arg(long)]
        top_k: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docdex=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = docdex::db::connect(&config.db).await?;
            docdex::migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("ok");
        }
        Commands::Add {
            file,
            content_type,
            no_wait,
        } => {
            let manager = build_manager(&config).await?;
            let bytes = std::fs::read(&file)?;
            let filename = file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("unknown")
                .to_string();
            let content_type =
                content_type.unwrap_or_else(|| guess_content_type(&file).to_string());

            let document = manager.submit(bytes, &filename, &content_type).await?;
            println!("submitted {} ({})", document.id, document.status);

            if !no_wait {
                follow_status(&manager, &document.id).await?;
            }
        }
        Commands::List => {
            let manager = build_manager(&config).await?;
            let documents = manager.list().await?;
            if documents.is_empty() {
                println!("No documents.");
            }
            for doc in documents {
                println!(
                    "{}  {:<10}  {:>4} chunks  {}",
                    doc.id, doc.status, doc.chunk_count, doc.filename
                );
                if let Some(ref err) = doc.error_message {
                    println!("    error: {err}");
                }
            }
        }
        Commands::Status { id } => {
            let manager = build_manager(&config).await?;
            let doc = manager.status(&id).await?;
            print_document(&doc);
        }
        Commands::Delete { id } => {
            let manager = build_manager(&config).await?;
            manager.delete(&id).await?;
            println!("deleted {id}");
        }
        Commands::Ask { question, top_k } => {
            let engine = build_engine(&config).await?;
            let top_k = top_k.unwrap_or(config.query.top_k);
            let result = engine.answer(&question, top_k).await?;

            println!("{}", result.answer);
            println!();
            if !result.grounded {
                println!("(no supporting passages found — answer may be unsupported)");
            }
            for (i, source) in result.sources.iter().enumerate() {
                let page = source
                    .page_number
                    .map(|p| format!(", page {p}"))
                    .unwrap_or_default();
                println!(
                    "[{}] {:.2}  {}{}",
                    i + 1,
                    source.score,
                    source.document_filename,
                    page
                );
            }
            println!("model: {}", result.model);
        }
        Commands::Search { question, top_k } => {
            let engine = build_engine(&config).await?;
            let top_k = top_k.unwrap_or(config.query.top_k);
            let hits = engine.search(&question, top_k).await?;

            if hits.is_empty() {
                println!("No results.");
            }
            for (i, hit) in hits.iter().enumerate() {
                let page = hit
                    .page_number
                    .map(|p| format!(", page {p}"))
                    .unwrap_or_default();
                println!("{}. [{:.2}] {}{}", i + 1, hit.score, hit.document_filename, page);
                println!("    \"{}\"", hit.text.replace('\n', " ").trim());
            }
        }
    }

    Ok(())
}

async fn build_manager(config: &Config) -> Result<LifecycleManager> {
    let pool = docdex::db::connect(&config.db).await?;
    docdex::migrate::run_migrations(&pool).await?;

    let store = VectorStore::new(pool);
    let parser = Arc::new(HttpParser::new(&config.parser)?);
    let embedder = Arc::new(HttpEmbedder::new(&config.embedding)?);
    let gateway = EmbeddingGateway::new(embedder, &config.embedding);

    Ok(LifecycleManager::new(
        store,
        parser,
        gateway,
        config.chunking.clone(),
    ))
}

async fn build_engine(config: &Config) -> Result<QueryEngine> {
    let pool = docdex::db::connect(&config.db).await?;
    docdex::migrate::run_migrations(&pool).await?;

    let store = VectorStore::new(pool);
    let embedder = Arc::new(HttpEmbedder::new(&config.embedding)?);
    let gateway = EmbeddingGateway::new(embedder, &config.embedding);
    let model: Arc<dyn docdex::llm::LanguageModel> = create_model(&config.llm)?.into();

    Ok(QueryEngine::new(
        store,
        gateway,
        model,
        &config.query,
        config.llm.timeout_secs,
    ))
}

/// Poll status until the document reaches a terminal state, printing each
/// transition. Status reads are side-effect-free, so polling is safe.
async fn follow_status(manager: &LifecycleManager, id: &str) -> Result<()> {
    let mut last = None;
    loop {
        let doc = manager.status(id).await?;
        if last != Some(doc.status) {
            println!("status: {}", doc.status);
            last = Some(doc.status);
        }
        if doc.status.is_terminal() {
            print_document(&doc);
            break;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    Ok(())
}

fn print_document(doc: &docdex::models::Document) {
    println!("id:       {}", doc.id);
    println!("file:     {} ({})", doc.filename, doc.content_type);
    println!("size:     {} bytes", doc.byte_size);
    println!("status:   {}", doc.status);
    println!("chunks:   {}", doc.chunk_count);
    if let Some(pages) = doc.page_count {
        println!("pages:    {pages}");
    }
    if let Some(ref err) = doc.error_message {
        println!("error:    {err}");
    }
    let created = chrono::DateTime::from_timestamp(doc.created_at, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();
    println!("created:  {created}");
}

fn guess_content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        Some("html") | Some("htm") => "text/html",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("doc") => "application/msword",
        _ => "application/octet-stream",
    }
}
