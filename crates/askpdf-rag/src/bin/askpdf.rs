//! Ask questions about a document from the terminal
//!
//! Run with: cargo run -p askpdf-rag --bin askpdf -- report.pdf -q "What is this about?"

use std::io::Write;
use std::path::PathBuf;

use askpdf_rag::{DocumentPipeline, IndexCatalog, OllamaProvider, RagConfig, Session};
use clap::Parser;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "askpdf", version, about = "Ask questions about a PDF or markdown document")]
struct Cli {
    /// TOML configuration file (defaults plus ASKPDF_* overrides when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Document to ingest (.pdf, .md, .txt)
    document: PathBuf,

    /// Question to answer; repeat for several. Reads stdin when absent
    #[arg(short, long = "question")]
    questions: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "askpdf_rag=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = RagConfig::load(cli.config.as_deref())?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Index: {} ({} dims, alpha {})", config.index.name, config.index.dimensions, config.index.alpha);
    tracing::info!("  - Embedding model: {} ({:?})", config.embeddings.model, config.embeddings.backend);
    tracing::info!("  - LLM model: {}", config.llm.generate_model);
    tracing::info!("  - Chunk cache: {}", config.chunking.cache_dir.display());

    let ollama = OllamaProvider::new(&config.llm, &config.embeddings, &config.index)?;
    if !ollama.health_check().await {
        tracing::warn!("Ollama not available at {}", config.llm.base_url);
        tracing::warn!("  Start it with: ollama serve");
        tracing::warn!(
            "  Pull models: ollama pull {} && ollama pull {}",
            config.embeddings.model,
            config.llm.generate_model
        );
    }

    let catalog = IndexCatalog::new();
    let pipeline = DocumentPipeline::from_config(&config, &catalog, &ollama)?;
    let mut session = Session::new();

    let report = pipeline.ingest_file(&mut session, &cli.document).await?;
    eprintln!(
        "Indexed {} ({} chunks). Ask away.",
        report.document_id, report.chunk_count
    );

    if cli.questions.is_empty() {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let question = line.trim();
            if question.is_empty() {
                continue;
            }
            answer(&pipeline, &mut session, question).await?;
        }
    } else {
        for question in &cli.questions {
            answer(&pipeline, &mut session, question).await?;
        }
    }

    Ok(())
}

async fn answer(
    pipeline: &DocumentPipeline,
    session: &mut Session,
    question: &str,
) -> anyhow::Result<()> {
    let mut stream = pipeline.ask_stream(question).await?;
    let mut stdout = std::io::stdout();
    let mut full = String::new();

    while let Some(fragment) = stream.next().await {
        let fragment = fragment?;
        stdout.write_all(fragment.as_bytes())?;
        stdout.flush()?;
        full.push_str(&fragment);
    }
    writeln!(stdout)?;
    writeln!(stdout)?;

    session.record_exchange(question, full);
    Ok(())
}
