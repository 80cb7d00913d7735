//! Entry points behind the `ingest` and `chat` subcommands

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use crate::config::{Config, PromptConfiguration};
use crate::ingest::{IngestPipeline, IngestReport, OllamaEmbedder};
use crate::llm::OllamaClient;
use crate::records::RecordStore;
use crate::session::{SessionContext, SessionRegistry};

const TERMINAL_SESSION: &str = "terminal";
const EXIT_COMMANDS: [&str; 2] = ["/salir", "/exit"];

/// Rebuild the index and metadata artifacts from the record source.
pub async fn run_ingest(cfg: &Config) -> Result<IngestReport> {
    cfg.print_config();

    let store = RecordStore::load(&cfg.records_file)
        .with_context(|| format!("cannot load orders from {}", cfg.records_file.display()))?;

    let embedder = OllamaEmbedder::new(&cfg.ollama_host, &cfg.embedding_model, cfg.llm_timeout());
    let pipeline = IngestPipeline::new(Arc::new(embedder)).with_batch_size(cfg.embed_batch_size);

    let report = pipeline
        .run(store.records(), store.sources(), &cfg.artifact_paths())
        .await
        .context("ingestion failed, previous artifacts left in place")?;

    info!(
        "Wrote {} and {}",
        report.index_path.display(),
        report.metadata_path.display()
    );
    Ok(report)
}

/// Line-oriented chat over a single session until EOF or an exit command.
pub async fn run_chat(cfg: &Config) -> Result<()> {
    cfg.print_config();

    let prompts = PromptConfiguration::load(&cfg.settings_file)?;
    let store = RecordStore::load(&cfg.records_file)
        .with_context(|| format!("cannot load orders from {}", cfg.records_file.display()))?;
    let backend = OllamaClient::new(&cfg.ollama_host, cfg.llm_timeout());

    let context = SessionContext::new(
        Arc::new(prompts),
        Arc::new(store),
        Arc::new(backend),
        cfg.llm_timeout(),
    )
    .with_history_window(cfg.history_window_turns);
    let registry = SessionRegistry::new(context);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    stdout.write_all("Asistente de pedidos. Escribe /salir para terminar.\n".as_bytes()).await?;
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if EXIT_COMMANDS.contains(&text) {
            break;
        }

        let outcome = registry.send(TERMINAL_SESSION, text).await;
        if outcome.failed {
            warn!("Turn failed; the error was shown to the user");
        }
        stdout.write_all(format!("{}\n", outcome.reply).as_bytes()).await?;
    }

    registry.end_session(TERMINAL_SESSION);
    Ok(())
}
