// order-assistant/crates/order-assistant/src/main.rs

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use order_assistant::{config::Config, run_chat, run_ingest, telemetry};

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "order-assistant", version, about = "Order-tracking assistant over a local Ollama server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Command {
    /// Embed every order and rewrite the index and metadata files
    Ingest,
    /// Chat about orders in the terminal
    Chat,
}

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing();

    let cfg = Config::from_env()?;

    match cli.command {
        Command::Ingest => {
            let report = run_ingest(&cfg).await?;
            println!("Índice construido con {} pedidos (dim={})", report.records, report.dimension);
        }
        Command::Chat => run_chat(&cfg).await?,
    }
    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    println!("CLI feature not enabled. Enable with --features cli");
}
