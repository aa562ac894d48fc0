use std::path::PathBuf;

use clap::{Parser, Subcommand};
use docs_tutor::Result;
use docs_tutor::commands::{run_chat, run_ingest, run_status};
use docs_tutor::config::Config;

#[derive(Parser)]
#[command(name = "docs-tutor")]
#[command(about = "A retrieval-augmented AI tutor for the Streamlit documentation")]
#[command(version)]
struct Cli {
    /// Directory holding configuration and the ingested collection
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// Path to a TOML configuration file (defaults to config.toml in the
    /// data directory)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the documentation site and build the vector collection
    Ingest,
    /// Start an interactive question-answering session
    Chat,
    /// Show the state of the ingested collection
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(&cli.data_dir, path)?,
        None => Config::load(&cli.data_dir)?,
    };

    match cli.command {
        Commands::Ingest => {
            run_ingest(&config).await?;
        }
        Commands::Chat => {
            run_chat(&config).await?;
        }
        Commands::Status => {
            run_status(&config).await?;
        }
    }

    Ok(())
}
