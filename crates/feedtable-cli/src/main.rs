use clap::{Parser, Subcommand};
use feedtable_core::IngestRequest;
use feedtable_ingest::IngestionHandler;
use tracing_subscriber::EnvFilter;


#[derive(Debug, Parser)]
#[command(name = "feedtable-cli")]
#[command(about = "Ingest syndication feeds into a table store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch one feed and store its entries, then print the outcome as JSON.
    Ingest {
        /// Feed URL.
        #[arg(long)]
        url: String,
        /// Store account; falls back to `FEEDTABLE_DEFAULT_ACCOUNT`.
        #[arg(long)]
        account: Option<String>,
        /// Table name; falls back to `FEEDTABLE_DEFAULT_TABLE`.
        #[arg(long)]
        table: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = feedtable_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Ingest {
            url,
            account,
            table,
        } => {
            let handler = IngestionHandler::from_app_config(&config)?;
            let request = IngestRequest {
                url: Some(url),
                account,
                table,
            };
            let outcome = match handler.handle(request).await {
                Ok(outcome) => outcome,
                Err(e) => anyhow::bail!(
                    "ingestion aborted at {} stage ({}): {e}",
                    e.stage(),
                    e.code()
                ),
            };
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if let Some(first) = outcome.first_failure() {
                tracing::warn!(
                    failed = outcome.failed,
                    first_failure = %first,
                    "some entries were not stored"
                );
            }
        }
    }

    Ok(())
}
