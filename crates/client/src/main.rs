//! Blindfeed client CLI
//!
//! ```bash
//! blindfeed-client sync 127.0.0.1:8000 ds1
//! blindfeed-client query 127.0.0.1:8000 ds1 evil.com
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use blindfeed_client::{Client, QueryResult};

#[derive(Parser)]
#[command(name = "blindfeed-client")]
#[command(version)]
#[command(about = "Query indicators against a blindfeed server without revealing them")]
struct Cli {
    /// Directory for local mirrors, keyed by server and dataset
    #[arg(long, env = "BLINDFEED_CLIENT_DIR", default_value = "blindfeed-client-data")]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch changes from the server and update the local mirror
    Sync {
        /// Server as host:port or URL
        server: String,

        /// Dataset name
        dataset: String,

        /// Override the last known chain hash
        #[arg(long)]
        hash: Option<String>,
    },

    /// Discard local state and fetch a fresh full replay
    Reset {
        /// Server as host:port or URL
        server: String,

        /// Dataset name
        dataset: String,
    },

    /// Delete local state without contacting the server
    Purge {
        /// Server as host:port or URL
        server: String,

        /// Dataset name
        dataset: String,
    },

    /// Query an indicator and decrypt its metadata on a match
    Query {
        /// Server as host:port or URL
        server: String,

        /// Dataset name
        dataset: String,

        /// Indicator to look up, exactly as it appears in the source
        ioc: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blindfeed_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sync {
            server,
            dataset,
            hash,
        } => {
            let client = Client::new(&server, cli.state_dir);
            let report = match hash {
                Some(hash) => client.sync_since(&dataset, Some(&hash)).await?,
                None => client.sync(&dataset).await?,
            };
            println!(
                "Synced '{dataset}': {} records applied ({})",
                report.applied,
                report.mode.as_str()
            );
        }
        Commands::Reset { server, dataset } => {
            let client = Client::new(&server, cli.state_dir);
            let report = client.reset(&dataset).await?;
            println!("Reset '{dataset}': {} records applied", report.applied);
        }
        Commands::Purge { server, dataset } => {
            let client = Client::new(&server, cli.state_dir);
            client.purge(&dataset)?;
            println!("Purged local state for '{dataset}'");
        }
        Commands::Query {
            server,
            dataset,
            ioc,
        } => {
            let client = Client::new(&server, cli.state_dir);
            match client.query(&dataset, &ioc).await? {
                QueryResult::Match(metadata) => {
                    println!("Match found.");
                    println!("Metadata: {}", String::from_utf8_lossy(&metadata));
                }
                QueryResult::NoMatch => {
                    println!("No match (not present or removed).");
                }
                QueryResult::DecryptFailed => {
                    println!("Entry present but metadata failed to decrypt; try 'reset'.");
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
