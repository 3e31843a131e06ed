//! Blindfeed server binary
//!
//! Serves the OPRF-evaluation and change-log endpoints, and carries the
//! dataset administration commands: create, remove, sync, rekey, purge.
//!
//! ```bash
//! blindfeed-server create ds1
//! blindfeed-server sync ds1 feeds/ds1.csv
//! blindfeed-server serve --port 8000
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use blindfeed_server::{routes, AppState, DatasetStore, ServerConfig, Storage, ALGORITHM_CLASSIC};

#[derive(Parser)]
#[command(name = "blindfeed-server")]
#[command(version)]
#[command(about = "Blindfeed dataset server and administration CLI")]
struct Cli {
    /// Root directory holding one subdirectory per dataset
    #[arg(long, env = "BLINDFEED_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Bind address
        #[arg(long, env = "BLINDFEED_BIND_ADDR")]
        bind: Option<String>,

        /// Port
        #[arg(long, env = "BLINDFEED_PORT")]
        port: Option<u16>,
    },

    /// Create a dataset: schema plus a fresh private key
    Create {
        /// Dataset name
        name: String,

        /// Algorithm tag (only "classic" is supported)
        #[arg(long, default_value = ALGORITHM_CLASSIC)]
        algorithm: String,

        /// Informational rekey interval recorded in the schema
        #[arg(long, default_value = "30d")]
        rekey_interval: String,
    },

    /// Remove a dataset's schema and key, keeping index and log
    Remove {
        /// Dataset name
        name: String,
    },

    /// Diff a source file against the index and append the changes
    Sync {
        /// Dataset name
        name: String,

        /// Source file with one `ioc,metadata` pair per line
        source: PathBuf,
    },

    /// Rotate the private key and rebuild index and log from scratch
    Rekey {
        /// Dataset name
        name: String,

        /// Source file with one `ioc,metadata` pair per line
        source: PathBuf,
    },

    /// Delete a dataset directory entirely
    Purge {
        /// Dataset name
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blindfeed_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = ServerConfig::from_env();
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    match cli.command {
        Commands::Serve { bind, port } => {
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            if let Some(port) = port {
                config.port = port;
            }
            serve(config).await
        }
        Commands::Create {
            name,
            algorithm,
            rekey_interval,
        } => {
            let store = DatasetStore::new(Storage::new(config.data_dir));
            store.create_dataset(&name, &algorithm, &rekey_interval)?;
            println!("Created dataset '{name}'");
            Ok(())
        }
        Commands::Remove { name } => {
            let store = DatasetStore::new(Storage::new(config.data_dir));
            store.remove_dataset(&name)?;
            println!("Removed schema and key for '{name}'");
            Ok(())
        }
        Commands::Sync { name, source } => {
            let store = DatasetStore::new(Storage::new(config.data_dir));
            let pairs = blindfeed_server::read_source_file(&source)?;
            let summary = store.sync_from_source(&name, pairs)?;
            println!(
                "Synced '{name}': {} added, {} removed",
                summary.added, summary.removed
            );
            Ok(())
        }
        Commands::Rekey { name, source } => {
            let store = DatasetStore::new(Storage::new(config.data_dir));
            let pairs = blindfeed_server::read_source_file(&source)?;
            let summary = store.rekey(&name, pairs)?;
            println!("Rekeyed '{name}': {} entries re-encrypted", summary.added);
            Ok(())
        }
        Commands::Purge { name } => {
            let store = DatasetStore::new(Storage::new(config.data_dir));
            store.purge_dataset(&name)?;
            println!("Purged dataset '{name}'");
            Ok(())
        }
    }
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    tracing::info!("starting blindfeed server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("data directory: {:?}", config.data_dir);
    tracing::info!("bind address: {}", config.bind_address());

    let state = AppState::new(config.clone());

    let app = routes::create_router(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    let addr: std::net::SocketAddr = config.bind_address().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("server listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
