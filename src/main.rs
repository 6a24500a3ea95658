use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pkgvault::cli::{AdminCommands, run_admin};
use pkgvault::config::ServerConfig;
use pkgvault::registry::Registry;
use pkgvault::security::EnforcingPolicy;
use pkgvault::server::{AppState, create_router};
use pkgvault::storage::ArchiveStorage;
use pkgvault::store::{SqliteStore, Store};
use pkgvault::upstream::UpstreamClient;

#[derive(Parser)]
#[command(name = "pkgvault")]
#[command(about = "A private package index with access control", long_about = None)]
struct Cli {
    /// Log at debug level
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands (run locally, without role checks)
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// TOML config file; flags below override its values
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Host to bind to [default: 127.0.0.1]
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to [default: 8080]
        #[arg(long, short)]
        port: Option<u16>,

        /// Data directory for the database and archives [default: ./data]
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Let anyone create an account
        #[arg(long)]
        self_register: bool,

        /// Upstream index consulted for distributions not held locally (repeatable)
        #[arg(long = "backup-index")]
        backup_indexes: Vec<String>,
    },
}

fn init_tracing(debug: bool) -> anyhow::Result<()> {
    let directive = if debug { "pkgvault=debug" } else { "pkgvault=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();
    Ok(())
}

async fn run_serve(config: ServerConfig) -> anyhow::Result<()> {
    let db_path = config.db_path();
    if !db_path.exists() {
        bail!(
            "Server not initialized. Run 'pkgvault admin init' first to create the database at {}.",
            db_path.display()
        );
    }

    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;

    let registry = Registry::new(
        Arc::new(store),
        ArchiveStorage::new(&config.files_dir()),
        Arc::new(EnforcingPolicy),
    )
    .with_self_register(config.self_register);

    let upstream = if config.backup_indexes.is_empty() {
        None
    } else {
        info!("Backup indexes: {}", config.backup_indexes.join(", "));
        Some(UpstreamClient::new(config.backup_indexes.clone())?)
    };

    let state = Arc::new(AppState::new(Arc::new(registry), upstream));
    let app = create_router(state);
    let addr = config.socket_addr()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => {
            init_tracing(cli.debug)?;
            run_admin(command).await?;
        }
        Commands::Serve {
            config,
            host,
            port,
            data_dir,
            self_register,
            backup_indexes,
        } => {
            let mut config = match config {
                Some(path) => ServerConfig::load(&path)?,
                None => ServerConfig::default(),
            };
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.data_dir = data_dir;
            }
            if self_register {
                config.self_register = true;
            }
            if !backup_indexes.is_empty() {
                config.backup_indexes = backup_indexes;
            }
            config.debug |= cli.debug;

            init_tracing(config.debug)?;
            run_serve(config).await?;
        }
    }

    Ok(())
}
