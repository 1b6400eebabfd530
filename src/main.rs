use anyhow::Context;
use clap::{Parser, Subcommand};
use risk_tracker::config::Config;
use risk_tracker::db::DatabaseManager;
use risk_tracker::service::RiskService;
use risk_tracker::{logging, server};
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "risk_tracker")]
#[command(about = "HTTP service for tracking risks")]
#[command(version)]
struct Cli {
    /// Optional TOML config file; environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for the daily rolling log files
    #[arg(long, global = true, default_value = "logs")]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the schema if needed, then serve the HTTP API
    Serve {
        /// Port to listen on (overrides RISKS_PORT and the config file)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Create the schema and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let _log_guard = logging::init_logging(&cli.log_dir)?;
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Migrate => {
            let db = DatabaseManager::open(&config.database)
                .await
                .context("error initializing database")?;
            db.run_migrations().await.context("error running migrations")?;
        }
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }

            info!("Initializing database...");
            let db = Arc::new(
                DatabaseManager::open(&config.database)
                    .await
                    .context("error initializing database")?,
            );
            db.run_migrations().await.context("error running migrations")?;

            let service = Arc::new(RiskService::new(db.clone()));
            let address = config.server.bind_address();
            let listener =
                TcpListener::bind(&address).with_context(|| format!("failed to bind {address}"))?;

            info!("Starting HTTP server...");
            server::start_server(
                listener,
                service,
                server::shutdown_signal(),
                config.server.shutdown_timeout(),
            )
            .await?;

            match db.close() {
                Ok(()) => info!("Successfully and gracefully closed database connection"),
                Err(e) => error!("Failed to gracefully close database connection: {e}"),
            }
            info!("Exiting risks service");
        }
    }

    Ok(())
}
