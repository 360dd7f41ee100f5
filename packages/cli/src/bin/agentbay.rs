// ABOUTME: agentbay command-line entry point
// ABOUTME: Parses subcommands, installs logging and starts the server or migrations

use std::process;

use agentbay_cli::{run_migrations, run_server, Config};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "agentbay")]
#[command(about = "Agentbay - hosted AI agents with prepaid credits")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API (default)
    Serve {
        /// Override the PORT environment variable
        #[arg(long)]
        port: Option<u16>,
    },
    /// Apply database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    if let Err(e) = handle_command(cli.command.unwrap_or(Commands::Serve { port: None })).await {
        tracing::error!("{e:#}");
        process::exit(1);
    }
}

async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Serve { port } => {
            let mut config = Config::from_env()?;
            if let Some(port) = port {
                config = config.with_port(port)?;
            }
            run_server(config).await
        }
        Commands::Migrate => run_migrations(&Config::database_url_from_env()).await,
    }
}
