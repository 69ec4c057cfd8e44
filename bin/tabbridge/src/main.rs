use std::path::PathBuf;

use tabbridge::commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "tabbridge")]
#[command(about = "Bridge server between MCP clients and a browser agent", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bridge server (long-running daemon)
    Serve {
        /// Port to listen on (overrides config server.port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides config server.host)
        #[arg(long)]
        host: Option<String>,

        /// Path to a JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show health of a running bridge
    Status {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(short, long, default_value_t = 6009)]
        port: u16,
    },

    /// Force a stale-session sweep on a running bridge
    Cleanup {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(short, long, default_value_t = 6009)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Serve { port, host, config } => {
            commands::serve::run(host, port, config).await?;
        }
        Commands::Status { host, port } => {
            commands::status::run(host, port).await?;
        }
        Commands::Cleanup { host, port } => {
            commands::cleanup::run(host, port).await?;
        }
    }

    Ok(())
}
