mod commands;
mod config;
mod render;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mirrorcal")]
#[command(about = "Mirror busy placeholders across your linked calendars")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sync pass over every enabled calendar
    Sync,
    /// Show what the ledger tracks per calendar
    Status {
        /// Only show this calendar (by id)
        #[arg(short, long)]
        calendar: Option<String>,
    },
    /// Link two calendars so they mirror each other
    Link { a: String, b: String },
    /// Remove the link between two calendars
    Unlink { a: String, b: String },
    /// Re-enable sync for a calendar
    Enable { calendar: String },
    /// Disable sync for a calendar and remove its footprint everywhere
    Disable { calendar: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sync => commands::sync::run().await,
        Commands::Status { calendar } => commands::status::run(calendar.as_deref()),
        Commands::Link { a, b } => commands::link::link(&a, &b),
        Commands::Unlink { a, b } => commands::link::unlink(&a, &b),
        Commands::Enable { calendar } => commands::enable::enable(&calendar),
        Commands::Disable { calendar } => commands::enable::disable(&calendar).await,
    }
}
