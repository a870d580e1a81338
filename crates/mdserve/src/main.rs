//! mdserve CLI - serve Markdown sites as HTML.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "mdserve")]
#[command(about = "Serve Markdown documents as HTML pages")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to mdserve.toml config file
    #[arg(short, long, default_value = "mdserve.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the document root over HTTP
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "7777")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Document root (defaults to config)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Do not watch the root for changes
        #[arg(long)]
        no_watch: bool,
    },

    /// Render every document to static HTML
    Build {
        /// Output directory
        #[arg(short, long, default_value = "dist")]
        output: PathBuf,

        /// Document root (defaults to config)
        #[arg(short, long)]
        root: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Serve {
            port,
            host,
            root,
            no_watch,
        } => {
            commands::serve::run(&cli.config, root, host, port, !no_watch).await?;
        }
        Commands::Build { output, root } => {
            commands::build::run(&cli.config, root, output).await?;
        }
    }

    Ok(())
}
