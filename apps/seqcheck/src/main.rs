//! seqcheck entry point.

mod app;
mod cli;
mod config;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize structured logging.
    let default_filter = if cli.verbose {
        "info,seqcheck=debug,seqcheck_transfer=debug,seqcheck_analysis=debug,seqcheck_pipeline=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = config::Config::load(cli.config.as_deref())?;

    let rt = tokio::runtime::Runtime::new()?;
    match cli.command {
        Commands::Analyze {
            file,
            chunk_size,
            output,
            tool,
            link,
            json,
        } => {
            if let Some(size) = chunk_size {
                config.chunk_size = size;
            }
            if let Some(dir) = output {
                config.output_root = dir;
            }
            if let Some(tool) = tool {
                config.tool = tool;
            }
            rt.block_on(app::analyze(config, &file, link.as_deref(), json))
        }
        Commands::Report {
            output_dir,
            unique_filename,
            link,
        } => rt.block_on(app::report(output_dir, unique_filename, link.as_deref())),
    }
}
