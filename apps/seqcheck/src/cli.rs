use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about = "FastQC analysis for uploaded sequencing reads", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ~/.config/seqcheck/seqcheck.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging for seqcheck crates
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload a FASTQ file through the chunked transfer and analyse it
    Analyze {
        /// Sequencing-read file (.fastq or .fq)
        file: PathBuf,
        /// Chunk size in bytes (0 = default)
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Parent directory for per-request reports
        #[arg(long)]
        output: Option<PathBuf>,
        /// Analysis tool executable
        #[arg(long)]
        tool: Option<PathBuf>,
        /// Write an HTML download link for the report to this file
        #[arg(long)]
        link: Option<PathBuf>,
        /// Print the finished job as JSON
        #[arg(long)]
        json: bool,
    },
    /// Retrieve the report of a finished analysis
    Report {
        /// Output directory of the request
        output_dir: PathBuf,
        /// Working file name the tool was run on
        unique_filename: String,
        /// Write an HTML download link instead of the raw report path
        #[arg(long)]
        link: Option<PathBuf>,
    },
}
