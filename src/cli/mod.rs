//! CLI Module
//!
//! Command-line interface for the variant batch processor.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::engine::AudioFormat;

/// fxvariants - render randomized effect variants of audio files
#[derive(Parser, Debug)]
#[command(name = "fxvariants")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render variants for audio files or zip archives
    #[command(name = "process")]
    Process {
        /// Input audio files or zip archives
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long, default_value = "processed")]
        output: PathBuf,

        /// Variants per source file
        #[arg(short = 'n', long)]
        variants: Option<usize>,

        /// Output format
        #[arg(short, long)]
        format: Option<AudioFormat>,

        /// Seed for reproducible chains
        #[arg(long)]
        seed: Option<u64>,

        /// Worker threads (0 = one per core)
        #[arg(long)]
        workers: Option<usize>,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Package the outputs into processed_files.zip afterwards
        #[arg(long)]
        package: bool,

        /// Print the job report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Package an output directory into processed_files.zip
    #[command(name = "package")]
    Package {
        /// Output directory
        dir: PathBuf,
    },

    /// Remove every processed file and the archive
    #[command(name = "finalize")]
    Finalize {
        /// Output directory
        dir: PathBuf,
    },

    /// List the effect catalog and parameter ranges
    #[command(name = "catalog")]
    Catalog,
}
