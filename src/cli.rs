use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::stage::Stage;

/// stagescript - generates the shell script of each deployment pipeline stage
#[derive(Parser)]
#[command(name = "stagescript")]
#[command(about = "Generates deterministic deployment scripts for CD pipeline stages")]
#[command(version)]
pub struct Cli {
    /// Pipeline configuration file (JSON). Built-in defaults are used when omitted.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate the script and status record of one stage
    Generate {
        /// Stage code (e.g., host-prepare)
        #[arg(short, long)]
        stage: Stage,
        /// Instance store file (JSON array of instance definitions)
        #[arg(long)]
        store: PathBuf,
        /// Instance uuid (defaults to the configured environment variable)
        #[arg(short, long)]
        uuid: Option<String>,
        /// Output directory (overrides configuration and environment)
        #[arg(long)]
        build_dir: Option<PathBuf>,
    },
    /// Check that every instance definition in a store can be deployed
    Validate {
        /// Instance store file (JSON array of instance definitions)
        #[arg(long)]
        store: PathBuf,
    },
    /// List the pipeline stages and their script names
    Stages,
    /// Print the effective configuration, or save it to a file
    Config {
        /// Destination file (JSON); printed to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}
