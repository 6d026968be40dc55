//! Command-line interface definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Interactive section-by-section document generation
#[derive(Debug, Parser)]
#[command(name = "dw", version, about)]
pub struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a document interactively in the terminal
    Run {
        /// What the document should cover
        query: String,

        /// Template type (see `dw templates`)
        #[arg(short, long, default_value = "Case Study")]
        template: String,

        /// Document id (generated when omitted)
        #[arg(long)]
        document_id: Option<String>,
    },

    /// Replay a stored document to the terminal
    Replay {
        /// Id of the document to replay
        document_id: String,
    },

    /// List known templates and their sections
    Templates,
}
