//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - status: raw cluster probe output
//! - analyze: summarized cluster health report
//! - scan: summarized vulnerability scan
//! - brute: summarized credential brute-force test
//! - serve: HTTP API

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Clusterscope - probes a cluster and its workload, summarizes the findings
#[derive(Parser, Debug)]
#[command(name = "clusterscope")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print raw output of the cluster probes
    Status,

    /// Probe the cluster and summarize its health
    Analyze {
        /// Print the digest sent for summarization
        #[arg(short, long)]
        show_digest: bool,
    },

    /// Run the vulnerability scanner and summarize its report
    Scan {
        /// Print the digest sent for summarization
        #[arg(short, long)]
        show_digest: bool,
    },

    /// Run the login brute-force test and summarize the result
    Brute {
        /// Print the digest sent for summarization
        #[arg(short, long)]
        show_digest: bool,
    },

    /// Serve the HTTP API
    Serve {
        /// Address to bind (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
}
