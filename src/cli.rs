use clap::{ArgGroup, Parser};
use std::path::PathBuf;

use crate::config::{Config, FailurePolicy};

#[derive(Parser, Debug)]
#[command(name = "check-dup-sets")]
#[command(version, about = "Find sets of duplicate files by screening their first bytes")]
#[command(group(ArgGroup::new("source").args(["path", "stdin"])))]
pub struct Cli {
    /// Directory to scan for duplicates
    pub path: Option<PathBuf>,

    /// Read file paths from stdin, one per line
    #[arg(long)]
    pub stdin: bool,

    /// Compare the first N bytes of each file before hashing in full
    #[arg(short, long, value_name = "N")]
    pub bytes: Option<usize>,

    /// Number of workers for full-content hashing (default: 2 x CPU cores)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Output only the final summary
    #[arg(short, long)]
    pub summarize: bool,

    /// What to do when a candidate file cannot be read
    #[arg(long, value_enum)]
    pub on_error: Option<FailurePolicy>,

    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write the duplicate sets as JSON to this file
    #[arg(long, value_name = "FILE")]
    pub json: Option<PathBuf>,

    /// Hide progress bars
    #[arg(long)]
    pub no_progress: bool,

    /// Enable debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Flags given on the command line win over the configuration file.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(bytes) = self.bytes {
            config.prefix_bytes = bytes;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(policy) = self.on_error {
            config.on_error = policy;
        }
        config.summary_only |= self.summarize;
        if self.no_progress {
            config.progress = false;
        }
    }
}
