use std::fs;
use std::path::Path;

use clap::ValueEnum;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{DupError, Result};
use crate::identity::DEFAULT_PREFIX_BYTES;

/// What the confirmation stage does with a file it cannot read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the whole run at the first unreadable file.
    #[default]
    Abort,
    /// Skip unreadable files and list them next to the duplicate sets.
    Report,
}

/// Run settings.
///
/// Read from an optional TOML file; every key may be omitted:
///
/// ```toml
/// prefix_bytes = 4096
/// workers = 16
/// summary_only = false
/// on_error = "abort"
/// progress = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Leading bytes digested per file for the screening tier.
    pub prefix_bytes: usize,
    /// Size of the confirmation hashing pool.
    pub workers: usize,
    /// Print only the final summary.
    pub summary_only: bool,
    pub on_error: FailurePolicy,
    /// Show progress bars on the terminal.
    pub progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix_bytes: DEFAULT_PREFIX_BYTES,
            workers: default_workers(),
            summary_only: false,
            on_error: FailurePolicy::default(),
            progress: true,
        }
    }
}

/// Twice the available parallelism.
pub fn default_workers() -> usize {
    let threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    threads * 2
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| DupError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading configuration from '{}'", path.display());
        let content = fs::read_to_string(path)
            .map_err(|e| DupError::Config(format!("cannot read '{}': {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.prefix_bytes == 0 {
            return Err(DupError::Config("prefix_bytes must be greater than 0".into()));
        }
        if self.workers == 0 {
            return Err(DupError::Config("workers must be greater than 0".into()));
        }
        Ok(())
    }
}
