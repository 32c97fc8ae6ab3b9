use std::path::PathBuf;
use std::time::Instant;

use indicatif::{HumanBytes, HumanCount, ProgressBar, ProgressStyle};
use log::{debug, info};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::Config;
use crate::error::{DupError, Result};
use crate::hasher::{ConfirmationHasher, HashFailure};
use crate::report::{Checkpoint, ReportSink};
use crate::resolver::{DuplicateGroup, DuplicateResolver};
use crate::signal::CancelFlag;
use crate::store::{CandidateStore, StoreStats};
use crate::utils::format_human_elapsed;

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub initial: StoreStats,
    pub prefix_pruned: StoreStats,
    pub confirmed: StoreStats,
    pub empty_files: usize,
    pub groups: Vec<DuplicateGroup>,
    pub failures: Vec<HashFailure>,
}

/// Runs the prefix screen, the confirmation hash and the final regrouping.
#[derive(Debug, Clone)]
pub struct Engine {
    config: Config,
    cancel: CancelFlag,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn progress_bar(&self, len: u64, template: &str) -> ProgressBar {
        if !self.config.progress {
            return ProgressBar::hidden();
        }
        let style = ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        ProgressBar::new(len).with_style(style)
    }

    /// Extracts the identity of every path into a prefix-tier store.
    ///
    /// Extraction runs on a local pool of `workers` threads. The first
    /// failing insert, including a path listed twice, fails the run.
    pub fn build_store(&self, paths: &[PathBuf]) -> Result<CandidateStore> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .build()
            .map_err(|e| DupError::Config(e.to_string()))?;
        let progress = self.progress_bar(
            paths.len() as u64,
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} screening",
        );

        let store = CandidateStore::new(self.config.prefix_bytes);
        let result = pool.install(|| {
            paths.par_iter().try_for_each(|path| {
                if self.cancel.is_cancelled() {
                    return Err(DupError::Cancelled);
                }
                store.insert(path)?;
                progress.inc(1);
                Ok(())
            })
        });
        progress.finish_and_clear();
        result?;
        Ok(store)
    }

    pub fn run(&self, paths: &[PathBuf], sink: &mut dyn ReportSink) -> Result<RunReport> {
        self.config.validate()?;
        let start = Instant::now();
        info!(
            "Screening {} files on their first {} bytes",
            HumanCount(paths.len() as u64),
            self.config.prefix_bytes
        );

        let store = self.build_store(paths)?;
        let initial = store.stats();
        sink.checkpoint(Checkpoint::Initial, &initial);
        let empty_files = store.empty_file_records().len();
        if empty_files > 0 {
            debug!("{} empty files among the inputs", empty_files);
        }

        let candidates = store.prune();
        drop(store);
        let prefix_pruned = candidates.stats();
        sink.checkpoint(Checkpoint::PrefixPruned, &prefix_pruned);
        info!(
            "Prefix screen kept {} of {} files in {}",
            HumanCount(prefix_pruned.files as u64),
            HumanCount(initial.files as u64),
            format_human_elapsed(start.elapsed())
        );

        let total_bytes = candidates.total_bytes();
        let hasher = ConfirmationHasher::new(self.config.workers)
            .with_policy(self.config.on_error)
            .with_cancel(self.cancel.clone())
            .with_progress(self.progress_bar(
                total_bytes,
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ETA: {eta}",
            ));
        let resolution = DuplicateResolver::new(hasher).resolve(candidates)?;
        let confirmed = resolution.stats();
        sink.checkpoint(Checkpoint::Confirmed, &confirmed);

        info!(
            "Found {} duplicate sets ({} reclaimable) in {}",
            HumanCount(confirmed.groups as u64),
            HumanBytes(confirmed.duplicated_bytes),
            format_human_elapsed(start.elapsed())
        );

        Ok(RunReport {
            initial,
            prefix_pruned,
            confirmed,
            empty_files,
            groups: resolution.duplicate_groups(),
            failures: resolution.failures,
        })
    }
}
