use std::fs;
use std::io;
use std::panic;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, bounded};
use indicatif::{HumanBytes, HumanCount, ProgressBar};
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::config::FailurePolicy;
use crate::error::{DupError, Result};
use crate::identity::{self, FileRecord};
use crate::signal::CancelFlag;

/// Slots per worker in the work and result queues.
const QUEUE_DEPTH: usize = 4;

/// A file that could not be read during confirmation.
#[derive(Debug, Clone, Serialize)]
pub struct HashFailure {
    pub path: PathBuf,
    pub error: String,
}

enum Outcome {
    Hashed(FileRecord),
    Failed(PathBuf, io::Error),
}

struct StopSignal<'a> {
    halted: AtomicBool,
    cancel: &'a CancelFlag,
}

impl StopSignal<'_> {
    fn halt(&self) {
        self.halted.store(true, Ordering::SeqCst);
    }

    fn is_set(&self) -> bool {
        self.halted.load(Ordering::SeqCst) || self.cancel.is_cancelled()
    }
}

/// Fixed pool of workers that read candidate files in full and attach their
/// content digest.
///
/// One feeder thread pushes records into a bounded work queue, `workers`
/// threads drain it, and the calling thread is the only consumer of the
/// result queue. The result queue closes once a closer thread has joined
/// every worker.
#[derive(Clone)]
pub struct ConfirmationHasher {
    workers: usize,
    policy: FailurePolicy,
    cancel: CancelFlag,
    progress: ProgressBar,
}

impl ConfirmationHasher {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            policy: FailurePolicy::default(),
            cancel: CancelFlag::new(),
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Progress is advanced by the byte size of each confirmed record.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Hashes every record and hands each confirmed one to `sink`, on the
    /// calling thread, in completion order.
    ///
    /// Under [`FailurePolicy::Abort`] the first unreadable file stops the run
    /// with [`DupError::Access`]. Under [`FailurePolicy::Report`] unreadable
    /// files are skipped and returned. An error from `sink` stops the run.
    pub fn run<F>(&self, records: Vec<FileRecord>, mut sink: F) -> Result<Vec<HashFailure>>
    where
        F: FnMut(FileRecord) -> Result<()>,
    {
        let total_files = records.len() as u64;
        let total_bytes: u64 = records.iter().map(|r| r.size).sum();
        info!(
            "Confirming {} candidates ({}) with {} workers",
            HumanCount(total_files),
            HumanBytes(total_bytes),
            self.workers
        );
        self.progress.set_length(total_bytes);

        let capacity = self.workers * QUEUE_DEPTH;
        let (work_tx, work_rx) = bounded::<FileRecord>(capacity);
        let (result_tx, result_rx) = bounded::<Outcome>(capacity);
        let stop = StopSignal {
            halted: AtomicBool::new(false),
            cancel: &self.cancel,
        };
        let stop = &stop;

        let outcome = thread::scope(|s| {
            s.spawn(move || feed(records, work_tx, stop));

            let handles: Vec<_> = (0..self.workers)
                .map(|_| {
                    let work = work_rx.clone();
                    let results = result_tx.clone();
                    s.spawn(move || hash_worker(work, results, stop))
                })
                .collect();
            drop(work_rx);

            s.spawn(move || {
                for handle in handles {
                    if let Err(payload) = handle.join() {
                        error!("Hash worker panicked");
                        panic::resume_unwind(payload);
                    }
                }
                drop(result_tx);
            });

            let mut failures = Vec::new();
            for msg in result_rx {
                if self.cancel.is_cancelled() {
                    stop.halt();
                    return Err(DupError::Cancelled);
                }
                match msg {
                    Outcome::Hashed(record) => {
                        self.progress.inc(record.size);
                        if let Err(e) = sink(record) {
                            stop.halt();
                            return Err(e);
                        }
                    }
                    Outcome::Failed(path, err) => match self.policy {
                        FailurePolicy::Abort => {
                            stop.halt();
                            return Err(DupError::access(path, err));
                        }
                        FailurePolicy::Report => {
                            warn!("Skipping '{}': {}", path.display(), err);
                            failures.push(HashFailure {
                                path,
                                error: err.to_string(),
                            });
                        }
                    },
                }
            }
            if self.cancel.is_cancelled() {
                return Err(DupError::Cancelled);
            }
            Ok(failures)
        });

        self.progress.finish_and_clear();
        if let Ok(failures) = &outcome {
            info!(
                "Confirmation complete: {} hashed, {} failed",
                HumanCount(total_files - failures.len() as u64),
                failures.len()
            );
        }
        outcome
    }
}

fn feed(records: Vec<FileRecord>, work: Sender<FileRecord>, stop: &StopSignal<'_>) {
    for record in records {
        if stop.is_set() || work.send(record).is_err() {
            break;
        }
    }
}

fn hash_worker(work: Receiver<FileRecord>, results: Sender<Outcome>, stop: &StopSignal<'_>) {
    while !stop.is_set() {
        let Ok(record) = work.recv() else { break };
        if stop.is_set() {
            break;
        }
        let outcome = match fs::read(&record.path) {
            Ok(data) => {
                let content_digest = identity::digest(&data);
                debug!(
                    "Content of '{}': {:016x}",
                    record.path.display(),
                    content_digest
                );
                Outcome::Hashed(record.confirmed(content_digest))
            }
            Err(e) => Outcome::Failed(record.path, e),
        };
        if results.send(outcome).is_err() {
            break;
        }
    }
}
