pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod identity;
pub mod logging;
pub mod report;
pub mod resolver;
pub mod scanner;
pub mod signal;
pub mod store;
pub mod utils;

pub use cli::Cli;
pub use config::{Config, FailurePolicy};
pub use engine::{Engine, RunReport};
pub use error::DupError;
pub use hasher::{ConfirmationHasher, HashFailure};
pub use identity::{FileRecord, digest, extract};
pub use report::{Checkpoint, ConsoleSink, RecordingSink, ReportSink};
pub use resolver::{DuplicateGroup, DuplicateResolver, Resolution};
pub use signal::CancelFlag;
pub use store::{CandidateStore, GroupKey, StoreStats, Tier};
