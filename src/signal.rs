//! Cooperative cancellation.
//!
//! A [`CancelFlag`] is shared between the Ctrl+C handler and every stage of
//! the engine. Stages check it at queue operations and before file reads and
//! stop with [`DupError::Cancelled`](crate::error::DupError::Cancelled).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::warn;

/// Exit code for a run stopped by Ctrl+C (128 + SIGINT).
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Installs a process-wide Ctrl+C handler that trips the returned flag.
pub fn install_handler() -> Result<CancelFlag, ctrlc::Error> {
    let flag = CancelFlag::new();
    let handler_flag = flag.clone();
    ctrlc::set_handler(move || {
        warn!("Interrupted, stopping...");
        handler_flag.cancel();
    })?;
    Ok(flag)
}
