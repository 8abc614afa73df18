use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use branchdrift_core::DriftError;

/// Shared cancellation signal observed by sampling workers.
///
/// Clones share one flag. Workers poll it between samples, so a cancelled
/// worker stops after the git invocation it is currently running.
///
/// # Examples
///
/// ```
/// use branchdrift_history::CancelFlag;
///
/// let flag = CancelFlag::new();
/// let worker = flag.clone();
/// assert!(worker.check().is_ok());
/// flag.cancel();
/// assert!(worker.check().is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// A flag that has not been raised.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag for every clone.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fail with [`DriftError::Cancelled`] if the flag is raised.
    ///
    /// # Errors
    ///
    /// Returns [`DriftError::Cancelled`] after cancellation.
    pub fn check(&self) -> Result<(), DriftError> {
        if self.is_cancelled() {
            Err(DriftError::Cancelled)
        } else {
            Ok(())
        }
    }
}
