//! Mutation exclusion for mirror state
//!
//! The in-memory tree is rebuilt wholesale by scans and touched pointwise by
//! rename/reparent operations driven by uploads. A rebuild must never start
//! while such a structural mutation is outstanding, so every long-running
//! engine operation holds the single mutation token for its duration.

use crate::error::SyncError;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Single token gating structural mutation of the mirror state.
///
/// Cloning shares the token. Acquisition is non-blocking: a caller that finds
/// the token taken gets `OperationInProgress` rather than queueing, which is
/// what lets the UI surface "still running" instead of silently stacking work.
#[derive(Clone)]
pub struct MutationToken {
    inner: Arc<Mutex<()>>,
}

/// Guard proving the holder may mutate mirror state. Released on drop, on
/// every path, including failure paths.
pub struct MutationGuard {
    _guard: OwnedMutexGuard<()>,
}

impl MutationToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(())),
        }
    }

    /// Try to take the token without waiting.
    pub fn try_acquire(&self) -> Result<MutationGuard, SyncError> {
        match self.inner.clone().try_lock_owned() {
            Ok(guard) => Ok(MutationGuard { _guard: guard }),
            Err(_) => Err(SyncError::OperationInProgress),
        }
    }
}

impl Default for MutationToken {
    fn default() -> Self {
        Self::new()
    }
}
