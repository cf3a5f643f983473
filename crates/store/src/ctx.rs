//! Operation context - cancellation and deadlines
//!
//! Every core operation takes an [`OpCtx`]. The engine checks it before
//! each storage round-trip; a cancelled or expired context makes the
//! operation return early, dropping (and thereby rolling back) whatever
//! transaction was in flight.

use crate::error::StoreError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared cancellation flag handed in by the caller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a new non-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Per-operation context: cancellation token plus optional deadline.
#[derive(Debug, Clone, Default)]
pub struct OpCtx {
    cancel: CancelToken,
    deadline: Option<Instant>,
}

impl OpCtx {
    /// A context that never cancels and never expires.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context expiring `budget` from now.
    pub fn with_timeout(budget: Duration) -> Self {
        Self {
            cancel: CancelToken::new(),
            deadline: Some(Instant::now() + budget),
        }
    }

    /// A context driven by the caller's cancellation token.
    pub fn with_cancel(cancel: CancelToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    /// Add a deadline to this context.
    pub fn and_timeout(mut self, budget: Duration) -> Self {
        self.deadline = Some(Instant::now() + budget);
        self
    }

    /// The caller's token, for wiring into sub-operations.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Fail fast if the operation should stop.
    ///
    /// Cancellation is reported before deadline expiry when both hold.
    pub fn ensure_live(&self) -> Result<(), StoreError> {
        if self.cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(StoreError::DeadlineExceeded);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_is_live() {
        assert!(OpCtx::background().ensure_live().is_ok());
    }

    #[test]
    fn test_cancel_observed() {
        let token = CancelToken::new();
        let ctx = OpCtx::with_cancel(token.clone());
        assert!(ctx.ensure_live().is_ok());

        token.cancel();
        assert!(matches!(ctx.ensure_live(), Err(StoreError::Cancelled)));
    }

    #[test]
    fn test_deadline_expires() {
        let ctx = OpCtx::with_timeout(Duration::from_secs(0));
        assert!(matches!(
            ctx.ensure_live(),
            Err(StoreError::DeadlineExceeded)
        ));
    }

    #[test]
    fn test_cancel_wins_over_deadline() {
        let token = CancelToken::new();
        token.cancel();
        let ctx = OpCtx::with_cancel(token).and_timeout(Duration::from_secs(0));
        assert!(matches!(ctx.ensure_live(), Err(StoreError::Cancelled)));
    }
}
