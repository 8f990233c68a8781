// ABOUTME: Cooperative cancellation shared between the CLI and the engines
// ABOUTME: A Ctrl-C listener flips the flag; engines poll it at record boundaries

use crate::error::{EngineError, EngineResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cheaply cloneable cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    canceled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    /// Returns `Err(EngineError::Canceled)` once [`cancel`](Self::cancel) was called.
    pub fn check(&self) -> EngineResult<()> {
        if self.is_canceled() {
            Err(EngineError::Canceled)
        } else {
            Ok(())
        }
    }

    /// Spawn a task on the current tokio runtime that cancels this token on Ctrl-C.
    pub fn cancel_on_ctrl_c(&self) {
        let token = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, stopping at the next record boundary...");
                token.cancel();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(token.check().is_ok());

        other.cancel();

        assert!(token.is_canceled());
        assert!(matches!(token.check(), Err(EngineError::Canceled)));
    }
}
