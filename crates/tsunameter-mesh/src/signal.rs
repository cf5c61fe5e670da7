//! Termination signal.
//!
//! One per actor: each sensor node owns its own, and the base station shares
//! one between its polling loop, the satellite feed and the stop sentinel.
//! The cause is set at most once; the first cause wins and never reverts.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Why a run is ending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StopCause {
    /// The external stop sentinel was observed
    UserRequested,
    /// The base station ran its full iteration budget
    IterationBudgetExhausted,
}

impl fmt::Display for StopCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserRequested => write!(f, "user requested"),
            Self::IterationBudgetExhausted => write!(f, "iteration budget exhausted"),
        }
    }
}

/// Monotonic, set-once stop flag that suspension points can await.
#[derive(Debug, Clone)]
pub struct TerminationSignal {
    state: Arc<watch::Sender<Option<StopCause>>>,
}

impl Default for TerminationSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminationSignal {
    /// Create an unset signal.
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            state: Arc::new(state),
        }
    }

    /// Set the cause. Returns `false` if a cause was already set.
    pub fn trigger(&self, cause: StopCause) -> bool {
        self.state.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(cause);
            true
        })
    }

    /// The recorded cause, if any.
    pub fn cause(&self) -> Option<StopCause> {
        *self.state.borrow()
    }

    /// Whether termination has been signaled.
    pub fn is_set(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// Resolve once termination is signaled.
    pub async fn cancelled(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(Option::is_some).await;
    }

    /// Sleep for `duration` unless termination comes first.
    ///
    /// Returns `true` if the full duration elapsed.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}
