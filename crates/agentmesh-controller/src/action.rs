//! The result of a single reconcile attempt, in the style of kube-rs's
//! `Action` type: either "come back in this long" or "wait for the next
//! watch event".

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Action {
    requeue_after: Option<Duration>,
}

impl Action {
    /// Requeue at this time even if no watch event arrives in the
    /// meantime — the fallback that keeps reconciliation self-healing.
    #[must_use]
    pub fn requeue(duration: Duration) -> Self {
        Self {
            requeue_after: Some(duration),
        }
    }

    /// Do nothing until a watch event lands on this key.
    #[must_use]
    pub fn await_change() -> Self {
        Self { requeue_after: None }
    }

    pub fn requeue_after(&self) -> Option<Duration> {
        self.requeue_after
    }
}
