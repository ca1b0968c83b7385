//! Reconcile Scheduler (§4.2): a fixed-size worker pool draining a per-key
//! coalescing queue. At most one worker holds a given key at a time; two
//! enqueues of the same key while a reconcile is in flight collapse to one
//! pending rerun via a dirty flag.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use agentmesh_core::ResourceRef;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::action::Action;
use crate::error::ControllerResult;

pub type ReconcileFuture = Pin<Box<dyn Future<Output = ControllerResult<Action>> + Send>>;
pub type ReconcileFn = Arc<dyn Fn(ResourceRef) -> ReconcileFuture + Send + Sync>;

#[derive(Default)]
struct KeyState {
    in_flight: bool,
    dirty: bool,
    attempt: u32,
}

/// Capped exponential backoff: `base * 2^attempt`, capped at `max` (§4.2).
fn backoff_for(attempt: u32, base: Duration, max: Duration) -> Duration {
    let scaled = base.saturating_mul(1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX));
    scaled.min(max)
}

pub struct SchedulerConfig {
    pub workers: usize,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            backoff_base: Duration::from_millis(250),
            backoff_max: Duration::from_secs(60),
        }
    }
}

/// Fair, coalescing scheduler. Owns no resource state itself — the caller
/// supplies a `reconcile_fn` closure that performs the actual work and
/// returns an [`Action`].
pub struct ReconcileScheduler {
    states: Arc<DashMap<ResourceRef, Mutex<KeyState>>>,
    sender: mpsc::UnboundedSender<ResourceRef>,
    workers: Vec<JoinHandle<()>>,
}

impl ReconcileScheduler {
    pub fn start(config: SchedulerConfig, reconcile_fn: ReconcileFn) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel::<ResourceRef>();
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let states: Arc<DashMap<ResourceRef, Mutex<KeyState>>> = Arc::new(DashMap::new());

        let mut workers = Vec::with_capacity(config.workers);
        for worker_id in 0..config.workers {
            let receiver = receiver.clone();
            let states = states.clone();
            let reconcile_fn = reconcile_fn.clone();
            let sender = sender.clone();
            let backoff_base = config.backoff_base;
            let backoff_max = config.backoff_max;

            workers.push(tokio::spawn(async move {
                loop {
                    let key = {
                        let mut rx = receiver.lock().await;
                        match rx.recv().await {
                            Some(k) => k,
                            None => break,
                        }
                    };

                    tracing::debug!(worker = worker_id, key = %key, "reconciling");
                    let result = reconcile_fn(key.clone()).await;

                    let mut requeue_after = None;
                    match &result {
                        Ok(action) => {
                            if let Some(entry) = states.get(&key) {
                                entry.lock().attempt = 0;
                            }
                            requeue_after = action.requeue_after();
                        }
                        Err(e) if e.is_transient() => {
                            let attempt = states
                                .get(&key)
                                .map(|entry| {
                                    let mut s = entry.lock();
                                    s.attempt += 1;
                                    s.attempt
                                })
                                .unwrap_or(1);
                            requeue_after = Some(backoff_for(attempt, backoff_base, backoff_max));
                            tracing::warn!(key = %key, attempt, error = %e, "transient reconcile failure, backing off");
                        }
                        Err(e) => {
                            tracing::error!(key = %key, error = %e, "reconcile failed");
                        }
                    }

                    let still_dirty = {
                        if let Some(entry) = states.get(&key) {
                            let mut s = entry.lock();
                            if s.dirty {
                                s.dirty = false;
                                true
                            } else {
                                s.in_flight = false;
                                false
                            }
                        } else {
                            false
                        }
                    };

                    if still_dirty {
                        let _ = sender.send(key);
                    } else if let Some(delay) = requeue_after {
                        let sender = sender.clone();
                        let key = key.clone();
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            let _ = sender.send(key);
                        });
                    }
                }
            }));
        }

        Self {
            states,
            sender,
            workers,
        }
    }

    /// Enqueue `key`. If a reconcile for `key` is already in flight, this
    /// collapses into the dirty flag rather than queuing a second run
    /// (§4.2: "Two enqueues of the same key while an in-flight reconcile
    /// runs collapse to at most one pending run").
    pub fn enqueue(&self, key: ResourceRef) {
        let entry = self.states.entry(key.clone()).or_default();
        let mut state = entry.lock();
        if state.in_flight {
            state.dirty = true;
            return;
        }
        state.in_flight = true;
        drop(state);
        let _ = self.sender.send(key);
    }

    pub fn enqueue_many(&self, keys: impl IntoIterator<Item = ResourceRef>) {
        for key in keys {
            self.enqueue(key);
        }
    }

    pub async fn shutdown(self) {
        drop(self.sender);
        for w in self.workers {
            let _ = w.await;
        }
    }
}

impl std::fmt::Debug for ReconcileScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcileScheduler")
            .field("pending_keys", &self.states.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentmesh_core::ResourceKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(name: &str) -> ResourceRef {
        ResourceRef::new(ResourceKind::Agent, "default", name)
    }

    #[test]
    fn backoff_grows_and_caps() {
        let base = Duration::from_millis(100);
        let max = Duration::from_secs(10);
        assert_eq!(backoff_for(0, base, max), Duration::from_millis(100));
        assert_eq!(backoff_for(1, base, max), Duration::from_millis(200));
        assert_eq!(backoff_for(10, base, max), max);
    }

    #[tokio::test]
    async fn coalesces_duplicate_enqueues_into_one_run() {
        let counter = Arc::new(AtomicUsize::new(0));
        let seen_counter = counter.clone();
        let gate = Arc::new(tokio::sync::Notify::new());
        let worker_gate = gate.clone();

        let reconcile_fn: ReconcileFn = Arc::new(move |_key| {
            let counter = seen_counter.clone();
            let gate = worker_gate.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                gate.notified().await;
                Ok(Action::await_change())
            })
        });

        let scheduler = ReconcileScheduler::start(
            SchedulerConfig {
                workers: 1,
                ..Default::default()
            },
            reconcile_fn,
        );

        let k = key("my-agent");
        scheduler.enqueue(k.clone());
        // give the worker a chance to pick it up and block on the gate
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        scheduler.enqueue(k.clone());
        scheduler.enqueue(k.clone());

        gate.notify_one();
        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.notify_one();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // one run consumed the initial enqueue, the second run (post-gate)
        // consumed both coalesced duplicates: total runs == 2, not 3.
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
