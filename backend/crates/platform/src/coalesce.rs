//! Coalescing Work Queue
//!
//! Defers an expensive per-key operation (a spreadsheet formula recompute)
//! and collapses repeated signals for the same key into one run.
//!
//! ## State machine (whole queue, not per key)
//!
//! - `Idle`: no timer armed.
//! - `Armed`: one timer armed, fires `min_delay` after it was armed.
//!   Further signals overwrite their key's entry but never reset the timer.
//! - `Flushing`: the timer fired. The pending map is taken as one batch.
//!   Entries younger than `min_delay - guard` are put back for the next
//!   cycle; the rest run the operation, one failure never stopping its
//!   siblings. Afterwards the queue re-arms if anything is pending.
//!   Flushes never overlap: a timer that fires during a slow batch waits
//!   for it to finish.
//!
//! Only the latest credential for a key is kept. A key signalled without a
//! usable credential is skipped at flush time.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::{FutureExt, StreamExt};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::rate_limit::now_ms;

/// Queue timing configuration
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Delay between arming the timer and flushing
    pub min_delay: Duration,
    /// Slack that keeps a just-arrived entry from being processed
    pub guard: Duration,
    /// Recomputes run at once inside one flush (1 = sequential)
    pub flush_concurrency: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(5_000),
            guard: Duration::from_millis(50),
            flush_concurrency: 1,
        }
    }
}

impl QueueConfig {
    /// Minimum age for an entry to count as settled
    pub fn settle_threshold(&self) -> Duration {
        self.min_delay.saturating_sub(self.guard)
    }
}

/// Failure of the external recompute operation
#[derive(Debug, Clone, thiserror::Error)]
pub enum RecomputeError {
    #[error("Document store rejected the credential")]
    Unauthorized,

    #[error("Document store returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Document store unreachable: {0}")]
    Transport(String),

    #[error("Recompute panicked")]
    Panicked,
}

/// The expensive operation run once per settled key
#[trait_variant::make(Recompute: Send)]
pub trait LocalRecompute {
    async fn recompute(&self, key: &str, credential: &str) -> Result<(), RecomputeError>;
}

#[derive(Debug)]
struct PendingEntry {
    enqueued_at: Instant,
    enqueued_at_ms: i64,
    credential: Option<String>,
}

/// Read-only view of a pending key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSnapshot {
    pub key: String,
    pub enqueued_at_ms: i64,
}

/// Lifetime counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Signals accepted by `schedule`
    pub scheduled: u64,
    /// Recomputes that succeeded
    pub completed: u64,
    /// Recomputes that returned an error
    pub failed: u64,
    /// Entries dropped for lack of a credential
    pub skipped: u64,
    /// Entries put back because they had not settled
    pub deferred: u64,
    /// Timer firings
    pub flushes: u64,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: HashMap<String, PendingEntry>,
    timer: Option<JoinHandle<()>>,
    flushing: bool,
    disposed: bool,
    last_completed: HashMap<String, i64>,
    stats: QueueStats,
}

struct Inner<R> {
    config: QueueConfig,
    recompute: Arc<R>,
    state: Mutex<QueueState>,
    /// Held for a whole flush so batches never overlap
    flush_gate: tokio::sync::Mutex<()>,
}

/// Debounced, coalescing scheduler for one kind of deferred work
///
/// Cheap to clone; clones share the same queue. Must be used from inside a
/// tokio runtime because arming spawns the timer task.
pub struct CoalescingQueue<R> {
    inner: Arc<Inner<R>>,
}

impl<R> Clone for CoalescingQueue<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R> CoalescingQueue<R>
where
    R: Recompute + Send + Sync + 'static,
{
    pub fn new(config: QueueConfig, recompute: Arc<R>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                recompute,
                state: Mutex::new(QueueState::default()),
                flush_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Record that `key` changed and needs a recompute later
    ///
    /// Fire-and-forget. Overwrites any pending entry for `key`.
    pub fn schedule(&self, key: impl Into<String>, credential: Option<String>) {
        let key = key.into();
        let mut state = self.inner.lock();

        if state.disposed {
            tracing::debug!(key = %key, "Formula queue disposed, signal dropped");
            return;
        }

        state.stats.scheduled += 1;
        state.pending.insert(
            key,
            PendingEntry {
                enqueued_at: Instant::now(),
                enqueued_at_ms: now_ms(),
                credential,
            },
        );
        self.inner.arm(&mut state);
    }

    /// Number of keys waiting for a flush
    pub fn depth(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Pending keys, oldest signal first
    pub fn pending(&self) -> Vec<PendingSnapshot> {
        let state = self.inner.lock();
        let mut entries: Vec<PendingSnapshot> = state
            .pending
            .iter()
            .map(|(key, entry)| PendingSnapshot {
                key: key.clone(),
                enqueued_at_ms: entry.enqueued_at_ms,
            })
            .collect();
        entries.sort_by(|a, b| {
            a.enqueued_at_ms
                .cmp(&b.enqueued_at_ms)
                .then_with(|| a.key.cmp(&b.key))
        });
        entries
    }

    /// Last successful completion per key (epoch ms)
    pub fn last_completed(&self) -> HashMap<String, i64> {
        self.inner.lock().last_completed.clone()
    }

    pub fn stats(&self) -> QueueStats {
        self.inner.lock().stats
    }

    pub fn is_armed(&self) -> bool {
        self.inner.lock().timer.is_some()
    }

    pub fn is_flushing(&self) -> bool {
        self.inner.lock().flushing
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    /// Cancel the armed timer and drop all pending work
    ///
    /// A flush already in progress finishes its batch but does not re-arm.
    pub fn dispose(&self) {
        let mut state = self.inner.lock();
        state.disposed = true;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        let dropped = state.pending.len();
        state.pending.clear();
        tracing::info!(dropped = dropped, "Formula queue disposed");
    }
}

impl<R> Inner<R>
where
    R: Recompute + Send + Sync + 'static,
{
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arm the one-shot timer unless one is already armed
    fn arm(self: &Arc<Self>, state: &mut QueueState) {
        if state.timer.is_some() || state.disposed {
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(error = %e, "No tokio runtime, formula queue not armed");
                return;
            }
        };

        let inner = Arc::clone(self);
        let delay = self.config.min_delay;
        state.timer = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            inner.flush().await;
        }));

        tracing::debug!(delay_ms = delay.as_millis() as u64, "Formula queue armed");
    }

    async fn flush(self: Arc<Self>) {
        // A timer armed by `schedule` during a slow batch waits here
        let _gate = self.flush_gate.lock().await;

        let now = Instant::now();
        let threshold = self.config.settle_threshold();
        let mut ready = Vec::new();

        {
            let mut state = self.lock();
            state.timer = None;
            if state.disposed {
                return;
            }
            state.flushing = true;
            state.stats.flushes += 1;

            let batch: Vec<(String, PendingEntry)> = state.pending.drain().collect();
            tracing::debug!(batch = batch.len(), "Formula queue flush started");

            for (key, entry) in batch {
                if now.saturating_duration_since(entry.enqueued_at) < threshold {
                    tracing::debug!(key = %key, "Entry not settled, deferring to next cycle");
                    state.stats.deferred += 1;
                    // A newer signal that raced in keeps precedence
                    state.pending.entry(key).or_insert(entry);
                    continue;
                }

                match entry.credential.filter(|c| !c.trim().is_empty()) {
                    Some(credential) => ready.push((key, credential)),
                    None => {
                        state.stats.skipped += 1;
                        tracing::warn!(key = %key, "Missing credential, formula recompute skipped");
                    }
                }
            }
        }

        let concurrency = self.config.flush_concurrency.max(1);
        futures::stream::iter(ready)
            .for_each_concurrent(concurrency, |(key, credential)| {
                self.run_one(key, credential)
            })
            .await;

        let mut state = self.lock();
        state.flushing = false;
        if !state.pending.is_empty() {
            self.arm(&mut state);
        }
    }

    async fn run_one(&self, key: String, credential: String) {
        let started = Instant::now();
        let result = AssertUnwindSafe(self.recompute.recompute(&key, &credential))
            .catch_unwind()
            .await
            .unwrap_or(Err(RecomputeError::Panicked));
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                {
                    let mut state = self.lock();
                    state.stats.completed += 1;
                    state.last_completed.insert(key.clone(), now_ms());
                }
                tracing::info!(key = %key, elapsed_ms = elapsed_ms, "Formula recompute completed");
            }
            Err(e) => {
                self.lock().stats.failed += 1;
                tracing::error!(
                    key = %key,
                    error = %e,
                    elapsed_ms = elapsed_ms,
                    "Formula recompute failed"
                );
            }
        }
    }
}
