//! Named periodic and one-shot tasks driven by an injectable clock.
//!
//! The session loop asks [`Scheduler::due`] which tasks are ready, runs
//! them to completion, then sleeps until [`Scheduler::next_deadline`].
//! Tests swap [`SystemClock`] for [`VirtualClock`] and step time by hand.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Clocks
// ---------------------------------------------------------------------------

/// Monotonic millisecond clock.
pub trait Clock: Send + Sync {
    /// Milliseconds since an arbitrary fixed origin.
    fn now_ms(&self) -> u64;
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// A clock whose origin is now.
    #[must_use]
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Manually-stepped clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    now: Arc<AtomicU64>,
}

impl VirtualClock {
    /// A clock reading `start_ms`.
    #[must_use]
    pub fn new(start_ms: u64) -> Self {
        Self { now: Arc::new(AtomicU64::new(start_ms)) }
    }

    /// Move time forward by `ms`.
    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    /// Jump to `ms`. Going backwards is ignored.
    pub fn set(&self, ms: u64) {
        self.now.fetch_max(ms, Ordering::SeqCst);
    }
}

impl Clock for VirtualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Every task the session loop knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Local simulator timer.
    TickAdvance,
    /// Retry hydration until it succeeds.
    HydrateRetry,
    /// Steady-state polling once hydrated.
    SteadyPoll,
    /// Push-channel keepalive ping.
    TransportHeartbeat,
    /// Reconnect after backoff.
    TransportReconnect,
    /// Flush the debounced config patch.
    PatchFlush,
}

#[derive(Debug, Clone, Copy)]
struct Task {
    /// `None` for one-shot tasks.
    period_ms: Option<u64>,
    due_ms: u64,
}

/// Table of scheduled tasks keyed by kind. Each kind is scheduled at most once.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    tasks: BTreeMap<TaskKind, Task>,
}

impl Scheduler {
    /// An empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `kind` every `period_ms`, first at `first_due_ms`. Replaces any
    /// existing schedule for `kind`.
    pub fn every(&mut self, kind: TaskKind, period_ms: u64, first_due_ms: u64) {
        self.tasks.insert(
            kind,
            Task { period_ms: Some(period_ms.max(1)), due_ms: first_due_ms },
        );
    }

    /// Run `kind` once at `due_ms`. Replaces any existing schedule for `kind`.
    pub fn once(&mut self, kind: TaskKind, due_ms: u64) {
        self.tasks.insert(kind, Task { period_ms: None, due_ms });
    }

    /// Unschedule `kind`. Returns whether it was scheduled.
    pub fn cancel(&mut self, kind: TaskKind) -> bool {
        self.tasks.remove(&kind).is_some()
    }

    /// Unschedule everything.
    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    /// Whether `kind` is scheduled.
    #[must_use]
    pub fn is_scheduled(&self, kind: TaskKind) -> bool {
        self.tasks.contains_key(&kind)
    }

    /// Earliest due time across all tasks.
    #[must_use]
    pub fn next_deadline(&self) -> Option<u64> {
        self.tasks.values().map(|t| t.due_ms).min()
    }

    /// Collect tasks due at `now_ms`, earliest first.
    ///
    /// Periodic tasks are rescheduled one period after `now_ms` (missed
    /// periods are coalesced, not replayed); one-shot tasks are removed.
    pub fn due(&mut self, now_ms: u64) -> Vec<TaskKind> {
        let mut ready: Vec<(u64, TaskKind)> = self
            .tasks
            .iter()
            .filter(|(_, t)| t.due_ms <= now_ms)
            .map(|(&k, t)| (t.due_ms, k))
            .collect();
        ready.sort_unstable();
        for &(_, kind) in &ready {
            let Some(task) = self.tasks.get_mut(&kind) else {
                continue;
            };
            match task.period_ms {
                Some(period) => task.due_ms = now_ms.saturating_add(period),
                None => {
                    self.tasks.remove(&kind);
                }
            }
        }
        ready.into_iter().map(|(_, k)| k).collect()
    }
}
