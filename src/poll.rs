//! Poll scheduler: an id-keyed registry of periodic async tasks.
//!
//! Every pending deferred result needs "poll me again on the next tick"
//! behavior. The scheduler keeps each task under a [`PollId`] so
//! registration and removal are explicit and idempotent, runs every
//! registered task to completion once per tick, and lets a task deregister
//! itself by returning [`PollControl::Remove`].
//!
//! DESIGN
//! ======
//! - Tasks are checked out of the registry while they run, so a tick never
//!   holds the lock across an await and a task unregistered mid-run stays
//!   gone instead of being resurrected when the run finishes. A tick dropped
//!   mid-run removes the entry it checked out along with the task.
//! - Interval mode spawns one ticker holding a weak handle; once every
//!   [`Poller`] clone is dropped the ticker exits on its next tick.
//! - Manual mode never spawns anything; the host drives [`Poller::tick`]
//!   itself. Tests do the same for determinism.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::time::MissedTickBehavior;

/// Default tick period for interval mode.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

// =============================================================================
// TASK TRAIT
// =============================================================================

/// One periodically-run unit of work.
#[async_trait::async_trait]
pub trait PollTask: Send {
    /// Run one step. Returning [`PollControl::Remove`] deregisters the task.
    async fn poll(&mut self) -> PollControl;
}

/// What a task wants the scheduler to do with it after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollControl {
    /// Keep the task registered for the next tick.
    Continue,

    /// Drop the task from the registry.
    Remove,
}

/// Handle to a registered task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PollId(u64);

// =============================================================================
// POLLER
// =============================================================================

#[derive(Clone, Copy)]
enum Cadence {
    Interval(Duration),
    Manual,
}

/// Cloneable handle to the shared task registry.
#[derive(Clone)]
pub struct Poller {
    inner: Arc<Mutex<Inner>>,
    cadence: Cadence,
}

/// A task is `None` while checked out for a run.
type Slot = Option<Box<dyn PollTask>>;

struct Inner {
    next_id: u64,
    entries: HashMap<u64, Slot>,
    ticker_started: bool,
}

impl Poller {
    /// Scheduler that ticks itself every `period` once [`Self::ensure_running`]
    /// has been called.
    pub fn new(period: Duration) -> Self {
        Self { inner: Self::new_inner(), cadence: Cadence::Interval(period) }
    }

    /// Scheduler with no ticker of its own; the host calls [`Self::tick`].
    pub fn manual() -> Self {
        Self { inner: Self::new_inner(), cadence: Cadence::Manual }
    }

    fn new_inner() -> Arc<Mutex<Inner>> {
        Arc::new(Mutex::new(Inner { next_id: 0, entries: HashMap::new(), ticker_started: false }))
    }

    /// Add a task to the registry.
    pub fn register(&self, task: Box<dyn PollTask>) -> PollId {
        let mut inner = lock(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.insert(id, Some(task));
        PollId(id)
    }

    /// Remove a task. Removing an already-removed id is a no-op, and a task
    /// removed while its own run is in flight stays removed.
    pub fn unregister(&self, id: PollId) {
        lock(&self.inner).entries.remove(&id.0);
    }

    /// Start the interval ticker if this scheduler has one and it is not
    /// already running. Manual schedulers ignore this.
    pub fn ensure_running(&self) {
        let Cadence::Interval(period) = self.cadence else {
            return;
        };
        let mut inner = lock(&self.inner);
        if inner.ticker_started {
            return;
        }
        inner.ticker_started = true;
        drop(inner);
        spawn_ticker(Arc::downgrade(&self.inner), period);
    }

    /// Run every registered task once, sequentially. Tasks registered during
    /// a tick run from the next tick on.
    pub async fn tick(&self) {
        run_tick(&self.inner).await;
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        lock(&self.inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn spawn_ticker(inner: Weak<Mutex<Inner>>, period: Duration) {
    tracing::info!(?period, "poll ticker started");
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let Some(inner) = inner.upgrade() else {
                break;
            };
            run_tick(&inner).await;
        }
        tracing::debug!("poll ticker stopped: all scheduler handles dropped");
    });
}

async fn run_tick(inner: &Arc<Mutex<Inner>>) {
    let ids: Vec<u64> = lock(inner).entries.keys().copied().collect();
    for id in ids {
        let checked_out = lock(inner).entries.get_mut(&id).and_then(Option::take);
        let Some(mut task) = checked_out else {
            continue;
        };
        let mut reclaim = Reclaim { inner, id, armed: true };
        let control = task.poll().await;
        reclaim.armed = false;
        drop(reclaim);

        let mut guard = lock(inner);
        if let Some(slot) = guard.entries.get_mut(&id) {
            match control {
                PollControl::Continue => *slot = Some(task),
                PollControl::Remove => {
                    guard.entries.remove(&id);
                }
            }
        }
    }
}

/// Removes a checked-out entry when its tick is dropped mid-run; the task
/// itself goes down with the tick future, so the emptied slot must not
/// outlive it.
struct Reclaim<'a> {
    inner: &'a Mutex<Inner>,
    id: u64,
    armed: bool,
}

impl Drop for Reclaim<'_> {
    fn drop(&mut self) {
        if self.armed {
            lock(self.inner).entries.remove(&self.id);
        }
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "poll_test.rs"]
mod tests;
