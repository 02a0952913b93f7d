//! Busy indicator state shared by all in-flight deferred operations.
//!
//! The daemon serializes heavy operations on the modem's AT channel, so while
//! any deferred call is pending the whole modem is effectively unresponsive.
//! Front-ends surface that with a single busy indicator driven by a reference
//! count: the first entering operation turns it on, the last leaving one
//! turns it off. Guards make the decrement automatic and unrepeatable.

use std::sync::{Arc, Mutex, PoisonError};

// =============================================================================
// SINK
// =============================================================================

/// Observer for busy edge transitions. `set_busy(true)` fires only on 0→1,
/// `set_busy(false)` only on 1→0.
///
/// Edges are delivered while the counter lock is held so overlapping
/// operations cannot reorder them; implementations must be cheap and must
/// not call back into the counter.
pub trait BusySink: Send + Sync {
    fn set_busy(&self, busy: bool);
}

impl<F> BusySink for F
where
    F: Fn(bool) + Send + Sync,
{
    fn set_busy(&self, busy: bool) {
        self(busy);
    }
}

// =============================================================================
// STATE
// =============================================================================

/// Shared, cloneable busy reference count.
#[derive(Clone, Default)]
pub struct BusyState {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    count: Mutex<usize>,
    sink: Option<Arc<dyn BusySink>>,
}

impl BusyState {
    /// Busy state that reports edges to `sink`.
    pub fn new(sink: Arc<dyn BusySink>) -> Self {
        Self { inner: Arc::new(Inner { count: Mutex::new(0), sink: Some(sink) }) }
    }

    /// Busy state with no observer, for headless use.
    pub fn detached() -> Self {
        Self::default()
    }

    /// Enter a busy section. The returned guard leaves it when dropped.
    pub fn acquire(&self) -> BusyGuard {
        let mut count = lock(&self.inner.count);
        *count += 1;
        if *count == 1 {
            if let Some(sink) = &self.inner.sink {
                sink.set_busy(true);
            }
        }
        drop(count);
        BusyGuard { inner: Arc::clone(&self.inner) }
    }

    /// Number of operations currently inside busy sections.
    pub fn count(&self) -> usize {
        *lock(&self.inner.count)
    }

    pub fn is_busy(&self) -> bool {
        self.count() > 0
    }
}

/// RAII handle for one busy section. Dropping it decrements the count
/// exactly once.
pub struct BusyGuard {
    inner: Arc<Inner>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let mut count = lock(&self.inner.count);
        *count = count.saturating_sub(1);
        if *count == 0 {
            if let Some(sink) = &self.inner.sink {
                sink.set_busy(false);
            }
        }
    }
}

fn lock(count: &Mutex<usize>) -> std::sync::MutexGuard<'_, usize> {
    count.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "busy_test.rs"]
mod tests;
