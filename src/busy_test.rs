use super::*;

/// Sink that records every edge it is handed.
#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<bool>>,
}

impl BusySink for RecordingSink {
    fn set_busy(&self, busy: bool) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(busy);
    }
}

impl RecordingSink {
    fn events(&self) -> Vec<bool> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[test]
fn single_guard_fires_both_edges() {
    let sink = Arc::new(RecordingSink::default());
    let busy = BusyState::new(sink.clone());

    assert!(!busy.is_busy());
    let guard = busy.acquire();
    assert!(busy.is_busy());
    assert_eq!(sink.events(), vec![true]);

    drop(guard);
    assert!(!busy.is_busy());
    assert_eq!(sink.events(), vec![true, false]);
}

#[test]
fn overlapping_guards_fire_edges_once() {
    let sink = Arc::new(RecordingSink::default());
    let busy = BusyState::new(sink.clone());

    let first = busy.acquire();
    let second = busy.acquire();
    assert_eq!(busy.count(), 2);
    assert_eq!(sink.events(), vec![true]);

    drop(first);
    assert_eq!(busy.count(), 1);
    assert_eq!(sink.events(), vec![true]);

    drop(second);
    assert_eq!(busy.count(), 0);
    assert_eq!(sink.events(), vec![true, false]);
}

#[test]
fn count_recovers_after_indicator_cycles() {
    let sink = Arc::new(RecordingSink::default());
    let busy = BusyState::new(sink.clone());

    drop(busy.acquire());
    drop(busy.acquire());
    assert_eq!(sink.events(), vec![true, false, true, false]);
    assert_eq!(busy.count(), 0);
}

#[test]
fn clones_share_one_counter() {
    let sink = Arc::new(RecordingSink::default());
    let busy = BusyState::new(sink.clone());
    let other = busy.clone();

    let guard = other.acquire();
    assert_eq!(busy.count(), 1);
    drop(guard);
    assert_eq!(busy.count(), 0);
    assert_eq!(sink.events(), vec![true, false]);
}

#[test]
fn detached_state_counts_without_a_sink() {
    let busy = BusyState::detached();
    let guard = busy.acquire();
    assert_eq!(busy.count(), 1);
    drop(guard);
    assert_eq!(busy.count(), 0);
}

#[test]
fn closure_sinks_work() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = seen.clone();
    let busy = BusyState::new(Arc::new(move |flag: bool| {
        record.lock().unwrap_or_else(PoisonError::into_inner).push(flag);
    }));

    drop(busy.acquire());
    assert_eq!(*seen.lock().unwrap_or_else(PoisonError::into_inner), vec![true, false]);
}
