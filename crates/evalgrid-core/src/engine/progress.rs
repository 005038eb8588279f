//! Run-wide and per-condition done/in-flight accounting.
//!
//! Progress notifications are published while the counter lock is held, so
//! observers see `done` values strictly in order 1..=total.

use crate::observer::{RunEvent, RunObserver};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressCounters {
    pub done: usize,
    pub in_flight: usize,
    pub total: usize,
}

impl ProgressCounters {
    fn admit(&mut self) {
        self.in_flight += 1;
    }

    fn release(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    fn resolve(&mut self) {
        self.release();
        self.done += 1;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub overall: ProgressCounters,
    pub per_condition: BTreeMap<String, ProgressCounters>,
}

pub struct ProgressTracker {
    run_id: String,
    counters: Mutex<ProgressSnapshot>,
    observer: Arc<dyn RunObserver>,
}

impl ProgressTracker {
    /// `totals` is the number of trials per condition.
    pub fn new(
        run_id: impl Into<String>,
        totals: impl IntoIterator<Item = (String, usize)>,
        observer: Arc<dyn RunObserver>,
    ) -> Self {
        let mut snapshot = ProgressSnapshot::default();
        for (condition, total) in totals {
            snapshot.overall.total += total;
            snapshot
                .per_condition
                .entry(condition)
                .or_default()
                .total += total;
        }
        Self {
            run_id: run_id.into(),
            counters: Mutex::new(snapshot),
            observer,
        }
    }

    pub fn on_admitted(&self, condition: &str) {
        self.update(condition, ProgressCounters::admit);
    }

    /// Called exactly once per trial, on success or terminal failure.
    /// The observer is notified with the lock held; see [`RunObserver`].
    pub fn on_resolved(&self, condition: &str) {
        let mut guard = self.counters.lock().expect("progress lock");
        guard.overall.resolve();
        guard
            .per_condition
            .entry(condition.to_string())
            .or_default()
            .resolve();
        self.observer.on_event(&RunEvent::Progress {
            run_id: self.run_id.clone(),
            condition: condition.to_string(),
            done: guard.overall.done,
            total: guard.overall.total,
        });
    }

    /// The trial gave up its slot to sleep before another attempt.
    pub fn on_backoff(&self, condition: &str) {
        self.update(condition, ProgressCounters::release);
    }

    /// The trial's attempt finished after the run was aborted; it is not resolved.
    pub fn on_abandoned(&self, condition: &str) {
        self.update(condition, ProgressCounters::release);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.counters.lock().expect("progress lock").clone()
    }

    fn update(&self, condition: &str, f: impl Fn(&mut ProgressCounters)) {
        let mut guard = self.counters.lock().expect("progress lock");
        f(&mut guard.overall);
        f(guard
            .per_condition
            .entry(condition.to_string())
            .or_default());
    }
}
