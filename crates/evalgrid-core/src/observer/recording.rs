use super::{RunEvent, RunObserver};
use std::sync::Mutex;

/// Keeps every event in arrival order. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<RunEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().expect("recording observer lock").clone()
    }

    /// `(done, total)` of every progress notification, in order.
    pub fn progress(&self) -> Vec<(usize, usize)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RunEvent::Progress { done, total, .. } => Some((done, total)),
                _ => None,
            })
            .collect()
    }

    pub fn retries(&self) -> Vec<RunEvent> {
        self.of_kind("trial.retried")
    }

    pub fn of_kind(&self, name: &str) -> Vec<RunEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.name() == name)
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events
            .lock()
            .expect("recording observer lock")
            .iter()
            .filter(|e| e.name() == name)
            .count()
    }
}

impl RunObserver for RecordingObserver {
    fn on_event(&self, event: &RunEvent) {
        self.events
            .lock()
            .expect("recording observer lock")
            .push(event.clone());
    }
}
