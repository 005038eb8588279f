use super::{RunEvent, RunObserver};
use std::sync::Arc;

/// Delivers every event to each inner observer, in registration order.
#[derive(Clone, Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn RunObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn RunObserver>>) -> Self {
        Self { observers }
    }

    pub fn with(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl RunObserver for CompositeObserver {
    fn on_event(&self, event: &RunEvent) {
        for obs in &self.observers {
            obs.on_event(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::RecordingObserver;

    #[test]
    fn fans_out_to_every_observer_in_order() {
        let first = Arc::new(RecordingObserver::default());
        let second = Arc::new(RecordingObserver::default());
        let composite = CompositeObserver::default()
            .with(first.clone())
            .with(second.clone());

        composite.on_event(&RunEvent::RunCompleted {
            run_id: "r".into(),
            total_runs: 4,
            elapsed_seconds: 1.5,
        });

        assert_eq!(composite.len(), 2);
        assert_eq!(first.events().len(), 1);
        assert_eq!(first.events(), second.events());
    }
}
