//! Run events and the observers that consume them.
//!
//! The engine never renders anything itself. Every state transition is
//! published as a [`RunEvent`]; logging, progress bars and test recorders all
//! sit behind [`RunObserver`]. Observers are called from trial tasks, so
//! implementations must be cheap and must not block.

pub mod composite;
pub mod logging;
pub mod recording;

pub use composite::CompositeObserver;
pub use logging::TracingObserver;
pub use recording::RecordingObserver;

use crate::model::TrialIdentity;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        run_id: String,
        total_samples: usize,
        total_conditions: usize,
        condition_names: Vec<String>,
        repetitions: u32,
        max_concurrent: usize,
    },
    RunCompleted {
        run_id: String,
        total_runs: usize,
        elapsed_seconds: f64,
    },
    /// Emitted once per trial, on its first admission.
    TrialStarted {
        run_id: String,
        identity: TrialIdentity,
    },
    TrialCompleted {
        run_id: String,
        identity: TrialIdentity,
    },
    /// Terminal failure of one trial.
    TrialFailed {
        run_id: String,
        identity: TrialIdentity,
        reason: String,
    },
    TrialRetried {
        run_id: String,
        identity: TrialIdentity,
        attempt: u32,
        reason: String,
        backoff_seconds: f64,
    },
    /// `done` and `total` are run-wide; `condition` names the trial that resolved.
    Progress {
        run_id: String,
        condition: String,
        done: usize,
        total: usize,
    },
    ToolUseAbsent {
        run_id: String,
        identity: TrialIdentity,
    },
    ToolSuccessAbsent {
        run_id: String,
        identity: TrialIdentity,
    },
}

impl RunEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RunEvent::RunStarted { .. } => "run.started",
            RunEvent::RunCompleted { .. } => "run.completed",
            RunEvent::TrialStarted { .. } => "trial.started",
            RunEvent::TrialCompleted { .. } => "trial.completed",
            RunEvent::TrialFailed { .. } => "trial.failed",
            RunEvent::TrialRetried { .. } => "trial.retried",
            RunEvent::Progress { .. } => "run.progress",
            RunEvent::ToolUseAbsent { .. } => "trial.tool_use_absent",
            RunEvent::ToolSuccessAbsent { .. } => "trial.tool_success_absent",
        }
    }
}

/// Progress events are delivered while the run's progress lock is held, so
/// notifications arrive in `done` order. An observer must not call back into
/// the run (for example `ProgressTracker::snapshot`) from `on_event`; that
/// would deadlock.
pub trait RunObserver: Send + Sync {
    fn on_event(&self, event: &RunEvent);
}

impl<F> RunObserver for F
where
    F: Fn(&RunEvent) + Send + Sync,
{
    fn on_event(&self, event: &RunEvent) {
        self(event)
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {
    fn on_event(&self, _event: &RunEvent) {}
}
