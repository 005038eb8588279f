use super::{RunEvent, RunObserver};

/// Production observer: forwards every event to `tracing` with structured fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RunObserver for TracingObserver {
    fn on_event(&self, event: &RunEvent) {
        let name = event.name();
        match event {
            RunEvent::RunStarted {
                run_id,
                total_samples,
                total_conditions,
                condition_names,
                repetitions,
                max_concurrent,
            } => tracing::info!(
                event = name,
                %run_id,
                total_samples,
                total_conditions,
                conditions = ?condition_names,
                repetitions,
                max_concurrent,
                "evaluation started"
            ),
            RunEvent::RunCompleted {
                run_id,
                total_runs,
                elapsed_seconds,
            } => tracing::info!(
                event = name,
                %run_id,
                total_runs,
                elapsed_seconds = (elapsed_seconds * 100.0).round() / 100.0,
                "evaluation completed"
            ),
            RunEvent::TrialStarted { run_id, identity } => tracing::info!(
                event = name,
                %run_id,
                sample_id = %identity.sample_id,
                condition = %identity.condition,
                repetition = identity.repetition,
                "trial started"
            ),
            RunEvent::TrialCompleted { run_id, identity } => tracing::info!(
                event = name,
                %run_id,
                sample_id = %identity.sample_id,
                condition = %identity.condition,
                repetition = identity.repetition,
                "trial completed"
            ),
            RunEvent::TrialFailed {
                run_id,
                identity,
                reason,
            } => tracing::error!(
                event = name,
                %run_id,
                sample_id = %identity.sample_id,
                condition = %identity.condition,
                repetition = identity.repetition,
                %reason,
                "trial failed"
            ),
            RunEvent::TrialRetried {
                run_id,
                identity,
                attempt,
                reason,
                backoff_seconds,
            } => tracing::warn!(
                event = name,
                %run_id,
                sample_id = %identity.sample_id,
                condition = %identity.condition,
                repetition = identity.repetition,
                attempt,
                %reason,
                backoff_seconds,
                "trial retrying"
            ),
            RunEvent::Progress {
                run_id,
                condition,
                done,
                total,
            } => {
                let percent = if *total > 0 {
                    (1000.0 * *done as f64 / *total as f64).round() / 10.0
                } else {
                    0.0
                };
                tracing::info!(
                    event = name,
                    %run_id,
                    %condition,
                    done,
                    total,
                    percent,
                    "progress"
                )
            }
            RunEvent::ToolUseAbsent { run_id, identity } => tracing::warn!(
                event = name,
                %run_id,
                sample_id = %identity.sample_id,
                condition = %identity.condition,
                repetition = identity.repetition,
                "agent made no tool calls"
            ),
            RunEvent::ToolSuccessAbsent { run_id, identity } => tracing::warn!(
                event = name,
                %run_id,
                sample_id = %identity.sample_id,
                condition = %identity.condition,
                repetition = identity.repetition,
                "every tool call failed"
            ),
        }
    }
}
