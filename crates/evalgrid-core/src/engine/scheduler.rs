//! Bounded-concurrency trial execution with first-failure abort.
//!
//! Every trial gets its own task. A task holds a gate permit only while one
//! pipeline attempt runs, so backoff sleeps never occupy a slot. The first
//! unrecoverable failure is recorded once, the gate is closed and sleeping
//! trials are woken to give up. Attempts already running are awaited and
//! their results discarded.

use super::grid::Trial;
use super::pipeline::TrialPipeline;
use super::progress::ProgressTracker;
use super::retry::{RetryNotice, RetryPolicy};
use crate::errors::{Retriable, RunError, TrialError};
use crate::model::TrialResult;
use crate::observer::{RunEvent, RunObserver};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionSettings {
    pub max_concurrent: usize,
    pub retry: RetryPolicy,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            retry: RetryPolicy::default(),
        }
    }
}

pub struct Scheduler {
    settings: ExecutionSettings,
    pipeline: TrialPipeline,
    progress: Arc<ProgressTracker>,
    observer: Arc<dyn RunObserver>,
}

impl Scheduler {
    pub fn new(
        settings: ExecutionSettings,
        pipeline: TrialPipeline,
        progress: Arc<ProgressTracker>,
        observer: Arc<dyn RunObserver>,
    ) -> Self {
        Self {
            settings,
            pipeline,
            progress,
            observer,
        }
    }

    /// Runs every trial. Results come back in completion order.
    pub async fn run(&self, trials: Vec<Trial>) -> Result<Vec<TrialResult>, RunError> {
        let shared = Arc::new(Shared {
            gate: Semaphore::new(self.settings.max_concurrent.max(1)),
            failure: OnceLock::new(),
            abort: CancellationToken::new(),
            pipeline: self.pipeline.clone(),
            progress: self.progress.clone(),
            observer: self.observer.clone(),
            retry: self.settings.retry.clone(),
        });

        let mut join_set = JoinSet::new();
        for trial in trials {
            let shared = shared.clone();
            join_set.spawn(async move { shared.run_trial(trial).await });
        }

        let mut results = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Some(result)) => results.push(result),
                Ok(None) => {}
                Err(e) => shared.abort_with(RunError::TaskPanicked(e.to_string())),
            }
        }

        match shared.failure.get() {
            Some(err) => Err(err.clone()),
            None => Ok(results),
        }
    }
}

struct Shared {
    gate: Semaphore,
    failure: OnceLock<RunError>,
    abort: CancellationToken,
    pipeline: TrialPipeline,
    progress: Arc<ProgressTracker>,
    observer: Arc<dyn RunObserver>,
    retry: RetryPolicy,
}

/// Why an attempt did not produce a result.
enum AttemptError {
    Failed { attempt: u32, error: TrialError },
    /// The run was aborted before or during this attempt.
    Abandoned,
}

impl Retriable for AttemptError {
    fn is_retriable(&self) -> bool {
        match self {
            AttemptError::Failed { error, .. } => error.is_retriable(),
            AttemptError::Abandoned => false,
        }
    }
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Failed { error, .. } => error.fmt(f),
            AttemptError::Abandoned => f.write_str("run aborted"),
        }
    }
}

impl Shared {
    async fn run_trial(&self, trial: Trial) -> Option<TrialResult> {
        let this = self;
        let current = &trial;
        let outcome = self
            .retry
            .execute_until(
                &self.abort,
                move |attempt| this.attempt(current, attempt),
                move |notice| this.on_retry(current, notice),
            )
            .await;

        let condition = trial.identity.condition.as_str();
        match outcome {
            Some(Ok(result)) => {
                self.progress.on_resolved(condition);
                self.observer.on_event(&RunEvent::TrialCompleted {
                    run_id: self.run_id(),
                    identity: trial.identity.clone(),
                });
                Some(result)
            }
            Some(Err(AttemptError::Failed { attempt, error })) => {
                self.progress.on_resolved(condition);
                self.observer.on_event(&RunEvent::TrialFailed {
                    run_id: self.run_id(),
                    identity: trial.identity.clone(),
                    reason: error.to_string(),
                });
                self.abort_with(RunError::Trial {
                    identity: trial.identity,
                    attempts: attempt,
                    source: error,
                });
                None
            }
            Some(Err(AttemptError::Abandoned)) | None => {
                tracing::debug!(trial = %trial.identity, "trial abandoned after abort");
                None
            }
        }
    }

    async fn attempt(&self, trial: &Trial, attempt: u32) -> Result<TrialResult, AttemptError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| AttemptError::Abandoned)?;
        let condition = trial.identity.condition.as_str();
        self.progress.on_admitted(condition);
        if attempt == 1 {
            self.observer.on_event(&RunEvent::TrialStarted {
                run_id: self.run_id(),
                identity: trial.identity.clone(),
            });
        }

        let outcome = self.pipeline.run(trial).await;
        if self.abort.is_cancelled() {
            self.progress.on_abandoned(condition);
            return Err(AttemptError::Abandoned);
        }
        outcome.map_err(|error| AttemptError::Failed { attempt, error })
    }

    fn on_retry(&self, trial: &Trial, notice: RetryNotice) {
        self.progress.on_backoff(&trial.identity.condition);
        self.observer.on_event(&RunEvent::TrialRetried {
            run_id: self.run_id(),
            identity: trial.identity.clone(),
            attempt: notice.attempt,
            reason: notice.reason,
            backoff_seconds: notice.backoff.as_secs_f64(),
        });
    }

    /// First writer wins; later failures are only logged.
    fn abort_with(&self, err: RunError) {
        match self.failure.set(err) {
            Ok(()) => {
                self.gate.close();
                self.abort.cancel();
                if let Some(err) = self.failure.get() {
                    tracing::error!(kind = err.kind(), error = %err, "aborting run");
                }
            }
            Err(later) => {
                tracing::debug!(error = %later, "failure after abort discarded");
            }
        }
    }

    fn run_id(&self) -> String {
        self.pipeline.run_id().to_string()
    }
}
