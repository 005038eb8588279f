use super::collector::ResultCollector;
use super::grid::trial_grid;
use super::pipeline::TrialPipeline;
use super::progress::ProgressTracker;
use super::retry::RetryPolicy;
use super::scheduler::{ExecutionSettings, Scheduler};
use crate::config::EvalConfig;
use crate::dataset::DatasetSupplier;
use crate::errors::{ConfigError, RunError};
use crate::model::{Condition, RunSummary, Sample};
use crate::observer::{NoopObserver, RunEvent, RunObserver};
use crate::providers::{AgentFactory, JudgeFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// What to run, independent of where the config came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub config_name: String,
    pub conditions: Vec<Condition>,
    pub repetitions: u32,
    pub settings: ExecutionSettings,
}

impl RunPlan {
    pub fn from_config(config: &EvalConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config_name: config.name.clone(),
            conditions: config.resolved_conditions(),
            repetitions: config.execution.repetitions,
            settings: ExecutionSettings {
                max_concurrent: config.execution.max_concurrent,
                retry: config.execution.retry.policy(),
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.conditions.is_empty() {
            return Err(ConfigError::invalid(
                "conditions",
                "must declare at least one condition",
            ));
        }
        if self.repetitions < 1 {
            return Err(ConfigError::invalid(
                "execution.repetitions",
                "must be at least 1",
            ));
        }
        if self.settings.max_concurrent < 1 {
            return Err(ConfigError::invalid(
                "execution.max_concurrent",
                "must be at least 1",
            ));
        }
        let RetryPolicy {
            max_attempts,
            multiplier,
            ..
        } = self.settings.retry;
        if max_attempts < 1 {
            return Err(ConfigError::invalid(
                "execution.retry.max_attempts",
                "must be at least 1",
            ));
        }
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(ConfigError::invalid(
                "execution.retry.backoff_multiplier",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn total_trials(&self, samples: usize) -> usize {
        samples * self.conditions.len() * self.repetitions as usize
    }
}

/// Top-level entry point: load the dataset, run the grid, assemble the summary.
pub struct Runner {
    agents: Arc<dyn AgentFactory>,
    judges: Arc<dyn JudgeFactory>,
    observer: Arc<dyn RunObserver>,
}

impl Runner {
    pub fn new(agents: Arc<dyn AgentFactory>, judges: Arc<dyn JudgeFactory>) -> Self {
        Self {
            agents,
            judges,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub async fn run_config(
        &self,
        config: &EvalConfig,
        dataset: &dyn DatasetSupplier,
    ) -> Result<RunSummary, RunError> {
        let plan = RunPlan::from_config(config)?;
        self.run(&plan, dataset).await
    }

    /// Setup is checked before any trial starts; the first unrecoverable
    /// trial failure aborts the run and is the only error returned.
    pub async fn run(
        &self,
        plan: &RunPlan,
        dataset: &dyn DatasetSupplier,
    ) -> Result<RunSummary, RunError> {
        let started = Instant::now();
        plan.validate()?;
        let loaded = dataset.load()?;

        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("run", %run_id, config = %plan.config_name);

        async {
            self.observer.on_event(&RunEvent::RunStarted {
                run_id: run_id.clone(),
                total_samples: loaded.samples.len(),
                total_conditions: plan.conditions.len(),
                condition_names: plan.conditions.iter().map(|c| c.name.clone()).collect(),
                repetitions: plan.repetitions,
                max_concurrent: plan.settings.max_concurrent,
            });

            let samples: Vec<Arc<Sample>> = loaded.samples.into_iter().map(Arc::new).collect();
            let conditions: Vec<Arc<Condition>> =
                plan.conditions.iter().cloned().map(Arc::new).collect();
            let per_condition = samples.len() * plan.repetitions as usize;
            let trials = trial_grid(&samples, &conditions, plan.repetitions);

            let progress = Arc::new(ProgressTracker::new(
                run_id.clone(),
                conditions.iter().map(|c| (c.name.clone(), per_condition)),
                self.observer.clone(),
            ));
            let pipeline = TrialPipeline::new(
                run_id.clone(),
                self.agents.clone(),
                self.judges.clone(),
                self.observer.clone(),
            );
            let scheduler = Scheduler::new(
                plan.settings.clone(),
                pipeline,
                progress,
                self.observer.clone(),
            );

            let results = scheduler.run(trials).await?;

            let mut collector = ResultCollector::new();
            collector.extend(results);
            let summary = collector.into_summary(run_id.clone(), loaded.sha256, &plan.config_name);

            self.observer.on_event(&RunEvent::RunCompleted {
                run_id: run_id.clone(),
                total_runs: summary.runs.len(),
                elapsed_seconds: started.elapsed().as_secs_f64(),
            });
            Ok::<_, RunError>(summary)
        }
        .instrument(span)
        .await
    }
}
