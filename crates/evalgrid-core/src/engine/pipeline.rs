use super::grid::Trial;
use crate::errors::TrialError;
use crate::model::TrialResult;
use crate::observer::{RunEvent, RunObserver};
use crate::providers::{AgentFactory, JudgeFactory};
use std::sync::Arc;

/// One attempt of one trial: ask the agent, apply the tool gates, ask the
/// judge, assemble the result. Every step short-circuits on failure.
#[derive(Clone)]
pub struct TrialPipeline {
    run_id: String,
    agents: Arc<dyn AgentFactory>,
    judges: Arc<dyn JudgeFactory>,
    observer: Arc<dyn RunObserver>,
}

impl TrialPipeline {
    pub fn new(
        run_id: impl Into<String>,
        agents: Arc<dyn AgentFactory>,
        judges: Arc<dyn JudgeFactory>,
        observer: Arc<dyn RunObserver>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            agents,
            judges,
            observer,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub async fn run(&self, trial: &Trial) -> Result<TrialResult, TrialError> {
        let Trial {
            identity,
            sample,
            condition,
        } = trial;

        let agent = self.agents.create(
            &condition.name,
            &sample.id,
            &condition.system_prompt,
            &condition.tool_servers,
        );
        let outcome = agent.ask(&sample.question).await?;

        if condition.require_tool_use && outcome.tool_calls.is_empty() {
            self.observer.on_event(&RunEvent::ToolUseAbsent {
                run_id: self.run_id.clone(),
                identity: identity.clone(),
            });
            return Err(TrialError::ToolUseAbsent {
                condition: condition.name.clone(),
                sample_id: sample.id.clone(),
            });
        }
        if condition.require_tool_success && outcome.all_tool_calls_failed() {
            self.observer.on_event(&RunEvent::ToolSuccessAbsent {
                run_id: self.run_id.clone(),
                identity: identity.clone(),
            });
            return Err(TrialError::ToolSuccessAbsent {
                condition: condition.name.clone(),
                sample_id: sample.id.clone(),
            });
        }

        let judge = self.judges.create(&condition.name, &sample.id);
        let verdict = judge
            .score(&sample.question, &sample.reference_answer, &outcome.response)
            .await?;
        verdict.validate()?;

        tracing::debug!(
            trial = %identity,
            factual_adherence = verdict.factual_adherence,
            completeness = verdict.completeness,
            helpfulness_and_clarity = verdict.helpfulness_and_clarity,
            "trial scored"
        );

        Ok(TrialResult {
            run_id: self.run_id.clone(),
            identity: identity.clone(),
            agent: outcome,
            judge: verdict,
        })
    }
}
