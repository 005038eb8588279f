//! Scripted capabilities for tests and dry runs.

use super::{Agent, AgentFactory, Judge, JudgeFactory};
use crate::errors::CapabilityError;
use crate::model::{AgentOutcome, JudgeOutcome, NamedToolServer, ToolInvocation};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Everything the agent saw on one call.
#[derive(Debug, Clone)]
pub struct AgentCall {
    pub condition: String,
    pub sample_id: String,
    pub system_prompt: String,
    pub tool_servers: Vec<NamedToolServer>,
    pub question: String,
    /// Zero-based count of earlier calls for the same (condition, sample).
    pub call_index: usize,
}

#[derive(Debug, Clone)]
pub struct JudgeCall {
    pub condition: String,
    pub sample_id: String,
    pub question: String,
    pub reference_answer: String,
    pub agent_response: String,
    pub call_index: usize,
}

type AgentScript = dyn Fn(&AgentCall) -> Result<AgentOutcome, CapabilityError> + Send + Sync;
type JudgeScript = dyn Fn(&JudgeCall) -> Result<JudgeOutcome, CapabilityError> + Send + Sync;

/// Call counters shared by every capability a fake factory creates.
#[derive(Debug, Default)]
pub struct CallStats {
    total: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
    per_key: Mutex<HashMap<(String, String), usize>>,
}

impl CallStats {
    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were in progress at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, condition: &str, sample_id: &str) -> usize {
        self.per_key
            .lock()
            .expect("call stats lock")
            .get(&(condition.to_string(), sample_id.to_string()))
            .copied()
            .unwrap_or(0)
    }

    fn begin(&self, condition: &str, sample_id: &str) -> usize {
        self.total.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let mut per_key = self.per_key.lock().expect("call stats lock");
        let n = per_key
            .entry((condition.to_string(), sample_id.to_string()))
            .or_insert(0);
        let index = *n;
        *n += 1;
        index
    }

    fn end(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn agent_outcome(response: impl Into<String>) -> AgentOutcome {
    AgentOutcome {
        response: response.into(),
        cost_usd: Some(0.001),
        duration_ms: 500,
        num_turns: 1,
        usage: None,
        tool_calls: vec![],
    }
}

pub fn agent_outcome_with_tools(
    response: impl Into<String>,
    tool_calls: Vec<ToolInvocation>,
) -> AgentOutcome {
    AgentOutcome {
        num_turns: 1 + tool_calls.len() as u32,
        tool_calls,
        ..agent_outcome(response)
    }
}

pub fn judge_outcome(factual_adherence: u8, completeness: u8, helpfulness: u8) -> JudgeOutcome {
    JudgeOutcome {
        factual_adherence,
        factual_adherence_reasoning: "Consistent with the reference.".into(),
        completeness,
        completeness_reasoning: "Covers the main points.".into(),
        helpfulness_and_clarity: helpfulness,
        helpfulness_and_clarity_reasoning: "Clear.".into(),
        unverified_claims: vec![],
    }
}

#[derive(Clone)]
pub struct FakeAgentFactory {
    script: Arc<AgentScript>,
    latency: Duration,
    sample_latency: HashMap<String, Duration>,
    stats: Arc<CallStats>,
}

impl FakeAgentFactory {
    /// Every call succeeds with `outcome`.
    pub fn returning(outcome: AgentOutcome) -> Self {
        Self::scripted(move |_| Ok(outcome.clone()))
    }

    pub fn scripted<F>(script: F) -> Self
    where
        F: Fn(&AgentCall) -> Result<AgentOutcome, CapabilityError> + Send + Sync + 'static,
    {
        Self {
            script: Arc::new(script),
            latency: Duration::ZERO,
            sample_latency: HashMap::new(),
            stats: Arc::new(CallStats::default()),
        }
    }

    /// Simulated time each `ask` takes.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Overrides the latency for one sample.
    pub fn with_sample_latency(mut self, sample_id: impl Into<String>, latency: Duration) -> Self {
        self.sample_latency.insert(sample_id.into(), latency);
        self
    }

    pub fn stats(&self) -> Arc<CallStats> {
        self.stats.clone()
    }
}

impl AgentFactory for FakeAgentFactory {
    fn create(
        &self,
        condition: &str,
        sample_id: &str,
        system_prompt: &str,
        tool_servers: &[NamedToolServer],
    ) -> Box<dyn Agent> {
        Box::new(FakeAgent {
            condition: condition.to_string(),
            sample_id: sample_id.to_string(),
            system_prompt: system_prompt.to_string(),
            tool_servers: tool_servers.to_vec(),
            script: self.script.clone(),
            latency: self
                .sample_latency
                .get(sample_id)
                .copied()
                .unwrap_or(self.latency),
            stats: self.stats.clone(),
        })
    }
}

struct FakeAgent {
    condition: String,
    sample_id: String,
    system_prompt: String,
    tool_servers: Vec<NamedToolServer>,
    script: Arc<AgentScript>,
    latency: Duration,
    stats: Arc<CallStats>,
}

#[async_trait]
impl Agent for FakeAgent {
    async fn ask(&self, question: &str) -> Result<AgentOutcome, CapabilityError> {
        let call_index = self.stats.begin(&self.condition, &self.sample_id);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let call = AgentCall {
            condition: self.condition.clone(),
            sample_id: self.sample_id.clone(),
            system_prompt: self.system_prompt.clone(),
            tool_servers: self.tool_servers.clone(),
            question: question.to_string(),
            call_index,
        };
        let out = (self.script)(&call);
        self.stats.end();
        out
    }
}

#[derive(Clone)]
pub struct FakeJudgeFactory {
    script: Arc<JudgeScript>,
    stats: Arc<CallStats>,
}

impl Default for FakeJudgeFactory {
    fn default() -> Self {
        Self::returning(judge_outcome(4, 3, 5))
    }
}

impl FakeJudgeFactory {
    pub fn returning(outcome: JudgeOutcome) -> Self {
        Self::scripted(move |_| Ok(outcome.clone()))
    }

    pub fn scripted<F>(script: F) -> Self
    where
        F: Fn(&JudgeCall) -> Result<JudgeOutcome, CapabilityError> + Send + Sync + 'static,
    {
        Self {
            script: Arc::new(script),
            stats: Arc::new(CallStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<CallStats> {
        self.stats.clone()
    }
}

impl JudgeFactory for FakeJudgeFactory {
    fn create(&self, condition: &str, sample_id: &str) -> Box<dyn Judge> {
        Box::new(FakeJudge {
            condition: condition.to_string(),
            sample_id: sample_id.to_string(),
            script: self.script.clone(),
            stats: self.stats.clone(),
        })
    }
}

struct FakeJudge {
    condition: String,
    sample_id: String,
    script: Arc<JudgeScript>,
    stats: Arc<CallStats>,
}

#[async_trait]
impl Judge for FakeJudge {
    async fn score(
        &self,
        question: &str,
        reference_answer: &str,
        agent_response: &str,
    ) -> Result<JudgeOutcome, CapabilityError> {
        let call_index = self.stats.begin(&self.condition, &self.sample_id);
        let call = JudgeCall {
            condition: self.condition.clone(),
            sample_id: self.sample_id.clone(),
            question: question.to_string(),
            reference_answer: reference_answer.to_string(),
            agent_response: agent_response.to_string(),
            call_index,
        };
        let out = (self.script)(&call);
        self.stats.end();
        out
    }
}
