use crate::errors::CapabilityError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Unique key of one trial. Ordering is lexicographic over
/// (sample_id, condition, repetition), which is the order of `RunSummary::runs`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrialIdentity {
    pub sample_id: String,
    pub condition: String,
    pub repetition: u32,
}

impl TrialIdentity {
    pub fn new(sample_id: impl Into<String>, condition: impl Into<String>, repetition: u32) -> Self {
        Self {
            sample_id: sample_id.into(),
            condition: condition.into(),
            repetition,
        }
    }
}

impl fmt::Display for TrialIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}#{}",
            self.sample_id, self.condition, self.repetition
        )
    }
}

/// One question/answer pair from the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub id: String,
    pub question: String,
    pub reference_answer: String,
}

/// How an agent reaches one tool server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolServer {
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: BTreeMap<String, String>,
    },
    Sse {
        url: String,
        #[serde(default)]
        headers: Option<BTreeMap<String, String>>,
    },
    Http {
        url: String,
        #[serde(default)]
        headers: Option<BTreeMap<String, String>>,
    },
}

/// A tool server reference resolved against the config's server table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedToolServer {
    pub name: String,
    pub server: ToolServer,
}

/// A named evaluation variant. Every sample is run under every condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub name: String,
    pub system_prompt: String,
    #[serde(default)]
    pub tool_servers: Vec<NamedToolServer>,
    #[serde(default)]
    pub require_tool_use: bool,
    #[serde(default)]
    pub require_tool_success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

/// One tool call made by the agent while answering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
}

impl ToolInvocation {
    pub fn ok(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: true,
            duration_ms: None,
        }
    }

    pub fn failed(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: false,
            duration_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutcome {
    pub response: String,
    pub cost_usd: Option<f64>,
    pub duration_ms: u64,
    pub num_turns: u32,
    pub usage: Option<TokenUsage>,
    #[serde(default)]
    pub tool_calls: Vec<ToolInvocation>,
}

impl AgentOutcome {
    /// True when at least one tool call happened and none of them succeeded.
    pub fn all_tool_calls_failed(&self) -> bool {
        !self.tool_calls.is_empty() && self.tool_calls.iter().all(|tc| !tc.success)
    }
}

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

/// Scored verdict from the judge. Scores are on a 1..=5 scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeOutcome {
    pub factual_adherence: u8,
    pub factual_adherence_reasoning: String,
    pub completeness: u8,
    pub completeness_reasoning: String,
    pub helpfulness_and_clarity: u8,
    pub helpfulness_and_clarity_reasoning: String,
    #[serde(default)]
    pub unverified_claims: Vec<String>,
}

impl JudgeOutcome {
    /// Returns the name of the first metric whose score is outside 1..=5.
    pub fn out_of_range_metric(&self) -> Option<(&'static str, u8)> {
        self.scores()
            .into_iter()
            .find(|(_, score)| !(MIN_SCORE..=MAX_SCORE).contains(score))
    }

    /// Rejects out-of-range scores as a non-retriable judge failure.
    pub fn validate(&self) -> Result<(), CapabilityError> {
        match self.out_of_range_metric() {
            Some((metric, score)) => Err(CapabilityError::judge(format!(
                "{metric} score {score} is outside {MIN_SCORE}..={MAX_SCORE}"
            ))),
            None => Ok(()),
        }
    }

    pub fn scores(&self) -> [(&'static str, u8); 3] {
        [
            ("factual_adherence", self.factual_adherence),
            ("completeness", self.completeness),
            ("helpfulness_and_clarity", self.helpfulness_and_clarity),
        ]
    }
}

/// Outcome of one successful trial. Failed trials never produce one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub run_id: String,
    pub identity: TrialIdentity,
    pub agent: AgentOutcome,
    pub judge: JudgeOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub dataset_sha256: String,
    pub config_name: String,
    pub runs: Vec<TrialResult>,
}
