//! Error types for the evaluation engine.
//!
//! Retriability is a property of the failure itself: capabilities decide it
//! for their own errors and the domain gates are always retriable. The retry
//! loop only reads it through [`Retriable`].

use crate::model::TrialIdentity;
use std::fmt;

/// Implemented by failures the retry loop can classify.
pub trait Retriable {
    fn is_retriable(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Agent,
    Judge,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Agent => f.write_str("agent"),
            Capability::Judge => f.write_str("judge"),
        }
    }
}

/// An agent or judge call failed, or returned something unusable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to invoke {capability}: {reason}")]
pub struct CapabilityError {
    pub capability: Capability,
    pub reason: String,
    pub retriable: bool,
}

impl CapabilityError {
    pub fn agent(reason: impl Into<String>) -> Self {
        Self {
            capability: Capability::Agent,
            reason: reason.into(),
            retriable: false,
        }
    }

    pub fn judge(reason: impl Into<String>) -> Self {
        Self {
            capability: Capability::Judge,
            reason: reason.into(),
            retriable: false,
        }
    }

    pub fn retriable(mut self) -> Self {
        self.retriable = true;
        self
    }
}

/// Failure of a single pipeline attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrialError {
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error("condition '{condition}' requires tool use but the agent made no tool calls for sample '{sample_id}'")]
    ToolUseAbsent { condition: String, sample_id: String },

    #[error("condition '{condition}' requires a successful tool call but every tool call failed for sample '{sample_id}'")]
    ToolSuccessAbsent { condition: String, sample_id: String },
}

impl Retriable for TrialError {
    fn is_retriable(&self) -> bool {
        match self {
            TrialError::Capability(e) => e.retriable,
            TrialError::ToolUseAbsent { .. } | TrialError::ToolSuccessAbsent { .. } => true,
        }
    }
}

/// Invalid run setup. Always fatal, never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse YAML: {0}")]
    Parse(String),

    #[error("missing environment variables: {}", .0.join(", "))]
    MissingEnvVars(Vec<String>),

    #[error("invalid config: {field} {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to read dataset {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("dataset line {line}: invalid JSON: {reason}")]
    Json { line: usize, reason: String },

    #[error("dataset line {line}: missing key '{key}'")]
    MissingKey { line: usize, key: String },

    #[error("dataset line {line}: duplicate sample id '{id}'")]
    DuplicateId { line: usize, id: String },

    /// Every bad line of one file, in file order.
    #[error("dataset {path} has {} problem(s): {}", .errors.len(), join_lines(.errors))]
    Lines {
        path: String,
        errors: Vec<DatasetError>,
    },

    #[error("dataset {path} contains no samples")]
    Empty { path: String },
}

fn join_lines(errors: &[DatasetError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Reading or writing report artifacts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReportError {
    #[error("failed to access {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("invalid run summary {path}: {reason}")]
    Json { path: String, reason: String },
}

/// The single failure reported for a run.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("trial {identity} failed after {attempts} attempt(s): {source}")]
    Trial {
        identity: TrialIdentity,
        attempts: u32,
        #[source]
        source: TrialError,
    },

    #[error("trial task panicked: {0}")]
    TaskPanicked(String),
}

impl RunError {
    /// Stable machine-readable kind, for logs and exit-code mapping.
    pub fn kind(&self) -> &'static str {
        match self {
            RunError::Config(_) => "config",
            RunError::Dataset(_) => "dataset",
            RunError::Trial { source, .. } => match source {
                TrialError::Capability(e) => match e.capability {
                    Capability::Agent => "agent_invocation",
                    Capability::Judge => "judge_invocation",
                },
                TrialError::ToolUseAbsent { .. } => "tool_use_absent",
                TrialError::ToolSuccessAbsent { .. } => "tool_success_absent",
            },
            RunError::TaskPanicked(_) => "task_panicked",
        }
    }

    /// Setup failures detected before any trial started.
    pub fn is_setup_error(&self) -> bool {
        matches!(self, RunError::Config(_) | RunError::Dataset(_))
    }
}
