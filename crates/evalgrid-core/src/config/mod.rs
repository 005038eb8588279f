//! Run configuration: YAML on disk, `${VAR}` interpolation, then validation.
//!
//! Every bound checked here is checked before a single trial is admitted, so a
//! bad config never costs an agent call.

pub mod env;

use crate::engine::retry::RetryPolicy;
use crate::errors::ConfigError;
use crate::model::{Condition, NamedToolServer, ToolServer};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalConfig {
    pub name: String,
    pub version: String,
    pub dataset: DatasetConfig,
    pub agent: AgentConfig,
    pub judge: JudgeConfig,
    #[serde(default)]
    pub tool_servers: BTreeMap<String, ToolServer>,
    /// Declaration order is preserved; it is the order conditions run in.
    #[serde(deserialize_with = "ordered_conditions")]
    pub conditions: Vec<(String, ConditionConfig)>,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub path: PathBuf,
    pub question_key: String,
    pub answer_key: String,
    #[serde(default)]
    pub id_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeConfig {
    pub model: String,
    #[serde(default)]
    pub temperature: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionConfig {
    pub system_prompt: String,
    #[serde(default)]
    pub tool_servers: Vec<String>,
    #[serde(default)]
    pub require_tool_use: bool,
    #[serde(default)]
    pub require_tool_success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_repetitions")]
    pub repetitions: u32,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_seconds: f64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_seconds: 1.0,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::try_from_secs_f64(self.initial_backoff_seconds.max(0.0))
                .unwrap_or(Duration::MAX),
            multiplier: self.backoff_multiplier,
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            repetitions: default_repetitions(),
            max_concurrent: default_max_concurrent(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_repetitions() -> u32 {
    1
}

fn default_max_concurrent() -> usize {
    4
}

impl EvalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid("name", "must not be empty"));
        }
        if self.conditions.is_empty() {
            return Err(ConfigError::invalid(
                "conditions",
                "must declare at least one condition",
            ));
        }
        for (name, cond) in &self.conditions {
            if cond.system_prompt.trim().is_empty() {
                return Err(ConfigError::invalid(
                    format!("conditions.{name}.system_prompt"),
                    "must not be empty",
                ));
            }
        }
        let unknown: Vec<String> = self
            .conditions
            .iter()
            .flat_map(|(name, cond)| {
                cond.tool_servers
                    .iter()
                    .filter(|s| !self.tool_servers.contains_key(*s))
                    .map(move |s| format!("condition '{name}' references unknown tool server '{s}'"))
            })
            .collect();
        if !unknown.is_empty() {
            return Err(ConfigError::invalid("conditions", unknown.join("; ")));
        }
        self.execution.validate()
    }

    /// Conditions in declaration order, with tool server names resolved.
    /// Call `validate` first; unknown server names are skipped here.
    pub fn resolved_conditions(&self) -> Vec<Condition> {
        self.conditions
            .iter()
            .map(|(name, cond)| Condition {
                name: name.clone(),
                system_prompt: cond.system_prompt.clone(),
                tool_servers: cond
                    .tool_servers
                    .iter()
                    .filter_map(|s| {
                        self.tool_servers.get(s).map(|server| NamedToolServer {
                            name: s.clone(),
                            server: server.clone(),
                        })
                    })
                    .collect(),
                require_tool_use: cond.require_tool_use,
                require_tool_success: cond.require_tool_success,
            })
            .collect()
    }
}

impl ExecutionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent < 1 {
            return Err(ConfigError::invalid(
                "execution.max_concurrent",
                "must be at least 1",
            ));
        }
        if self.repetitions < 1 {
            return Err(ConfigError::invalid(
                "execution.repetitions",
                "must be at least 1",
            ));
        }
        if self.retry.max_attempts < 1 {
            return Err(ConfigError::invalid(
                "execution.retry.max_attempts",
                "must be at least 1",
            ));
        }
        if !self.retry.initial_backoff_seconds.is_finite() || self.retry.initial_backoff_seconds < 0.0
        {
            return Err(ConfigError::invalid(
                "execution.retry.initial_backoff_seconds",
                "must be a non-negative number",
            ));
        }
        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::invalid(
                "execution.retry.backoff_multiplier",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Parses and validates a config from YAML text, resolving `${VAR}` through `lookup`.
pub fn parse_config(
    raw: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<EvalConfig, ConfigError> {
    let mut value: serde_yaml::Value =
        serde_yaml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let missing = env::collect_missing_vars(&value, lookup);
    if !missing.is_empty() {
        return Err(ConfigError::MissingEnvVars(missing));
    }
    env::interpolate(&mut value, lookup);

    let cfg: EvalConfig =
        serde_yaml::from_value(value).map_err(|e| ConfigError::Parse(e.to_string()))?;
    cfg.validate()?;

    if cfg.judge.temperature > 0.0 {
        tracing::warn!(
            temperature = cfg.judge.temperature,
            "judge temperature is above 0; scores will not be reproducible"
        );
    }
    Ok(cfg)
}

/// Reads, interpolates against the process environment, and validates.
/// A relative dataset path is resolved against the config file's directory.
pub fn load_config(path: &Path) -> Result<EvalConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let mut cfg = parse_config(&raw, &|name| std::env::var(name).ok())?;
    if cfg.dataset.path.is_relative() {
        if let Some(dir) = path.parent() {
            cfg.dataset.path = dir.join(&cfg.dataset.path);
        }
    }
    tracing::info!(name = %cfg.name, version = %cfg.version, "config loaded");
    Ok(cfg)
}

fn ordered_conditions<'de, D>(deserializer: D) -> Result<Vec<(String, ConditionConfig)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OrderedConditions;

    impl<'de> Visitor<'de> for OrderedConditions {
        type Value = Vec<(String, ConditionConfig)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of condition name to condition")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut out: Vec<(String, ConditionConfig)> = Vec::new();
            while let Some((name, cond)) = map.next_entry::<String, ConditionConfig>()? {
                if out.iter().any(|(n, _)| *n == name) {
                    return Err(serde::de::Error::custom(format!(
                        "duplicate condition '{name}'"
                    )));
                }
                out.push((name, cond));
            }
            Ok(out)
        }
    }

    deserializer.deserialize_map(OrderedConditions)
}
