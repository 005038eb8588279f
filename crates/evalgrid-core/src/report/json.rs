use super::aggregate::{aggregate, condition_stats, AggregatedResult, ConditionStats, MetricStats};
use crate::errors::ReportError;
use crate::model::RunSummary;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const AGGREGATE_SCHEMA_VERSION: &str = "1";

/// `{config_name}_{YYYYMMDD}_{first 8 chars of run_id}`
pub fn output_stem(config_name: &str, run_id: &str, date: NaiveDate) -> String {
    let short: String = run_id.chars().take(8).collect();
    format!("{}_{}_{}", config_name, date.format("%Y%m%d"), short)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupReport {
    pub sample_id: String,
    pub condition: String,
    pub runs: usize,
    pub factual_adherence: MetricStats,
    pub completeness: MetricStats,
    pub helpfulness_and_clarity: MetricStats,
    pub unverified_claims: Vec<String>,
    pub total_cost_usd: Option<f64>,
}

impl From<&AggregatedResult> for GroupReport {
    fn from(r: &AggregatedResult) -> Self {
        Self {
            sample_id: r.sample_id.clone(),
            condition: r.condition.clone(),
            runs: r.runs.len(),
            factual_adherence: r.factual_adherence,
            completeness: r.completeness,
            helpfulness_and_clarity: r.helpfulness_and_clarity,
            unverified_claims: r.unverified_claims.clone(),
            total_cost_usd: r.total_cost_usd(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub schema_version: String,
    pub run_id: String,
    pub config_name: String,
    pub dataset_sha256: String,
    pub generated_at: DateTime<Utc>,
    pub total_runs: usize,
    pub conditions: Vec<ConditionStats>,
    pub groups: Vec<GroupReport>,
}

impl AggregateReport {
    pub fn build(summary: &RunSummary, generated_at: DateTime<Utc>) -> Self {
        let aggregated = aggregate(&summary.runs);
        Self {
            schema_version: AGGREGATE_SCHEMA_VERSION.to_string(),
            run_id: summary.run_id.clone(),
            config_name: summary.config_name.clone(),
            dataset_sha256: summary.dataset_sha256.clone(),
            generated_at,
            total_runs: summary.runs.len(),
            conditions: condition_stats(&aggregated),
            groups: aggregated.iter().map(GroupReport::from).collect(),
        }
    }
}

/// Paths written by [`write_run_outputs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutputs {
    pub summary: PathBuf,
    pub aggregate: PathBuf,
}

pub fn write_summary(summary: &RunSummary, out: &Path) -> Result<(), ReportError> {
    write_pretty(summary, out)
}

pub fn write_aggregate(report: &AggregateReport, out: &Path) -> Result<(), ReportError> {
    write_pretty(report, out)
}

/// Writes `{stem}.json` (the summary) and `{stem}.aggregate.json` into `dir`.
pub fn write_run_outputs(
    summary: &RunSummary,
    dir: &Path,
    now: DateTime<Utc>,
) -> Result<RunOutputs, ReportError> {
    std::fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
    let stem = output_stem(&summary.config_name, &summary.run_id, now.date_naive());
    let outputs = RunOutputs {
        summary: dir.join(format!("{stem}.json")),
        aggregate: dir.join(format!("{stem}.aggregate.json")),
    };
    write_summary(summary, &outputs.summary)?;
    write_aggregate(&AggregateReport::build(summary, now), &outputs.aggregate)?;
    Ok(outputs)
}

pub fn read_summary(path: &Path) -> Result<RunSummary, ReportError> {
    let raw = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    serde_json::from_str(&raw).map_err(|e| ReportError::Json {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn write_pretty<T: Serialize>(value: &T, out: &Path) -> Result<(), ReportError> {
    let body = serde_json::to_string_pretty(value).map_err(|e| ReportError::Json {
        path: out.display().to_string(),
        reason: e.to_string(),
    })?;
    std::fs::write(out, body).map_err(|e| io_error(out, e))
}

fn io_error(path: &Path, e: std::io::Error) -> ReportError {
    ReportError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}
