//! Per-(sample, condition) statistics over repeated trials.

use crate::model::TrialResult;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub mean: f64,
    /// Sample standard deviation; 0.0 with fewer than two values.
    pub stddev: f64,
}

impl MetricStats {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let stddev = if values.len() < 2 {
            0.0
        } else {
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            var.sqrt()
        };
        Self { mean, stddev }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedResult {
    pub sample_id: String,
    pub condition: String,
    /// Ascending by repetition.
    pub runs: Vec<TrialResult>,
    pub factual_adherence: MetricStats,
    pub completeness: MetricStats,
    pub helpfulness_and_clarity: MetricStats,
    /// Union across runs, first occurrence wins.
    pub unverified_claims: Vec<String>,
}

impl AggregatedResult {
    pub fn metrics(&self) -> [(&'static str, MetricStats); 3] {
        [
            ("factual_adherence", self.factual_adherence),
            ("completeness", self.completeness),
            ("helpfulness_and_clarity", self.helpfulness_and_clarity),
        ]
    }

    /// `None` as soon as one run did not report its cost.
    pub fn total_cost_usd(&self) -> Option<f64> {
        self.runs.iter().map(|r| r.agent.cost_usd).sum()
    }
}

/// Groups by (sample_id, condition) in order of first occurrence.
pub fn aggregate(runs: &[TrialResult]) -> Vec<AggregatedResult> {
    let mut order: Vec<(String, String)> = Vec::new();
    let mut groups: HashMap<(String, String), Vec<&TrialResult>> = HashMap::new();
    for run in runs {
        let key = (run.identity.sample_id.clone(), run.identity.condition.clone());
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(run);
    }

    order
        .into_iter()
        .map(|key| {
            let mut group = groups.remove(&key).unwrap_or_default();
            group.sort_by_key(|r| r.identity.repetition);
            let stats = |score: fn(&TrialResult) -> u8| {
                let values: Vec<f64> = group.iter().map(|r| f64::from(score(r))).collect();
                MetricStats::from_values(&values)
            };
            let factual_adherence = stats(|r| r.judge.factual_adherence);
            let completeness = stats(|r| r.judge.completeness);
            let helpfulness_and_clarity = stats(|r| r.judge.helpfulness_and_clarity);

            let mut unverified_claims: Vec<String> = Vec::new();
            for claim in group.iter().flat_map(|r| &r.judge.unverified_claims) {
                if !unverified_claims.contains(claim) {
                    unverified_claims.push(claim.clone());
                }
            }

            let (sample_id, condition) = key;
            AggregatedResult {
                sample_id,
                condition,
                runs: group.into_iter().cloned().collect(),
                factual_adherence,
                completeness,
                helpfulness_and_clarity,
                unverified_claims,
            }
        })
        .collect()
}

/// Condition-level roll-up: the average of per-sample means and stddevs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionStats {
    pub condition: String,
    pub samples: usize,
    pub runs: usize,
    pub factual_adherence: MetricStats,
    pub completeness: MetricStats,
    pub helpfulness_and_clarity: MetricStats,
    pub total_cost_usd: Option<f64>,
}

impl ConditionStats {
    pub fn metrics(&self) -> [(&'static str, MetricStats); 3] {
        [
            ("factual_adherence", self.factual_adherence),
            ("completeness", self.completeness),
            ("helpfulness_and_clarity", self.helpfulness_and_clarity),
        ]
    }
}

/// One entry per condition, sorted by condition name.
pub fn condition_stats(aggregated: &[AggregatedResult]) -> Vec<ConditionStats> {
    let mut by_condition: BTreeMap<&str, Vec<&AggregatedResult>> = BTreeMap::new();
    for result in aggregated {
        by_condition
            .entry(result.condition.as_str())
            .or_default()
            .push(result);
    }

    by_condition
        .into_iter()
        .map(|(condition, results)| {
            let n = results.len() as f64;
            let average = |metric: fn(&AggregatedResult) -> MetricStats| MetricStats {
                mean: results.iter().map(|r| metric(r).mean).sum::<f64>() / n,
                stddev: results.iter().map(|r| metric(r).stddev).sum::<f64>() / n,
            };
            ConditionStats {
                condition: condition.to_string(),
                samples: results.len(),
                runs: results.iter().map(|r| r.runs.len()).sum(),
                factual_adherence: average(|r| r.factual_adherence),
                completeness: average(|r| r.completeness),
                helpfulness_and_clarity: average(|r| r.helpfulness_and_clarity),
                total_cost_usd: results.iter().map(|r| r.total_cost_usd()).sum(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrialIdentity;
    use crate::providers::fake::{agent_outcome, judge_outcome};

    fn run(sample: &str, condition: &str, rep: u32, fa: u8, claims: &[&str]) -> TrialResult {
        let mut judge = judge_outcome(fa, 4, 4);
        judge.unverified_claims = claims.iter().map(|c| c.to_string()).collect();
        TrialResult {
            run_id: "run-1".into(),
            identity: TrialIdentity::new(sample, condition, rep),
            agent: agent_outcome("answer"),
            judge,
        }
    }

    #[test]
    fn sample_stddev_over_two_values() {
        let stats = MetricStats::from_values(&[3.0, 5.0]);
        assert_eq!(stats.mean, 4.0);
        assert!((stats.stddev - std::f64::consts::SQRT_2).abs() < 1e-4);
    }

    #[test]
    fn single_value_has_zero_stddev() {
        let stats = MetricStats::from_values(&[4.0]);
        assert_eq!(stats, MetricStats { mean: 4.0, stddev: 0.0 });
    }

    #[test]
    fn groups_keep_first_occurrence_order_and_sort_repetitions() {
        let runs = vec![
            run("s2", "baseline", 1, 5, &[]),
            run("s1", "baseline", 0, 3, &[]),
            run("s2", "baseline", 0, 3, &[]),
        ];
        let out = aggregate(&runs);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].sample_id, "s2");
        assert_eq!(out[1].sample_id, "s1");
        let reps: Vec<u32> = out[0].runs.iter().map(|r| r.identity.repetition).collect();
        assert_eq!(reps, [0, 1]);
        assert_eq!(out[0].factual_adherence.mean, 4.0);
        assert_eq!(out[1].factual_adherence.stddev, 0.0);
    }

    #[test]
    fn unverified_claims_are_deduplicated_in_order() {
        let runs = vec![
            run("s1", "baseline", 0, 4, &["b", "a"]),
            run("s1", "baseline", 1, 4, &["a", "c"]),
        ];
        assert_eq!(aggregate(&runs)[0].unverified_claims, ["b", "a", "c"]);
    }

    #[test]
    fn condition_stats_average_per_sample_figures() {
        let runs = vec![
            run("s1", "with-graph", 0, 3, &[]),
            run("s1", "with-graph", 1, 5, &[]),
            run("s2", "with-graph", 0, 4, &[]),
            run("s1", "baseline", 0, 2, &[]),
        ];
        let stats = condition_stats(&aggregate(&runs));
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].condition, "baseline");

        let graph = &stats[1];
        assert_eq!(graph.samples, 2);
        assert_eq!(graph.runs, 3);
        assert_eq!(graph.factual_adherence.mean, 4.0);
        assert!((graph.factual_adherence.stddev - std::f64::consts::SQRT_2 / 2.0).abs() < 1e-4);
        assert!((graph.total_cost_usd.unwrap() - 0.003).abs() < 1e-9);
    }

    #[test]
    fn missing_cost_makes_total_unknown() {
        let mut r = run("s1", "baseline", 0, 4, &[]);
        r.agent.cost_usd = None;
        let out = aggregate(&[r, run("s1", "baseline", 1, 4, &[])]);
        assert_eq!(out[0].total_cost_usd(), None);
    }
}
