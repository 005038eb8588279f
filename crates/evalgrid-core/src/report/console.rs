use super::aggregate::{AggregatedResult, ConditionStats, MetricStats};
use crate::observer::{RunEvent, RunObserver};
use std::fmt::Write as _;
use std::sync::Mutex;
use std::time::{Duration, Instant};

// --- progress N/M (throttled, completion-order) ---

#[must_use]
pub fn format_progress_line(done: usize, total: usize, condition: &str) -> String {
    format!("Running trial {done}/{total} ({condition})...")
}

/// Minimum interval between progress lines.
const PROGRESS_MIN_INTERVAL_MS: u64 = 200;

/// For large grids, print at most every this many trials (about 10% steps).
pub(crate) fn progress_step(total: usize) -> usize {
    if total <= 10 {
        1
    } else {
        std::cmp::max(1, total / 10)
    }
}

/// Observer that prints throttled progress lines to stderr.
/// The first and the final line are always printed.
pub struct ConsoleProgress {
    state: Mutex<ThrottleState>,
}

struct ThrottleState {
    last_emit: Option<Instant>,
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self {
            state: Mutex::new(ThrottleState { last_emit: None }),
        }
    }
}

impl ConsoleProgress {
    fn should_emit(&self, done: usize, total: usize, now: Instant) -> bool {
        if total <= 1 {
            return false;
        }
        let mut g = self.state.lock().expect("progress throttle lock");
        let emit_final = done == total;
        let emit_step = done % progress_step(total) == 0 || done == 1;
        let interval_ok = g
            .last_emit
            .map(|t| {
                now.saturating_duration_since(t) >= Duration::from_millis(PROGRESS_MIN_INTERVAL_MS)
            })
            .unwrap_or(true);
        let ok = emit_final || (emit_step && interval_ok);
        if ok {
            g.last_emit = Some(now);
        }
        ok
    }
}

impl RunObserver for ConsoleProgress {
    fn on_event(&self, event: &RunEvent) {
        if let RunEvent::Progress {
            condition,
            done,
            total,
            ..
        } = event
        {
            if self.should_emit(*done, *total, Instant::now()) {
                eprintln!("{}", format_progress_line(*done, *total, condition));
            }
        }
    }
}

// --- result tables ---

fn cell(stats: MetricStats) -> String {
    format!("{:.2} ± {:.2}", stats.mean, stats.stddev)
}

/// One row per condition: mean ± stddev for each metric, runs and cost.
pub fn format_condition_table(stats: &[ConditionStats]) -> String {
    let mut out = String::new();
    let width = stats
        .iter()
        .map(|s| s.condition.len())
        .max()
        .unwrap_or(0)
        .max("condition".len());
    let _ = writeln!(
        out,
        "{:<width$}  {:>5}  {:>13}  {:>13}  {:>13}  {:>9}",
        "condition", "runs", "factual", "complete", "helpful", "cost_usd"
    );
    for s in stats {
        let [fa, co, hc] = s.metrics().map(|(_, m)| cell(m));
        let cost = s
            .total_cost_usd
            .map(|c| format!("{c:.4}"))
            .unwrap_or_else(|| "-".into());
        let _ = writeln!(
            out,
            "{:<width$}  {:>5}  {:>13}  {:>13}  {:>13}  {:>9}",
            s.condition, s.runs, fa, co, hc, cost
        );
    }
    out
}

/// One line per (sample, condition) group, with unverified claims listed below.
pub fn format_group_lines(groups: &[AggregatedResult]) -> String {
    let mut out = String::new();
    for g in groups {
        let metrics: Vec<String> = g
            .metrics()
            .iter()
            .map(|(name, m)| format!("{name}={}", cell(*m)))
            .collect();
        let _ = writeln!(
            out,
            "{}/{} (n={}): {}",
            g.sample_id,
            g.condition,
            g.runs.len(),
            metrics.join(" ")
        );
        for claim in &g.unverified_claims {
            let _ = writeln!(out, "    unverified: {claim}");
        }
    }
    out
}
