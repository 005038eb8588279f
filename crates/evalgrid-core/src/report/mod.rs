//! Run artifacts: statistics, JSON files and console rendering.

pub mod aggregate;
pub mod console;
pub mod json;

pub use aggregate::{aggregate, condition_stats, AggregatedResult, ConditionStats, MetricStats};
pub use json::{read_summary, write_run_outputs, AggregateReport, RunOutputs};
