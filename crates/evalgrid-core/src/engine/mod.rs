//! Trial execution: grid enumeration, retry, the per-trial pipeline, progress
//! accounting, bounded-concurrency scheduling and result collection.

pub mod collector;
pub mod grid;
pub mod pipeline;
pub mod progress;
pub mod retry;
pub mod runner;
pub mod scheduler;

pub use collector::ResultCollector;
pub use grid::{trial_grid, Trial};
pub use pipeline::TrialPipeline;
pub use progress::{ProgressCounters, ProgressSnapshot, ProgressTracker};
pub use retry::{RetryNotice, RetryPolicy};
pub use runner::{RunPlan, Runner};
pub use scheduler::{ExecutionSettings, Scheduler};
