pub mod config;
pub mod dataset;
pub mod engine;
pub mod errors;
pub mod model;
pub mod observer;
pub mod providers;
pub mod report;

pub use config::{load_config, EvalConfig};
pub use engine::runner::{RunPlan, Runner};
pub use errors::{CapabilityError, ConfigError, DatasetError, ReportError, RunError, TrialError};
pub use model::{
    AgentOutcome, Condition, JudgeOutcome, RunSummary, Sample, TrialIdentity, TrialResult,
};
pub use observer::{RunEvent, RunObserver};
