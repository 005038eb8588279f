use crate::model::{Condition, Sample, TrialIdentity};
use std::sync::Arc;

/// One cell of the grid: what to run and under which condition.
#[derive(Debug, Clone)]
pub struct Trial {
    pub identity: TrialIdentity,
    pub sample: Arc<Sample>,
    pub condition: Arc<Condition>,
}

/// Enumerates samples (outer) × conditions (declaration order) × repetitions
/// `0..repetitions` (inner).
pub fn trial_grid(
    samples: &[Arc<Sample>],
    conditions: &[Arc<Condition>],
    repetitions: u32,
) -> Vec<Trial> {
    let mut trials =
        Vec::with_capacity(samples.len() * conditions.len() * repetitions as usize);
    for sample in samples {
        for condition in conditions {
            for repetition in 0..repetitions {
                trials.push(Trial {
                    identity: TrialIdentity::new(
                        sample.id.clone(),
                        condition.name.clone(),
                        repetition,
                    ),
                    sample: sample.clone(),
                    condition: condition.clone(),
                });
            }
        }
    }
    trials
}
