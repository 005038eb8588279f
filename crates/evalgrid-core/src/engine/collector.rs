use crate::model::{RunSummary, TrialIdentity, TrialResult};
use std::collections::BTreeMap;

/// Accumulates results keyed by identity; iteration order is the summary order.
#[derive(Debug, Default)]
pub struct ResultCollector {
    results: BTreeMap<TrialIdentity, TrialResult>,
}

impl ResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the rejected result if its identity was already recorded.
    pub fn add(&mut self, result: TrialResult) -> Result<(), Box<TrialResult>> {
        if self.results.contains_key(&result.identity) {
            return Err(Box::new(result));
        }
        self.results.insert(result.identity.clone(), result);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn into_summary(
        self,
        run_id: impl Into<String>,
        dataset_sha256: impl Into<String>,
        config_name: impl Into<String>,
    ) -> RunSummary {
        RunSummary {
            run_id: run_id.into(),
            dataset_sha256: dataset_sha256.into(),
            config_name: config_name.into(),
            runs: self.results.into_values().collect(),
        }
    }
}

impl Extend<TrialResult> for ResultCollector {
    /// Later duplicates are dropped with a warning.
    fn extend<I: IntoIterator<Item = TrialResult>>(&mut self, iter: I) {
        for result in iter {
            if let Err(dup) = self.add(result) {
                tracing::warn!(trial = %dup.identity, "duplicate trial result dropped");
            }
        }
    }
}
