pub mod jsonl;

pub use jsonl::JsonlDataset;

use crate::errors::DatasetError;
use crate::model::Sample;
use sha2::{Digest, Sha256};

/// Samples in dataset order, plus the hash that pins the exact dataset version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDataset {
    pub samples: Vec<Sample>,
    pub sha256: String,
}

pub trait DatasetSupplier: Send + Sync {
    fn load(&self) -> Result<LoadedDataset, DatasetError>;
}

/// An already-loaded dataset supplies itself, hash included, without touching the source again.
impl DatasetSupplier for LoadedDataset {
    fn load(&self) -> Result<LoadedDataset, DatasetError> {
        Ok(self.clone())
    }
}

/// Fixed samples, hashed over their canonical JSON form.
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    samples: Vec<Sample>,
}

impl InMemoryDataset {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }
}

impl DatasetSupplier for InMemoryDataset {
    fn load(&self) -> Result<LoadedDataset, DatasetError> {
        let canonical = serde_json::to_vec(&self.samples).unwrap_or_default();
        Ok(LoadedDataset {
            samples: self.samples.clone(),
            sha256: sha256_hex(&canonical),
        })
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_empty_input_is_well_known() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn in_memory_hash_tracks_content() {
        let a = InMemoryDataset::new(vec![Sample {
            id: "0".into(),
            question: "q".into(),
            reference_answer: "a".into(),
        }]);
        let b = InMemoryDataset::new(vec![Sample {
            id: "0".into(),
            question: "q".into(),
            reference_answer: "b".into(),
        }]);
        let ha = a.load().unwrap().sha256;
        assert_eq!(ha, a.load().unwrap().sha256);
        assert_ne!(ha, b.load().unwrap().sha256);
        assert_eq!(ha.len(), 64);
    }
}
