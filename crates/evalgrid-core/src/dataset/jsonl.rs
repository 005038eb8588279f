//! JSONL dataset loader. One JSON object per non-blank line.

use super::{sha256_hex, DatasetSupplier, LoadedDataset};
use crate::config::DatasetConfig;
use crate::errors::DatasetError;
use crate::model::Sample;
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct JsonlDataset {
    pub path: PathBuf,
    pub question_key: String,
    pub answer_key: String,
    /// When unset, the sample id is the zero-based index among non-blank lines.
    pub id_key: Option<String>,
}

impl JsonlDataset {
    pub fn from_config(cfg: &DatasetConfig) -> Self {
        Self {
            path: cfg.path.clone(),
            question_key: cfg.question_key.clone(),
            answer_key: cfg.answer_key.clone(),
            id_key: cfg.id_key.clone(),
        }
    }

    /// Parses already-read bytes; `load` is this plus the file read.
    /// Every bad line is collected so the file can be fixed in one pass.
    pub fn parse(&self, raw: &[u8]) -> Result<LoadedDataset, DatasetError> {
        let text = String::from_utf8_lossy(raw);
        let mut samples = Vec::new();
        let mut problems = Vec::new();
        let mut seen = HashSet::new();
        let mut index = 0usize;

        for (line_idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let line_no = line_idx + 1;
            let position = index;
            index += 1;

            let value: serde_json::Value = match serde_json::from_str(line) {
                Ok(v) => v,
                Err(e) => {
                    problems.push(DatasetError::Json {
                        line: line_no,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let question = field_text(&value, &self.question_key);
            let reference_answer = field_text(&value, &self.answer_key);
            let id = match &self.id_key {
                Some(key) => field_text(&value, key),
                None => Some(position.to_string()),
            };
            let (Some(question), Some(reference_answer), Some(id)) =
                (question, reference_answer, id)
            else {
                let keys = [
                    Some(&self.question_key),
                    Some(&self.answer_key),
                    self.id_key.as_ref(),
                ];
                for key in keys.into_iter().flatten() {
                    if field_text(&value, key).is_none() {
                        problems.push(DatasetError::MissingKey {
                            line: line_no,
                            key: key.clone(),
                        });
                    }
                }
                continue;
            };

            if !seen.insert(id.clone()) {
                problems.push(DatasetError::DuplicateId { line: line_no, id });
                continue;
            }
            samples.push(Sample {
                id,
                question,
                reference_answer,
            });
        }

        if !problems.is_empty() {
            return Err(DatasetError::Lines {
                path: self.path.display().to_string(),
                errors: problems,
            });
        }
        if samples.is_empty() {
            return Err(DatasetError::Empty {
                path: self.path.display().to_string(),
            });
        }

        Ok(LoadedDataset {
            samples,
            sha256: sha256_hex(raw),
        })
    }
}

impl DatasetSupplier for JsonlDataset {
    fn load(&self) -> Result<LoadedDataset, DatasetError> {
        let raw = std::fs::read(&self.path).map_err(|e| DatasetError::Read {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        let loaded = self.parse(&raw)?;
        tracing::debug!(
            path = %self.path.display(),
            samples = loaded.samples.len(),
            sha256 = %loaded.sha256,
            "dataset loaded"
        );
        Ok(loaded)
    }
}

/// Any present, non-null value. Non-strings keep their JSON text (`42`, `true`).
fn field_text(value: &serde_json::Value, key: &str) -> Option<String> {
    match value.get(key)? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn loader(path: PathBuf) -> JsonlDataset {
        JsonlDataset {
            path,
            question_key: "question".into(),
            answer_key: "answer".into(),
            id_key: None,
        }
    }

    #[test]
    fn loads_samples_in_file_order_and_hashes_raw_bytes() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        let body = concat!(
            "{\"question\": \"What is 6*7?\", \"answer\": \"42\"}\n",
            "\n",
            "{\"question\": \"Capital of France?\", \"answer\": \"Paris\"}\n",
        );
        f.write_all(body.as_bytes()).unwrap();

        let loaded = loader(f.path().to_path_buf()).load().unwrap();

        assert_eq!(loaded.samples.len(), 2);
        assert_eq!(loaded.samples[0].id, "0");
        assert_eq!(loaded.samples[1].id, "1");
        assert_eq!(loaded.samples[1].reference_answer, "Paris");
        assert_eq!(loaded.sha256, sha256_hex(body.as_bytes()));
    }

    #[test]
    fn id_key_is_used_when_configured() {
        let ds = JsonlDataset {
            id_key: Some("id".into()),
            ..loader(PathBuf::from("inline.jsonl"))
        };
        let loaded = ds
            .parse(b"{\"id\": \"q-7\", \"question\": \"q\", \"answer\": \"a\"}\n{\"id\": 8, \"question\": \"q\", \"answer\": \"a\"}")
            .unwrap();
        let ids: Vec<_> = loaded.samples.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["q-7", "8"]);
    }

    fn line_errors(err: DatasetError) -> Vec<DatasetError> {
        match err {
            DatasetError::Lines { errors, .. } => errors,
            other => panic!("expected line errors, got {other:?}"),
        }
    }

    #[test]
    fn missing_answer_key_reports_line() {
        let err = loader(PathBuf::from("inline.jsonl"))
            .parse(b"{\"question\": \"q\", \"answer\": \"a\"}\n{\"question\": \"q\"}\n")
            .unwrap_err();
        assert_eq!(
            line_errors(err),
            [DatasetError::MissingKey {
                line: 2,
                key: "answer".into()
            }]
        );
    }

    #[test]
    fn non_string_values_keep_their_json_text() {
        let loaded = loader(PathBuf::from("inline.jsonl"))
            .parse(br#"{"question":"What is 6*7?","answer":42}
{"question":"Is water wet?","answer":true}"#)
            .unwrap();
        assert_eq!(loaded.samples[0].reference_answer, "42");
        assert_eq!(loaded.samples[1].reference_answer, "true");
    }

    #[test]
    fn null_value_counts_as_missing() {
        let err = loader(PathBuf::from("inline.jsonl"))
            .parse(br#"{"question":"q","answer":null}"#)
            .unwrap_err();
        assert!(matches!(
            line_errors(err).as_slice(),
            [DatasetError::MissingKey { line: 1, key }] if key == "answer"
        ));
    }

    #[test]
    fn every_bad_line_is_reported_together() {
        let err = loader(PathBuf::from("qa.jsonl"))
            .parse(b"{\"question\":\"q\"}\nnot json\n{\"question\":\"q\",\"answer\":\"a\"}\n{}\n")
            .unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("dataset qa.jsonl has 4 problem(s)"), "got: {message}");

        let errors = line_errors(err);
        assert_eq!(errors.len(), 4);
        assert_eq!(
            errors[0],
            DatasetError::MissingKey {
                line: 1,
                key: "answer".into()
            }
        );
        assert!(matches!(errors[1], DatasetError::Json { line: 2, .. }));
        assert!(matches!(&errors[2], DatasetError::MissingKey { line: 4, key } if key == "question"));
        assert!(matches!(&errors[3], DatasetError::MissingKey { line: 4, key } if key == "answer"));
    }

    #[test]
    fn invalid_json_and_duplicates_and_empty_are_errors() {
        let ds = JsonlDataset {
            id_key: Some("id".into()),
            ..loader(PathBuf::from("inline.jsonl"))
        };
        assert!(matches!(
            line_errors(ds.parse(b"{not json}").unwrap_err()).as_slice(),
            [DatasetError::Json { line: 1, .. }]
        ));
        assert!(matches!(
            line_errors(
                ds.parse(b"{\"id\":\"a\",\"question\":\"q\",\"answer\":\"a\"}\n{\"id\":\"a\",\"question\":\"q\",\"answer\":\"a\"}")
                    .unwrap_err()
            )
            .as_slice(),
            [DatasetError::DuplicateId { line: 2, .. }]
        ));
        assert!(matches!(ds.parse(b"\n\n"), Err(DatasetError::Empty { .. })));
    }

    #[test]
    fn unreadable_file_is_a_read_error() {
        let err = loader(PathBuf::from("/definitely/not/here.jsonl"))
            .load()
            .unwrap_err();
        assert!(matches!(err, DatasetError::Read { .. }));
    }
}
