//! Code pair records and their encoded form.

use serde::{Deserialize, Serialize};

use crate::error::{DataError, DataResult};

/// A pair of code snippets, optionally labeled as clones (1) or not (0).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodePairRecord {
    /// Identifier used to re-assemble submissions.
    #[serde(default, alias = "pair_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// First snippet.
    pub code1: String,
    /// Second snippet.
    pub code2: String,
    /// Clone label; absent at inference time.
    #[serde(default, alias = "similar", skip_serializing_if = "Option::is_none")]
    pub label: Option<u8>,
}

impl CodePairRecord {
    /// Create a labeled training record.
    pub fn labeled(code1: impl Into<String>, code2: impl Into<String>, label: u8) -> Self {
        Self {
            id: None,
            code1: code1.into(),
            code2: code2.into(),
            label: Some(label),
        }
    }

    /// Create an unlabeled inference record.
    pub fn unlabeled(id: impl Into<String>, code1: impl Into<String>, code2: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            code1: code1.into(),
            code2: code2.into(),
            label: None,
        }
    }

    /// Copy identifier and label onto new code text.
    pub fn with_code(&self, code1: String, code2: String) -> Self {
        Self {
            id: self.id.clone(),
            code1,
            code2,
            label: self.label,
        }
    }

    /// Check the label is binary.
    pub fn validate(&self) -> DataResult<()> {
        match self.label {
            Some(label) if label > 1 => Err(DataError::config(format!(
                "label must be 0 or 1, got {}",
                label
            ))),
            _ => Ok(()),
        }
    }
}

/// Model-ready token sequences for one code pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedExample {
    /// Token ids.
    pub input_ids: Vec<u32>,
    /// 1 for real tokens.
    pub attention_mask: Vec<u32>,
    /// Segment ids, only for encoder-only families.
    pub token_type_ids: Option<Vec<u32>>,
    /// Label copied from the record.
    pub label: Option<u32>,
}

impl EncodedExample {
    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    /// True when no tokens were produced.
    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }

    /// Verify sequence lengths agree and stay within `max_len`.
    pub fn check(&self, index: usize, max_len: usize) -> DataResult<()> {
        let len = self.input_ids.len();
        if self.attention_mask.len() != len {
            return Err(DataError::invalid_example(
                index,
                format!(
                    "attention_mask length {} != input_ids length {}",
                    self.attention_mask.len(),
                    len
                ),
            ));
        }
        if let Some(type_ids) = &self.token_type_ids {
            if type_ids.len() != len {
                return Err(DataError::invalid_example(
                    index,
                    format!("token_type_ids length {} != input_ids length {}", type_ids.len(), len),
                ));
            }
        }
        if len > max_len {
            return Err(DataError::invalid_example(
                index,
                format!("length {} exceeds max_input_length {}", len, max_len),
            ));
        }
        Ok(())
    }
}

/// Predicted label for one inference record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    /// Record identifier (row index when the input carried none).
    pub pair_id: String,
    /// Arg-max class.
    pub similar: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_aliases_deserialize() {
        let json = r#"{"pair_id":"TEST_0001","code1":"a","code2":"b","similar":1}"#;
        let record: CodePairRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id.as_deref(), Some("TEST_0001"));
        assert_eq!(record.label, Some(1));
    }

    #[test]
    fn test_unlabeled_record_has_no_label() {
        let json = r#"{"code1":"a","code2":"b"}"#;
        let record: CodePairRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.label, None);
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_non_binary_label_rejected() {
        let record = CodePairRecord::labeled("a", "b", 2);
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_with_code_keeps_identity() {
        let record = CodePairRecord::unlabeled("p1", "x", "y");
        let moved = record.with_code("u".into(), "v".into());
        assert_eq!(moved.id.as_deref(), Some("p1"));
        assert_eq!(moved.code1, "u");
        assert_eq!(record.code1, "x");
    }

    #[test]
    fn test_example_check() {
        let ok = EncodedExample {
            input_ids: vec![1, 2, 3],
            attention_mask: vec![1, 1, 1],
            token_type_ids: Some(vec![0, 0, 1]),
            label: Some(1),
        };
        assert!(ok.check(0, 3).is_ok());
        assert!(ok.check(0, 2).is_err());

        let bad = EncodedExample {
            attention_mask: vec![1, 1],
            ..ok
        };
        assert!(bad.check(5, 8).unwrap_err().to_string().contains("index 5"));
    }
}
