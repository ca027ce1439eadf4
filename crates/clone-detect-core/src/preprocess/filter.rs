//! Training-time length filter.

use crate::record::CodePairRecord;

/// Default character limit for either snippet of a training record.
pub const DEFAULT_MAX_CODE_CHARS: usize = 4000;

/// Drops records whose `code1` or `code2` has at least `max_chars`
/// characters. Applied before preprocessing, training data only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthFilter {
    pub max_chars: usize,
}

impl Default for LengthFilter {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CODE_CHARS,
        }
    }
}

impl LengthFilter {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// Whether a record survives the filter.
    pub fn keep(&self, record: &CodePairRecord) -> bool {
        record.code1.chars().count() < self.max_chars && record.code2.chars().count() < self.max_chars
    }

    /// Filter records, logging how many were dropped.
    pub fn apply(&self, records: Vec<CodePairRecord>) -> Vec<CodePairRecord> {
        let before = records.len();
        let kept: Vec<CodePairRecord> = records.into_iter().filter(|r| self.keep(r)).collect();
        tracing::info!(
            max_chars = self.max_chars,
            before = before,
            after = kept.len(),
            "Applied length filter"
        );
        kept
    }
}
