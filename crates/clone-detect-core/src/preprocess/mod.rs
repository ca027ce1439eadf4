//! Text-to-text normalization applied to code before tokenization.
//!
//! Each [`Preprocessor`] is a pure function of its input string. Batches are
//! transformed in parallel on the rayon pool and reassembled in record order.
//!
//! | Family        | Chain                                         |
//! |---------------|-----------------------------------------------|
//! | `EncoderOnly` | [`FunctionPreprocessor`] → [`AnnotationPreprocessor`] |
//! | `T5`, `Bart`  | [`BasePreprocessor`]                          |

mod annotation;
mod base;
mod filter;
mod function;

pub use annotation::AnnotationPreprocessor;
pub use base::BasePreprocessor;
pub use filter::{LengthFilter, DEFAULT_MAX_CODE_CHARS};
pub use function::FunctionPreprocessor;

use rayon::prelude::*;

use crate::family::ModelFamily;
use crate::record::CodePairRecord;

/// A deterministic code-to-code transform.
///
/// Implementations must never panic on malformed code; anything they cannot
/// parse passes through unchanged.
pub trait Preprocessor: Send + Sync {
    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    /// Normalize one snippet.
    fn process(&self, code: &str) -> String;

    /// Normalize both snippets of every record, preserving order.
    fn transform(&self, records: &[CodePairRecord]) -> Vec<CodePairRecord> {
        records
            .par_iter()
            .map(|r| r.with_code(self.process(&r.code1), self.process(&r.code2)))
            .collect()
    }
}

/// Ordered sequence of preprocessors applied as one transform.
pub struct PreprocessChain {
    steps: Vec<Box<dyn Preprocessor>>,
}

impl PreprocessChain {
    /// Build a chain from explicit steps.
    pub fn new(steps: Vec<Box<dyn Preprocessor>>) -> Self {
        Self { steps }
    }

    /// Chain used for a model family.
    pub fn for_family(family: ModelFamily) -> Self {
        match family {
            ModelFamily::EncoderOnly => Self::new(vec![
                Box::new(FunctionPreprocessor::new()),
                Box::new(AnnotationPreprocessor::new()),
            ]),
            ModelFamily::T5 | ModelFamily::Bart => Self::new(vec![Box::new(BasePreprocessor::new())]),
        }
    }

    /// Step names in application order.
    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Apply every step to one snippet.
    pub fn apply(&self, code: &str) -> String {
        let mut current = code.to_string();
        for step in &self.steps {
            current = step.process(&current);
        }
        current
    }

    /// Apply the chain to every record in parallel, preserving order.
    pub fn transform(&self, records: &[CodePairRecord]) -> Vec<CodePairRecord> {
        let out: Vec<CodePairRecord> = records
            .par_iter()
            .map(|r| r.with_code(self.apply(&r.code1), self.apply(&r.code2)))
            .collect();
        tracing::debug!(steps = ?self.names(), records = out.len(), "Preprocessed records");
        out
    }
}

impl std::fmt::Debug for PreprocessChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreprocessChain")
            .field("steps", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_selection_per_family() {
        assert_eq!(
            PreprocessChain::for_family(ModelFamily::EncoderOnly).names(),
            vec!["function", "annotation"]
        );
        assert_eq!(PreprocessChain::for_family(ModelFamily::T5).names(), vec!["base"]);
        assert_eq!(PreprocessChain::for_family(ModelFamily::Bart).names(), vec!["base"]);
    }

    #[test]
    fn test_transform_preserves_order_and_labels() {
        let records: Vec<CodePairRecord> = (0..64)
            .map(|i| {
                let mut r = CodePairRecord::labeled(
                    format!("def f{i}(x):\n    return x  # note\n"),
                    format!("def g{i}(y): return y"),
                    (i % 2) as u8,
                );
                r.id = Some(format!("id{i}"));
                r
            })
            .collect();

        let chain = PreprocessChain::for_family(ModelFamily::EncoderOnly);
        let out = chain.transform(&records);

        assert_eq!(out.len(), records.len());
        for (i, r) in out.iter().enumerate() {
            assert_eq!(r.id.as_deref(), Some(format!("id{i}").as_str()));
            assert_eq!(r.label, Some((i % 2) as u8));
            assert_eq!(r.code1, "def func0(x):\n    return x");
            assert_eq!(r.code2, "def func0(y): return y");
        }
    }

    #[test]
    fn test_trait_transform_matches_process() {
        let base = BasePreprocessor::new();
        let records = vec![CodePairRecord::labeled("a  \r\n", "\u{feff}b", 0)];
        let out = base.transform(&records);
        assert_eq!(out[0].code1, base.process("a  \r\n"));
        assert_eq!(out[0].code2, "b");
    }
}
