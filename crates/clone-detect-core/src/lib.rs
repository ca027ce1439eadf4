//! Data preparation for code clone detection.
//!
//! Raw `(code1, code2, label?)` records flow through four stages:
//!
//! 1. [`preprocess`]: family-specific text normalization
//! 2. [`encode`]: pair tokenization under the family's conventions
//! 3. [`collator`]: right-padding into rectangular tensors
//! 4. the training crate: forward passes and losses
//!
//! The [`ModelFamily`] is resolved once from the pretrained identifier and
//! drives every per-family choice.
//!
//! # Example
//!
//! ```
//! use clone_detect_core::{ModelFamily, PreprocessChain};
//!
//! let family = ModelFamily::from_identifier("microsoft/codebert-base").unwrap();
//! let chain = PreprocessChain::for_family(family);
//! assert_eq!(chain.apply("def f(x): return x+1"), "def func0(x): return x+1");
//! ```

pub mod collator;
pub mod config;
pub mod dataset;
pub mod encode;
pub mod error;
pub mod family;
pub mod preprocess;
pub mod record;
pub mod rng;
pub mod tokenizer;

pub use collator::{Batch, PaddingCollator, IGNORE_INDEX};
pub use config::{DataConfig, PaddingStrategy, TruncationSide};
pub use dataset::{DatasetSource, FoldSelection, Split};
pub use encode::{encoder_for, BartEncoder, BertEncoder, PairEncoder, T5Encoder};
pub use error::{DataError, DataResult};
pub use family::ModelFamily;
pub use preprocess::{
    AnnotationPreprocessor, BasePreprocessor, FunctionPreprocessor, LengthFilter, PreprocessChain,
    Preprocessor,
};
pub use record::{CodePairRecord, EncodedExample, Prediction};
pub use rng::RandomContext;
pub use tokenizer::CodeTokenizer;
