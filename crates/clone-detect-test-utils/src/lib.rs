//! Test fixtures for the clone-detect workspace.
//!
//! Tokenizers are built in memory from JSON so tests need no downloads. They
//! use a small word-level vocabulary and the special-token templates of the
//! three supported model families.

pub mod fixtures;

pub use fixtures::{
    bart_tokenizer, bert_tokenizer, bert_tokenizer_json, sample_code_pairs, t5_tokenizer,
};
