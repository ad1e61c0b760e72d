#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

//! decoder-eval data - corpora and tokenizers
//!
//! This crate provides:
//! - `TokenizerTrait` - the vocabulary boundary (encode, decode, EOS)
//! - `Tokenizer` - HuggingFace tokenizer wrapper
//! - `CharTokenizer` - character-level vocabulary
//! - `TextDataset` - ordered text records from the hub or a local file

pub mod dataset;
pub mod tokenizer;

pub use dataset::{DatasetError, DatasetItem, TextDataset, TextGenerationItem, first_records};
pub use tokenizer::{CharTokenizer, Tokenizer, TokenizerError, TokenizerTrait, load_tokenizer};
