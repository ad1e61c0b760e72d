#![warn(clippy::pedantic)]
#![allow(
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::doc_markdown,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::module_name_repetitions,
    clippy::float_cmp
)]

//! decoder-eval generation - sampling, decoding and scoring
//!
//! - `Sampler` - temperature-scaled top-k categorical draw
//! - `TextGenerator` - autoregressive decoding over a sliding `ContextWindow`
//! - `Evaluator` - shorter-length alignment and corpus-level scoring
//! - `EvalPipeline` - drives both over the leading records of a dataset
//! - `DecoderModel` - burn transformer implementing `LanguageModel`

pub mod error;
pub mod eval;
pub mod inference;
pub mod model;
pub mod pipeline;
pub mod sampler;
pub mod test_utils;
pub mod text_generation;
pub mod window;

pub use error::{EvalError, GenerationError};
pub use eval::{EvaluationPair, Evaluator, ScoreReport, truncate_chars};
pub use inference::{CancelToken, Generation, Interrupt, StopReason, TextGenerator};
pub use model::{LanguageModel, ModelError};
pub use pipeline::{BatchOutcome, EvalPipeline, EvalReport, SampleFailure, SampleReport};
pub use sampler::{Sample, SampleConfig, Sampler};
pub use text_generation::{DecoderModel, DecoderModelConfig};
pub use window::ContextWindow;
