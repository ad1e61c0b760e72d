#![warn(clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::cast_precision_loss,
    clippy::module_name_repetitions
)]

//! Corpus-level text overlap metrics
//!
//! - **BLEU**: clipped n-gram precision pooled over the corpus, with brevity penalty
//! - **ROUGE**: 1/2/L/Lsum F-measures averaged over the corpus

pub mod bleu;
pub mod rouge;
pub mod tokenize;

pub use bleu::{Bleu, BleuScore};
pub use rouge::{Rouge, RougeScore};

use serde::Serialize;

/// A metric computed jointly over all candidate/reference pairs.
pub trait CorpusMetric: Send + Sync {
    fn name(&self) -> &'static str;

    /// `predictions[i]` is scored against `references[i]`.
    fn compute(&self, predictions: &[String], references: &[String]) -> Result<MetricScore, MetricError>;
}

/// Structured result of one metric.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricScore {
    Bleu(BleuScore),
    Rouge(RougeScore),
}

impl std::fmt::Display for MetricScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bleu(s) => {
                write!(f, "bleu={:.4} precisions=[", s.bleu)?;
                for (i, p) in s.precisions.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p:.4}")?;
                }
                write!(
                    f,
                    "] brevity_penalty={:.4} length_ratio={:.4} translation_length={} reference_length={}",
                    s.brevity_penalty, s.length_ratio, s.translation_length, s.reference_length
                )
            }
            Self::Rouge(s) => write!(
                f,
                "rouge1={:.4} rouge2={:.4} rougeL={:.4} rougeLsum={:.4}",
                s.rouge1, s.rouge2, s.rouge_l, s.rouge_lsum
            ),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetricError {
    #[error("unknown metric '{0}' (available: bleu, rouge)")]
    Unknown(String),
    #[error("no predictions to score")]
    EmptyInput,
    #[error("{predictions} predictions but {references} references")]
    LengthMismatch {
        predictions: usize,
        references: usize,
    },
}

/// Look up a metric by its report name.
#[must_use]
pub fn metric_by_name(name: &str) -> Option<Box<dyn CorpusMetric>> {
    match name.trim().to_lowercase().as_str() {
        "bleu" => Some(Box::new(Bleu::default())),
        "rouge" => Some(Box::new(Rouge)),
        _ => None,
    }
}

pub(crate) fn check_inputs(predictions: &[String], references: &[String]) -> Result<(), MetricError> {
    if predictions.len() != references.len() {
        return Err(MetricError::LengthMismatch {
            predictions: predictions.len(),
            references: references.len(),
        });
    }
    if predictions.is_empty() {
        return Err(MetricError::EmptyInput);
    }
    Ok(())
}
