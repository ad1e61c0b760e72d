//! Corpus BLEU (Papineni et al., 2002) without smoothing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{CorpusMetric, MetricError, MetricScore, check_inputs, tokenize::tokenize_13a};

pub const DEFAULT_MAX_ORDER: usize = 4;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BleuScore {
    pub bleu: f64,
    /// Modified n-gram precision for orders 1..=max_order.
    pub precisions: Vec<f64>,
    pub brevity_penalty: f64,
    pub length_ratio: f64,
    pub translation_length: usize,
    pub reference_length: usize,
}

#[derive(Clone, Debug)]
pub struct Bleu {
    max_order: usize,
}

impl Default for Bleu {
    fn default() -> Self {
        Self {
            max_order: DEFAULT_MAX_ORDER,
        }
    }
}

impl Bleu {
    #[must_use]
    pub fn with_max_order(max_order: usize) -> Self {
        assert!(max_order > 0, "max_order must be > 0");
        Self { max_order }
    }

    /// Score pre-tokenized segments. Counts are pooled over the whole corpus before
    /// precisions are taken.
    #[must_use]
    pub fn score_tokens(&self, translations: &[Vec<String>], references: &[Vec<String>]) -> BleuScore {
        let max_order = self.max_order;
        let mut matches_by_order = vec![0usize; max_order];
        let mut possible_matches_by_order = vec![0usize; max_order];
        let mut translation_length = 0;
        let mut reference_length = 0;

        for (translation, reference) in translations.iter().zip(references) {
            translation_length += translation.len();
            reference_length += reference.len();

            let reference_counts = ngram_counts(reference, max_order);
            for (ngram, count) in ngram_counts(translation, max_order) {
                let clipped = count.min(reference_counts.get(ngram).copied().unwrap_or(0));
                matches_by_order[ngram.len() - 1] += clipped;
            }
            for order in 1..=max_order {
                if translation.len() >= order {
                    possible_matches_by_order[order - 1] += translation.len() - order + 1;
                }
            }
        }

        let precisions: Vec<f64> = matches_by_order
            .iter()
            .zip(&possible_matches_by_order)
            .map(|(&matches, &possible)| {
                if possible > 0 {
                    matches as f64 / possible as f64
                } else {
                    0.0
                }
            })
            .collect();

        let geo_mean = if precisions.iter().all(|&p| p > 0.0) {
            (precisions.iter().map(|p| p.ln()).sum::<f64>() / max_order as f64).exp()
        } else {
            0.0
        };

        // An empty reference side leaves the ratio undefined; report zeros.
        let (length_ratio, brevity_penalty) = if reference_length == 0 {
            (0.0, 0.0)
        } else {
            let ratio = translation_length as f64 / reference_length as f64;
            let bp = if ratio > 1.0 {
                1.0
            } else if ratio == 0.0 {
                0.0
            } else {
                (1.0 - 1.0 / ratio).exp()
            };
            (ratio, bp)
        };

        BleuScore {
            bleu: geo_mean * brevity_penalty,
            precisions,
            brevity_penalty,
            length_ratio,
            translation_length,
            reference_length,
        }
    }
}

impl CorpusMetric for Bleu {
    fn name(&self) -> &'static str {
        "bleu"
    }

    fn compute(&self, predictions: &[String], references: &[String]) -> Result<MetricScore, MetricError> {
        check_inputs(predictions, references)?;
        let translations: Vec<Vec<String>> = predictions.iter().map(|p| tokenize_13a(p)).collect();
        let references: Vec<Vec<String>> = references.iter().map(|r| tokenize_13a(r)).collect();
        Ok(MetricScore::Bleu(self.score_tokens(&translations, &references)))
    }
}

fn ngram_counts(tokens: &[String], max_order: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    for order in 1..=max_order {
        for ngram in tokens.windows(order) {
            *counts.entry(ngram).or_insert(0) += 1;
        }
    }
    counts
}
