//! ROUGE-1/2/L/Lsum (Lin, 2004), F-measures averaged over the corpus.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{CorpusMetric, MetricError, MetricScore, check_inputs, tokenize::tokenize_rouge};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RougeComponents {
    pub precision: f64,
    pub recall: f64,
    pub fmeasure: f64,
}

impl RougeComponents {
    fn from_counts(hits: usize, prediction_total: usize, reference_total: usize) -> Self {
        if prediction_total == 0 || reference_total == 0 {
            return Self::default();
        }
        let precision = hits as f64 / prediction_total as f64;
        let recall = hits as f64 / reference_total as f64;
        let fmeasure = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            precision,
            recall,
            fmeasure,
        }
    }
}

/// Mean F-measure of each ROUGE variant over the corpus.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RougeScore {
    pub rouge1: f64,
    pub rouge2: f64,
    #[serde(rename = "rougeL")]
    pub rouge_l: f64,
    #[serde(rename = "rougeLsum")]
    pub rouge_lsum: f64,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Rouge;

/// Per-pair scores, before corpus aggregation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PairRouge {
    pub rouge1: RougeComponents,
    pub rouge2: RougeComponents,
    pub rouge_l: RougeComponents,
    pub rouge_lsum: RougeComponents,
}

impl Rouge {
    #[must_use]
    pub fn score_pair(&self, prediction: &str, reference: &str) -> PairRouge {
        let prediction_tokens = tokenize_rouge(prediction);
        let reference_tokens = tokenize_rouge(reference);
        PairRouge {
            rouge1: rouge_n(&prediction_tokens, &reference_tokens, 1),
            rouge2: rouge_n(&prediction_tokens, &reference_tokens, 2),
            rouge_l: rouge_l(&prediction_tokens, &reference_tokens),
            rouge_lsum: rouge_lsum(prediction, reference),
        }
    }
}

impl CorpusMetric for Rouge {
    fn name(&self) -> &'static str {
        "rouge"
    }

    fn compute(&self, predictions: &[String], references: &[String]) -> Result<MetricScore, MetricError> {
        check_inputs(predictions, references)?;
        let pairs: Vec<PairRouge> = predictions
            .iter()
            .zip(references)
            .map(|(p, r)| self.score_pair(p, r))
            .collect();

        let n = pairs.len() as f64;
        let mean = |f: fn(&PairRouge) -> f64| pairs.iter().map(f).sum::<f64>() / n;
        Ok(MetricScore::Rouge(RougeScore {
            rouge1: mean(|p| p.rouge1.fmeasure),
            rouge2: mean(|p| p.rouge2.fmeasure),
            rouge_l: mean(|p| p.rouge_l.fmeasure),
            rouge_lsum: mean(|p| p.rouge_lsum.fmeasure),
        }))
    }
}

fn counts<'a>(tokens: &'a [String], n: usize) -> HashMap<&'a [String], usize> {
    let mut counts = HashMap::new();
    for ngram in tokens.windows(n) {
        *counts.entry(ngram).or_insert(0) += 1;
    }
    counts
}

fn rouge_n(prediction: &[String], reference: &[String], n: usize) -> RougeComponents {
    let prediction_counts = counts(prediction, n);
    let reference_counts = counts(reference, n);
    let hits = prediction_counts
        .iter()
        .map(|(ngram, &count)| count.min(reference_counts.get(ngram).copied().unwrap_or(0)))
        .sum();
    RougeComponents::from_counts(
        hits,
        prediction_counts.values().sum(),
        reference_counts.values().sum(),
    )
}

fn rouge_l(prediction: &[String], reference: &[String]) -> RougeComponents {
    let table = lcs_table(reference, prediction);
    let lcs = table[reference.len()][prediction.len()];
    RougeComponents::from_counts(lcs, prediction.len(), reference.len())
}

/// Summary-level LCS over newline-separated sentences.
fn rouge_lsum(prediction: &str, reference: &str) -> RougeComponents {
    let sentences = |text: &str| -> Vec<Vec<String>> {
        text.split('\n')
            .filter(|s| !s.is_empty())
            .map(tokenize_rouge)
            .collect()
    };
    let prediction_sents = sentences(prediction);
    let reference_sents = sentences(reference);

    let prediction_total: usize = prediction_sents.iter().map(Vec::len).sum();
    let reference_total: usize = reference_sents.iter().map(Vec::len).sum();
    if prediction_total == 0 || reference_total == 0 {
        return RougeComponents::default();
    }

    let token_counts = |sents: &[Vec<String>]| {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for token in sents.iter().flatten() {
            *counts.entry(token.clone()).or_insert(0) += 1;
        }
        counts
    };
    let mut prediction_counts = token_counts(&prediction_sents);
    let mut reference_counts = token_counts(&reference_sents);

    let mut hits = 0;
    for reference_sent in &reference_sents {
        for token in union_lcs(reference_sent, &prediction_sents) {
            let (Some(p), Some(r)) = (
                prediction_counts.get_mut(token),
                reference_counts.get_mut(token),
            ) else {
                continue;
            };
            if *p > 0 && *r > 0 {
                hits += 1;
                *p -= 1;
                *r -= 1;
            }
        }
    }

    RougeComponents::from_counts(hits, prediction_total, reference_total)
}

/// Tokens of `reference` covered by the LCS with any of the candidate sentences.
fn union_lcs<'a>(reference: &'a [String], candidates: &[Vec<String>]) -> Vec<&'a String> {
    let mut covered = vec![false; reference.len()];
    for candidate in candidates {
        for idx in lcs_indices(reference, candidate) {
            covered[idx] = true;
        }
    }
    reference
        .iter()
        .zip(covered)
        .filter_map(|(token, hit)| hit.then_some(token))
        .collect()
}

fn lcs_table(reference: &[String], candidate: &[String]) -> Vec<Vec<usize>> {
    let mut table = vec![vec![0usize; candidate.len() + 1]; reference.len() + 1];
    for i in 1..=reference.len() {
        for j in 1..=candidate.len() {
            table[i][j] = if reference[i - 1] == candidate[j - 1] {
                table[i - 1][j - 1] + 1
            } else {
                table[i - 1][j].max(table[i][j - 1])
            };
        }
    }
    table
}

/// Indices into `reference` of one longest common subsequence.
fn lcs_indices(reference: &[String], candidate: &[String]) -> Vec<usize> {
    let table = lcs_table(reference, candidate);
    let (mut i, mut j) = (reference.len(), candidate.len());
    let mut indices = Vec::new();
    while i > 0 && j > 0 {
        if reference[i - 1] == candidate[j - 1] {
            indices.push(i - 1);
            i -= 1;
            j -= 1;
        } else if table[i][j - 1] > table[i - 1][j] {
            j -= 1;
        } else {
            i -= 1;
        }
    }
    indices.reverse();
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_identical() {
        let pair = Rouge.score_pair("the cat sat", "the cat sat");
        assert!(close(pair.rouge1.fmeasure, 1.0));
        assert!(close(pair.rouge2.fmeasure, 1.0));
        assert!(close(pair.rouge_l.fmeasure, 1.0));
        assert!(close(pair.rouge_lsum.fmeasure, 1.0));
    }

    #[test]
    fn test_partial_overlap() {
        let pair = Rouge.score_pair("the cat", "the cat sat on");
        assert!(close(pair.rouge1.precision, 1.0));
        assert!(close(pair.rouge1.recall, 0.5));
        assert!(close(pair.rouge1.fmeasure, 2.0 / 3.0));
        assert!(close(pair.rouge2.fmeasure, 0.5));
        assert!(close(pair.rouge_l.fmeasure, 2.0 / 3.0));
    }

    #[test]
    fn test_lcs_respects_order() {
        // Same bag of words, reversed order
        let pair = Rouge.score_pair("c b a", "a b c");
        assert!(close(pair.rouge1.fmeasure, 1.0));
        assert!(close(pair.rouge2.fmeasure, 0.0));
        assert!(close(pair.rouge_l.fmeasure, 1.0 / 3.0));
    }

    #[test]
    fn test_lsum_multi_sentence() {
        let pair = Rouge.score_pair("a b\nc d", "c d\na b");
        // Sentence order does not matter at summary level
        assert!(close(pair.rouge_lsum.fmeasure, 1.0));
        assert!(pair.rouge_l.fmeasure < 1.0);
    }

    #[test]
    fn test_empty_side_scores_zero() {
        let pair = Rouge.score_pair("", "the cat");
        assert_eq!(pair.rouge1, RougeComponents::default());
        assert_eq!(pair.rouge_lsum, RougeComponents::default());
    }

    #[test]
    fn test_corpus_mean() {
        let predictions = vec!["the cat".to_string(), "dog".to_string()];
        let references = vec!["the cat".to_string(), "bird".to_string()];
        let MetricScore::Rouge(score) = Rouge.compute(&predictions, &references).unwrap() else {
            panic!("expected rouge score");
        };
        assert!(close(score.rouge1, 0.5));
        assert!(close(score.rouge_l, 0.5));
    }

    #[test]
    fn test_serialized_keys() {
        let score = RougeScore {
            rouge1: 0.0,
            rouge2: 0.0,
            rouge_l: 0.0,
            rouge_lsum: 0.0,
        };
        let json = serde_json::to_value(&score).unwrap();
        assert!(json.get("rougeL").is_some());
        assert!(json.get("rougeLsum").is_some());
    }
}
