use std::collections::BTreeMap;

use deval_metrics::{CorpusMetric, MetricError, MetricScore, metric_by_name};
use serde::Serialize;

use crate::EvalError;

/// A generated text and its reference, truncated to a common character length.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EvaluationPair {
    pub generated: String,
    pub reference: String,
}

impl EvaluationPair {
    /// Truncate both texts to `min(chars(generated), chars(reference))` characters.
    #[must_use]
    pub fn align(generated: &str, reference: &str) -> Self {
        let n = generated.chars().count().min(reference.chars().count());
        Self {
            generated: truncate_chars(generated, n).to_string(),
            reference: truncate_chars(reference, n).to_string(),
        }
    }

    /// Common character length of both sides.
    #[must_use]
    pub fn len(&self) -> usize {
        self.generated.chars().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.generated.is_empty()
    }
}

/// The first `n` characters of `text`.
#[must_use]
pub fn truncate_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Corpus-level scores keyed by metric name.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ScoreReport(BTreeMap<String, MetricScore>);

impl ScoreReport {
    #[must_use]
    pub fn get(&self, metric: &str) -> Option<&MetricScore> {
        self.0.get(metric)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricScore)> {
        self.0.iter().map(|(name, score)| (name.as_str(), score))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Aligns pairs and scores them with each configured corpus metric.
pub struct Evaluator {
    metrics: Vec<Box<dyn CorpusMetric>>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(vec![
            Box::new(deval_metrics::Bleu::default()),
            Box::new(deval_metrics::Rouge),
        ])
    }
}

impl Evaluator {
    #[must_use]
    pub fn new(metrics: Vec<Box<dyn CorpusMetric>>) -> Self {
        Self { metrics }
    }

    /// Build from metric names such as `["bleu", "rouge"]`.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, EvalError> {
        let metrics = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                metric_by_name(name).ok_or_else(|| EvalError::MetricUnavailable {
                    name: name.to_string(),
                    source: MetricError::Unknown(name.to_string()),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(metrics))
    }

    #[must_use]
    pub fn metric_names(&self) -> Vec<&'static str> {
        self.metrics.iter().map(|m| m.name()).collect()
    }

    /// Score already-aligned pairs. Each metric sees the whole batch in one call.
    pub fn score(&self, pairs: &[EvaluationPair]) -> Result<ScoreReport, EvalError> {
        if pairs.is_empty() {
            return Err(EvalError::EmptyBatch);
        }
        let (predictions, references): (Vec<String>, Vec<String>) = pairs
            .iter()
            .map(|p| (p.generated.clone(), p.reference.clone()))
            .unzip();

        let mut report = BTreeMap::new();
        for metric in &self.metrics {
            let score = metric.compute(&predictions, &references).map_err(|source| {
                EvalError::MetricUnavailable {
                    name: metric.name().to_string(),
                    source,
                }
            })?;
            tracing::debug!(metric = metric.name(), %score, "scored batch");
            report.insert(metric.name().to_string(), score);
        }
        Ok(ScoreReport(report))
    }

    /// Align `generated[i]` with `references[i]`, then score the aligned batch.
    pub fn evaluate<S: AsRef<str>, T: AsRef<str>>(
        &self,
        generated: &[S],
        references: &[T],
    ) -> Result<ScoreReport, EvalError> {
        if generated.len() != references.len() {
            return Err(EvalError::LengthMismatch {
                generated: generated.len(),
                references: references.len(),
            });
        }
        let pairs: Vec<EvaluationPair> = generated
            .iter()
            .zip(references)
            .map(|(g, r)| EvaluationPair::align(g.as_ref(), r.as_ref()))
            .collect();
        self.score(&pairs)
    }
}
