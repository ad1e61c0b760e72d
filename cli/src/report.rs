//! Human-readable and JSON renderings of an evaluation run.

use std::fmt::Write as _;

use deval_generation::{BatchOutcome, EvalReport, SampleReport, ScoreReport};
use serde::Serialize;

/// Per-sample block: prompt and sampling settings, then both aligned texts.
#[must_use]
pub fn format_sample(sample: &SampleReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Pair {}", sample.index + 1);
    let _ = writeln!(
        out,
        "Prompt: {}, max_tokens: {}, temperature: {}, top_k: {}",
        sample.prompt, sample.max_tokens, sample.temperature, sample.top_k
    );
    let _ = writeln!(
        out,
        "Generated text (len={}): {}",
        sample.pair.len(),
        sample.pair.generated
    );
    let _ = write!(
        out,
        "Reference text (len={}): {}",
        sample.pair.reference.chars().count(),
        sample.pair.reference
    );
    out
}

#[must_use]
pub fn format_scores(scores: &ScoreReport) -> String {
    scores
        .iter()
        .map(|(name, score)| format!("{} score: {score}", name.to_uppercase()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn print_batch(batch: &BatchOutcome) {
    for sample in &batch.samples {
        println!("{}", format_sample(sample));
        println!();
    }
    for failure in &batch.failures {
        println!("Pair {} failed: {}", failure.index + 1, failure.error);
        println!();
    }
}

pub fn print_report(report: &EvalReport) {
    print_batch(&report.batch);
    match &report.scores {
        Ok(scores) => println!("{}", format_scores(scores)),
        Err(e) => eprintln!("Scoring failed: {e}"),
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    batch: &'a BatchOutcome,
    scores: Option<&'a ScoreReport>,
    scoring_error: Option<String>,
}

pub fn to_json(report: &EvalReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&JsonReport {
        batch: &report.batch,
        scores: report.scores.as_ref().ok(),
        scoring_error: report.scores.as_ref().err().map(ToString::to_string),
    })
}

#[cfg(test)]
mod tests {
    use deval_generation::{EvalError, EvaluationPair, Evaluator, StopReason};

    use super::*;

    fn sample() -> SampleReport {
        SampleReport {
            index: 0,
            prompt: "the quick".into(),
            generated: "the quick brown".into(),
            reference: "the quick brown fox jumps".into(),
            max_tokens: 25,
            temperature: 0.7,
            top_k: 50,
            tokens_generated: 6,
            stop_reason: StopReason::MaxTokens,
            pair: EvaluationPair::align("the quick brown", "the quick brown fox jumps"),
        }
    }

    #[test]
    fn test_format_sample() {
        assert_eq!(
            format_sample(&sample()),
            "Pair 1\n\
             Prompt: the quick, max_tokens: 25, temperature: 0.7, top_k: 50\n\
             Generated text (len=15): the quick brown\n\
             Reference text (len=15): the quick brown"
        );
    }

    #[test]
    fn test_format_scores_labels() {
        let scores = Evaluator::default()
            .evaluate(&["a b c d"], &["a b c d"])
            .unwrap();
        let text = format_scores(&scores);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("BLEU score: bleu=1.0000"));
        assert!(lines[1].starts_with("ROUGE score: rouge1=1.0000"));
    }

    #[test]
    fn test_json_report_with_scoring_error() {
        let report = EvalReport {
            batch: BatchOutcome {
                samples: vec![sample()],
                failures: Vec::new(),
            },
            scores: Err(EvalError::EmptyBatch),
        };
        let json: serde_json::Value = serde_json::from_str(&to_json(&report).unwrap()).unwrap();
        assert_eq!(json["samples"][0]["pair"]["generated"], "the quick brown");
        assert!(json["scores"].is_null());
        assert_eq!(json["scoring_error"], "no evaluation pairs to score");
    }
}
