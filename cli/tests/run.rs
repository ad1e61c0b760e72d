//! The `eval`/`generate`/`score` building blocks wired together the way the binary does.

use std::{fs, path::Path};

use burn::{module::Module, record::DefaultRecorder};
use deval_cli::{
    EvalOverrides, EvalPipeline, Evaluator, InferenceBackend, TextDataset, generator_for,
    load_run_config, load_tokenizer, overlay_params, read_lines, report,
};
use deval_config::{GenerationParams, RunConfig};
use deval_generation::EvalError;
use deval_generation::{DecoderModelConfig, SampleConfig};

const RECORDS: &str = "the cat sat on the mat\nthe dog ate the bone\na bird in the hand\n";

/// Config, alphabet, corpus and freshly initialized weights under `dir`.
fn write_artifacts(dir: &Path) -> std::path::PathBuf {
    let alphabet = dir.join("alphabet.txt");
    fs::write(&alphabet, "abcdefghijklmnopqrstuvwxyz ").unwrap();
    let corpus = dir.join("corpus.txt");
    fs::write(&corpus, RECORDS).unwrap();
    let model_path = dir.join("model");

    let config_path = dir.join("config.json");
    fs::write(
        &config_path,
        format!(
            r#"{{
                "model": {{"context_length": 6, "d_model": 8, "d_ff": 16, "num_blocks": 1, "num_heads": 2, "dropout": 0.0}},
                "train": {{"model_path": "{}", "dataset_path": "{}"}},
                "eval": {{"tokenizer": "chars:{}", "samples": 2, "max_tokens": 10}}
            }}"#,
            model_path.display(),
            corpus.display(),
            alphabet.display()
        ),
    )
    .unwrap();

    let config = RunConfig::load(&config_path).unwrap();
    let tokenizer = load_tokenizer(&config.eval.tokenizer).unwrap();
    DecoderModelConfig::from_tokenizer(config.model.clone(), tokenizer.as_ref())
        .init::<InferenceBackend>(&Default::default())
        .save_file(model_path, &DefaultRecorder::new())
        .unwrap();

    config_path
}

#[test]
fn test_eval_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_run_config(&write_artifacts(dir.path())).unwrap();
    let params = overlay_params(config.eval.clone(), EvalOverrides::default());
    assert_eq!(params.samples, 2);

    let tokenizer = load_tokenizer(&params.tokenizer).unwrap();
    let dataset = TextDataset::open(&config.paths.dataset_path, &params.split).unwrap();
    let generator = generator_for(&config, tokenizer).unwrap();
    let run = EvalPipeline::new(generator, params).unwrap().run_dataset(&dataset);

    assert_eq!(run.batch.samples.len(), 2);
    assert_eq!(run.batch.samples[0].prompt, "the ca");
    assert_eq!(run.batch.samples[1].reference, "the dog ate the bone");
    assert!(run.scores.is_ok());

    let json: serde_json::Value = serde_json::from_str(&report::to_json(&run).unwrap()).unwrap();
    assert_eq!(json["samples"].as_array().unwrap().len(), 2);
    assert!(json["scores"]["bleu"]["brevity_penalty"].is_number());
    assert!(json["scores"]["rouge"]["rougeLsum"].is_number());
}

#[test]
fn test_flags_override_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_run_config(&write_artifacts(dir.path())).unwrap();
    let cli = EvalOverrides {
        samples: Some(1),
        metrics: Some(vec!["rouge".into()]),
        max_tokens: Some(3),
        ..EvalOverrides::default()
    };
    let params = overlay_params(config.eval.clone(), cli);

    let tokenizer = load_tokenizer(&params.tokenizer).unwrap();
    let dataset = TextDataset::open(&config.paths.dataset_path, &params.split).unwrap();
    let generator = generator_for(&config, tokenizer).unwrap();
    let run = EvalPipeline::new(generator, params).unwrap().run_dataset(&dataset);

    assert_eq!(run.batch.samples.len(), 1);
    assert_eq!(run.batch.samples[0].max_tokens, 3);
    let scores = run.scores.unwrap();
    assert!(scores.get("bleu").is_none());
    assert!(scores.get("rouge").is_some());
}

#[test]
fn test_generate_is_seeded() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_run_config(&write_artifacts(dir.path())).unwrap();
    let tokenizer = load_tokenizer(&config.eval.tokenizer).unwrap();
    let generator = generator_for(&config, tokenizer).unwrap();
    let sample_config = SampleConfig::from_params(&GenerationParams::default(), 8).unwrap();

    let first = generator.generate_text("the cat", &sample_config, 11).unwrap();
    let second = generator.generate_text("the cat", &sample_config, 11).unwrap();
    assert_eq!(first, second);
    assert!(first.chars().count() <= 8);
}

#[test]
fn test_missing_weights_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = load_run_config(&write_artifacts(dir.path())).unwrap();
    config.paths.model_path = dir.path().join("missing").display().to_string();
    let tokenizer = load_tokenizer(&config.eval.tokenizer).unwrap();
    assert!(generator_for(&config, tokenizer).is_err());
}

#[test]
fn test_score_files() {
    let dir = tempfile::tempdir().unwrap();
    let candidates = dir.path().join("candidates.txt");
    let references = dir.path().join("references.txt");
    fs::write(&candidates, "the cat sat on the mat\nthe dog\n").unwrap();
    fs::write(&references, "the cat sat on the mat\nthe dog ate the bone\n").unwrap();

    let scores = Evaluator::from_names(&["bleu", "rouge"])
        .unwrap()
        .evaluate(&read_lines(&candidates).unwrap(), &read_lines(&references).unwrap())
        .unwrap();
    let text = report::format_scores(&scores);
    assert!(text.contains("BLEU score: bleu=1.0000"));
    assert!(text.contains("ROUGE score: rouge1=1.0000"));
}

#[test]
fn test_score_files_with_different_line_counts() {
    let dir = tempfile::tempdir().unwrap();
    let candidates = dir.path().join("candidates.txt");
    let references = dir.path().join("references.txt");
    fs::write(&candidates, "the cat\nthe dog\n").unwrap();
    fs::write(&references, "the cat sat on the mat\n").unwrap();

    let result = Evaluator::default().evaluate(
        &read_lines(&candidates).unwrap(),
        &read_lines(&references).unwrap(),
    );
    assert!(matches!(
        result,
        Err(EvalError::LengthMismatch {
            generated: 2,
            references: 1
        })
    ));
}
