//! Configuration types shared between decoder-eval crates.

mod eval;
mod types;

pub use eval::*;
pub use types::*;

#[cfg(test)]
mod tests {
    use tempfile::tempdir;
    use test_case::test_case;

    use super::*;

    #[test]
    fn test_eval_params_default() {
        let params = EvalParams::default();
        assert_eq!(params.tokenizer, "gpt2");
        assert_eq!(params.samples, 10);
        assert_eq!(params.workers, 1);
        assert_eq!(params.metrics, vec!["bleu", "rouge"]);
        assert!((params.generation.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(params.generation.top_k, 50);
        assert_eq!(params.generation.max_tokens, None);
    }

    #[test]
    fn test_parse_original_layout() {
        // The training project's config file, without an `eval` section
        let json = r#"{
            "model": {
                "context_length": 16,
                "d_model": 512,
                "d_ff": 2048,
                "num_blocks": 8,
                "num_heads": 4,
                "dropout": 0.1
            },
            "train": {
                "model_path": "model/model.mpk",
                "dataset_path": "vesteinn/babylm"
            }
        }"#;
        let config: RunConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.model.context_length, 16);
        assert_eq!(config.model.d_ff, 2048);
        assert_eq!(config.model.head_dim(), 128);
        assert_eq!(config.paths.model_path, "model/model.mpk");
        assert_eq!(config.eval, EvalParams::default());
    }

    #[test]
    fn test_flattened_generation_params() {
        let json = r#"{ "eval": { "samples": 3, "temperature": 1.5, "top_k": 1, "max_tokens": 5 } }"#;
        let config: RunConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.eval.samples, 3);
        assert_eq!(config.eval.generation.top_k, 1);
        assert_eq!(config.eval.generation.max_tokens, Some(5));
        assert!((config.eval.generation.temperature - 1.5).abs() < f32::EPSILON);
    }

    #[test_case(0, 64, 4 ; "zero_context")]
    #[test_case(16, 63, 4 ; "indivisible_heads")]
    #[test_case(16, 64, 0 ; "zero_heads")]
    fn test_invalid_arch(context_length: usize, d_model: usize, num_heads: usize) {
        let arch = ModelArch {
            context_length,
            d_model,
            num_heads,
            ..Default::default()
        };
        assert!(matches!(arch.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = RunConfig::default();
        config.eval.seed = 42;
        config.eval.timeout_secs = Some(30);
        config.save(&path).unwrap();

        let loaded = RunConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(
            loaded.eval.timeout(),
            Some(std::time::Duration::from_secs(30))
        );
    }

    #[test]
    fn test_load_rejects_bad_arch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "model": { "d_model": 10, "num_heads": 3 } }"#).unwrap();
        assert!(matches!(
            RunConfig::load(&path),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            RunConfig::load("/nonexistent/config.json"),
            Err(ConfigError::Io(..))
        ));
    }
}
