use std::sync::mpsc;

use burn::data::dataset::Dataset;
use deval_config::EvalParams;
use deval_data::{TextGenerationItem, first_records};
use rand::{SeedableRng, rngs::StdRng};
use serde::{Serialize, Serializer};
use tracing::{info, info_span, warn};

use crate::{
    EvalError, GenerationError,
    eval::{EvaluationPair, Evaluator, ScoreReport, truncate_chars},
    inference::{CancelToken, Generation, Interrupt, StopReason, TextGenerator},
    model::LanguageModel,
    sampler::SampleConfig,
};

/// Everything reported for one successfully generated sample.
#[derive(Clone, Debug, Serialize)]
pub struct SampleReport {
    pub index: usize,
    pub prompt: String,
    /// Continuation as produced, with the prompt prepended when echoing.
    pub generated: String,
    pub reference: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_k: usize,
    pub tokens_generated: usize,
    pub stop_reason: StopReason,
    /// What the metrics see.
    pub pair: EvaluationPair,
}

#[derive(Debug, Serialize)]
pub struct SampleFailure {
    pub index: usize,
    pub prompt: String,
    #[serde(serialize_with = "as_display")]
    pub error: GenerationError,
}

fn as_display<T: std::fmt::Display, S: Serializer>(value: &T, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(value)
}

/// Per-sample results in record order.
#[derive(Debug, Default, Serialize)]
pub struct BatchOutcome {
    pub samples: Vec<SampleReport>,
    pub failures: Vec<SampleFailure>,
}

impl BatchOutcome {
    #[must_use]
    pub fn pairs(&self) -> Vec<EvaluationPair> {
        self.samples.iter().map(|s| s.pair.clone()).collect()
    }

    fn push(&mut self, result: Result<SampleReport, SampleFailure>) {
        match result {
            Ok(sample) => self.samples.push(sample),
            Err(failure) => self.failures.push(failure),
        }
    }

    fn sort(&mut self) {
        self.samples.sort_by_key(|s| s.index);
        self.failures.sort_by_key(|f| f.index);
    }
}

/// A full run: generated samples survive a failed scoring step.
#[derive(Debug)]
pub struct EvalReport {
    pub batch: BatchOutcome,
    pub scores: Result<ScoreReport, EvalError>,
}

/// Drives generation over an evaluation batch, then scores it.
pub struct EvalPipeline<M> {
    generator: TextGenerator<M>,
    evaluator: Evaluator,
    params: EvalParams,
    cancel: Option<CancelToken>,
}

impl<M: LanguageModel> EvalPipeline<M> {
    /// Metrics come from `params.metrics`.
    pub fn new(generator: TextGenerator<M>, params: EvalParams) -> Result<Self, EvalError> {
        let evaluator = Evaluator::from_names(params.metrics.as_slice())?;
        Ok(Self::with_evaluator(generator, evaluator, params))
    }

    pub fn with_evaluator(
        generator: TextGenerator<M>,
        evaluator: Evaluator,
        params: EvalParams,
    ) -> Self {
        Self {
            generator,
            evaluator,
            params,
            cancel: None,
        }
    }

    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn params(&self) -> &EvalParams {
        &self.params
    }

    pub fn generator(&self) -> &TextGenerator<M> {
        &self.generator
    }

    /// The first `context_length` characters of `record`.
    pub fn prompt_for<'a>(&self, record: &'a str) -> &'a str {
        truncate_chars(record, self.generator.context_length())
    }

    /// Generate every record in order on the calling thread. Failed samples are recorded
    /// and skipped.
    pub fn generate_batch(&self, records: &[String]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for (index, record) in records.iter().enumerate() {
            outcome.push(generate_sample(
                &self.generator,
                &self.params,
                self.cancel.as_ref(),
                index,
                record,
            ));
        }
        outcome
    }

    pub fn score(&self, batch: &BatchOutcome) -> Result<ScoreReport, EvalError> {
        self.evaluator.score(&batch.pairs())
    }
}

impl<M: LanguageModel + Clone + Send> EvalPipeline<M> {
    /// Like [`generate_batch`](Self::generate_batch), split over `params.workers`
    /// threads. Each worker owns a clone of the model; results come back in record order.
    pub fn generate_batch_parallel(&self, records: &[String]) -> BatchOutcome {
        let workers = self.params.workers.min(records.len());
        if workers <= 1 {
            return self.generate_batch(records);
        }

        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("deval-worker-{i}"))
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                warn!("could not start {workers} workers ({e}), generating sequentially");
                return self.generate_batch(records);
            }
        };

        let chunk_size = records.len().div_ceil(workers);
        let jobs: Vec<_> = records
            .chunks(chunk_size)
            .enumerate()
            .map(|(i, chunk)| {
                (
                    self.generator.clone(),
                    self.params.clone(),
                    self.cancel.clone(),
                    i * chunk_size,
                    chunk,
                )
            })
            .collect();

        let (tx, rx) = mpsc::channel();
        pool.scope(move |scope| {
            for (generator, params, cancel, offset, chunk) in jobs {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    for (i, record) in chunk.iter().enumerate() {
                        let result =
                            generate_sample(&generator, &params, cancel.as_ref(), offset + i, record);
                        if tx.send(result).is_err() {
                            break;
                        }
                    }
                });
            }
        });

        let mut outcome = BatchOutcome::default();
        for result in rx {
            outcome.push(result);
        }
        outcome.sort();
        outcome
    }

    /// Generate the batch, then score whatever succeeded.
    pub fn run(&self, records: &[String]) -> EvalReport {
        info!(
            samples = records.len(),
            workers = self.params.workers,
            "generating evaluation batch"
        );
        let batch = self.generate_batch_parallel(records);
        if !batch.failures.is_empty() {
            warn!(
                failed = batch.failures.len(),
                succeeded = batch.samples.len(),
                "some samples could not be generated"
            );
        }

        let scores = self.score(&batch);
        if let Err(e) = &scores {
            warn!("scoring failed: {e}");
        }
        EvalReport { batch, scores }
    }

    /// Run on the first `params.samples` records of `dataset`.
    pub fn run_dataset<D: Dataset<TextGenerationItem>>(&self, dataset: &D) -> EvalReport {
        let records = first_records(dataset, self.params.samples);
        if records.len() < self.params.samples {
            warn!(
                requested = self.params.samples,
                available = records.len(),
                "dataset has fewer records than requested"
            );
        }
        self.run(&records)
    }
}

fn generate_sample<M: LanguageModel>(
    generator: &TextGenerator<M>,
    params: &EvalParams,
    cancel: Option<&CancelToken>,
    index: usize,
    record: &str,
) -> Result<SampleReport, SampleFailure> {
    let _span = info_span!("sample", index).entered();
    let prompt = truncate_chars(record, generator.context_length());

    let result = try_generate(generator, params, cancel, index, prompt, record);

    match result {
        Ok((config, generation)) => {
            let generated = if params.echo_prompt {
                format!("{prompt}{}", generation.text)
            } else {
                generation.text
            };
            let pair = EvaluationPair::align(&generated, record);
            tracing::debug!(
                tokens = generation.tokens.len(),
                aligned_len = pair.len(),
                "sample generated"
            );
            Ok(SampleReport {
                index,
                prompt: prompt.to_string(),
                generated,
                reference: record.to_string(),
                max_tokens: config.max_tokens,
                temperature: config.temperature,
                top_k: config.top_k,
                tokens_generated: generation.tokens.len(),
                stop_reason: generation.stop_reason,
                pair,
            })
        }
        Err(error) => {
            warn!("sample {index} failed: {error}");
            Err(SampleFailure {
                index,
                prompt: prompt.to_string(),
                error,
            })
        }
    }
}

fn try_generate<M: LanguageModel>(
    generator: &TextGenerator<M>,
    params: &EvalParams,
    cancel: Option<&CancelToken>,
    index: usize,
    prompt: &str,
    record: &str,
) -> Result<(SampleConfig, Generation), GenerationError> {
    let config = SampleConfig::from_params(&params.generation, record.chars().count())?;

    let mut interrupt = Interrupt::none();
    if let Some(token) = cancel {
        interrupt = interrupt.with_cancel(token.clone());
    }
    if let Some(timeout) = params.timeout() {
        interrupt = interrupt.with_timeout(timeout);
    }

    let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(index as u64));
    let generation = generator.generate_with(prompt, &config, &mut rng, &interrupt)?;
    Ok((config, generation))
}
