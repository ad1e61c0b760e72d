use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use burn::data::dataset::Dataset;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use deval_cli::{
    CliError, EvalOverrides, EvalPipeline, Evaluator, GenerationParams, TextDataset,
    generator_for, load_run_config, load_tokenizer, overlay_params, read_lines, report,
};
use deval_generation::SampleConfig;
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "deval",
    about = "Generative-quality evaluation of decoder-only language models"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Continue the leading records of a dataset and score them with BLEU/ROUGE
    Eval(EvalArgs),
    /// Generate a continuation for one prompt
    Generate {
        /// The prompt to continue
        prompt: String,
        #[command(flatten)]
        run: RunArgs,
        /// Tokenizer: HuggingFace model name, local tokenizer.json, or "chars:<alphabet file>"
        #[arg(long, default_value = "gpt2")]
        tokenizer: String,
        /// Seed for the sampling random source
        #[arg(long, default_value = "0")]
        seed: u64,
        #[command(flatten)]
        generation: GenerationParams,
    },
    /// Score candidate lines against reference lines (line i against line i)
    Score {
        /// File with one generated text per line
        candidates: PathBuf,
        /// File with one reference text per line
        references: PathBuf,
        /// Corpus metrics to compute (comma-separated)
        #[arg(long, value_delimiter = ',', default_value = "bleu,rouge")]
        metrics: Vec<String>,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Run configuration with the model architecture and artifact paths
    #[arg(long, default_value = "config.json")]
    config: PathBuf,
    /// Trained weights (overrides train.model_path)
    #[arg(long)]
    model_path: Option<String>,
}

#[derive(clap::Args)]
struct EvalArgs {
    #[command(flatten)]
    run: RunArgs,
    /// Dataset: HuggingFace dataset name or a .jsonl/.txt file (overrides train.dataset_path)
    #[arg(long)]
    dataset: Option<String>,
    #[command(flatten)]
    params: EvalOverrides,
    /// Print the report as JSON instead of text
    #[arg(long)]
    json: bool,
}

/// Default continuation length for `generate` when `--max-tokens` is not given.
const DEFAULT_GENERATE_TOKENS: usize = 50;

fn main() -> ExitCode {
    // tracing needs to be initialized with indicatif_layer to not clobber progress bars
    let indicatif_layer = IndicatifLayer::new();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stderr_writer()))
        .with(
            EnvFilter::builder()
                .with_default_directive(tracing::Level::INFO.into())
                .from_env_lossy(),
        )
        .with(indicatif_layer)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Eval(args) => eval(args),
        Commands::Generate {
            prompt,
            run,
            tokenizer,
            seed,
            generation,
        } => generate_one(&prompt, &run, &tokenizer, seed, &generation),
        Commands::Score {
            candidates,
            references,
            metrics,
        } => score(&candidates, &references, &metrics),
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "deval", &mut std::io::stdout());
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn eval(args: EvalArgs) -> Result<(), CliError> {
    let mut config = load_run_config(&args.run.config)?;
    if let Some(model_path) = args.run.model_path {
        config.paths.model_path = model_path;
    }
    if let Some(dataset) = args.dataset {
        config.paths.dataset_path = dataset;
    }
    let params = overlay_params(config.eval.clone(), args.params);

    let tokenizer = load_tokenizer(&params.tokenizer)?;
    let dataset = TextDataset::open(&config.paths.dataset_path, &params.split)?;
    tracing::info!(
        dataset = %config.paths.dataset_path,
        split = %params.split,
        records = dataset.len(),
        "dataset loaded"
    );

    let generator = generator_for(&config, tokenizer)?;
    let pipeline = EvalPipeline::new(generator, params)?;
    let run = pipeline.run_dataset(&dataset);

    if args.json {
        println!("{}", report::to_json(&run)?);
    } else {
        report::print_report(&run);
    }

    match run.scores {
        Ok(_) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn generate_one(
    prompt: &str,
    run: &RunArgs,
    tokenizer: &str,
    seed: u64,
    generation: &GenerationParams,
) -> Result<(), CliError> {
    let mut config = load_run_config(&run.config)?;
    if let Some(model_path) = &run.model_path {
        config.paths.model_path.clone_from(model_path);
    }

    let tokenizer = load_tokenizer(tokenizer)?;
    let generator = generator_for(&config, tokenizer)?;
    let sample_config = SampleConfig::from_params(generation, DEFAULT_GENERATE_TOKENS)?;

    let start = std::time::Instant::now();
    let generated = generator.generate_text(prompt, &sample_config, seed)?;

    println!("Prompt: {prompt}");
    println!("Generated: {generated}");
    tracing::info!("generated in {:.2}s", start.elapsed().as_secs_f32());
    Ok(())
}

fn score(candidates: &Path, references: &Path, metrics: &[String]) -> Result<(), CliError> {
    let candidates = read_lines(candidates)?;
    let references = read_lines(references)?;
    let scores = Evaluator::from_names(metrics)?.evaluate(&candidates, &references)?;
    println!("{}", report::format_scores(&scores));
    Ok(())
}
