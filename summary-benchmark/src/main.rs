//! Summary Benchmark CLI

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};

use summary_benchmark::{
    config::{Config, ConfigError, ExtractionStrategy, FailurePolicy},
    dataset::load_documents,
    logging,
    metrics::MetricSuite,
    prompts::{lexrank, PromptSet},
    providers::create_models,
    reporting::{
        print_console_report, print_no_scores, read_results_csv, write_results_csv, ReportError, ResultRow,
    },
    runner::{Aggregation, ConsoleProgress, Executor, RunError},
};

#[derive(Parser)]
#[command(name = "summary-benchmark")]
#[command(about = "Benchmark LLM-generated plain-language summaries of research abstracts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the experiment and write the results table
    Run {
        /// Dataset file (overrides experiment.dataset)
        #[arg(short, long)]
        dataset: Option<PathBuf>,

        /// Results CSV path (overrides experiment.output)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Repeats per document, prompt and model
        #[arg(short, long)]
        repeats: Option<u32>,

        /// Stop after this many usable documents
        #[arg(long)]
        max_documents: Option<usize>,

        /// Comma-separated model names (default: all enabled)
        #[arg(short, long)]
        models: Option<String>,

        /// How invalid scores are averaged (drop, zero_fill)
        #[arg(long)]
        failure_policy: Option<FailurePolicy>,

        /// JSONL transcript of every generation
        #[arg(short, long)]
        transcript: Option<PathBuf>,
    },

    /// Write the rendered prompts of each document to text files for review
    DumpPrompts {
        /// Output directory for prompt files
        #[arg(short, long, default_value = "results/prompts")]
        output: PathBuf,

        /// Dataset file (overrides experiment.dataset)
        #[arg(short, long)]
        dataset: Option<PathBuf>,

        /// Number of documents to dump
        #[arg(long, default_value = "3")]
        max_documents: usize,
    },

    /// Generate sample configuration
    InitConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config/experiment.toml")]
        output: PathBuf,
    },

    /// Print a results CSV written by a previous run
    Report {
        /// Path to results CSV
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Score one summary with the configured metrics
    Score {
        /// File holding the generated summary
        #[arg(long)]
        candidate: PathBuf,

        /// File holding the reference summary
        #[arg(long)]
        reference: PathBuf,

        /// File holding the source abstract (defaults to the reference)
        #[arg(long)]
        source: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Credentials may live in a .env file
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load_or_default(),
    };

    // Initialize logging: stderr plus a daily log file
    let _guard = logging::init(&config.experiment.log_dir, cli.verbose)?;

    match cli.command {
        Commands::Run {
            dataset,
            output,
            repeats,
            max_documents,
            models,
            failure_policy,
            transcript,
        } => {
            let overrides = RunOverrides {
                dataset,
                output,
                repeats,
                max_documents,
                models,
                failure_policy,
                transcript,
            };
            run_benchmark(config, overrides).await?;
        }

        Commands::DumpPrompts {
            output,
            dataset,
            max_documents,
        } => {
            dump_prompts(&config, output, dataset, max_documents)?;
        }

        Commands::InitConfig { output } => {
            init_config(output)?;
        }

        Commands::Report { input } => {
            generate_report(&input)?;
        }

        Commands::Score {
            candidate,
            reference,
            source,
        } => {
            score_texts(&config, &candidate, &reference, source.as_deref()).await?;
        }
    }

    Ok(())
}

/// Command-line values that replace configuration entries
struct RunOverrides {
    dataset: Option<PathBuf>,
    output: Option<PathBuf>,
    repeats: Option<u32>,
    max_documents: Option<usize>,
    models: Option<String>,
    failure_policy: Option<FailurePolicy>,
    transcript: Option<PathBuf>,
}

impl RunOverrides {
    fn apply(self, config: &mut Config) -> Result<(), ConfigError> {
        let exp = &mut config.experiment;
        if let Some(dataset) = self.dataset {
            exp.dataset = dataset;
        }
        if let Some(output) = self.output {
            exp.output = output;
        }
        if let Some(repeats) = self.repeats {
            exp.repeats = repeats;
        }
        if let Some(max) = self.max_documents {
            exp.max_documents = Some(max);
        }
        if let Some(policy) = self.failure_policy {
            exp.failure_policy = policy;
        }
        if let Some(transcript) = self.transcript {
            exp.transcript = Some(transcript);
        }

        if let Some(list) = self.models {
            let names: Vec<&str> = list.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()).collect();
            for name in &names {
                if config.get_model(name).is_none() {
                    return Err(ConfigError::Invalid(format!("Unknown model: {}", name)));
                }
            }
            for model in &mut config.models {
                model.enabled = names.contains(&model.name.as_str());
            }
        }
        Ok(())
    }
}

async fn run_benchmark(mut config: Config, overrides: RunOverrides) -> Result<(), RunError> {
    overrides.apply(&mut config)?;
    config.validate()?;
    config.check_credentials()?;

    let run_id = Utc::now().format("%Y%m%d-%H%M%S").to_string();

    println!("=== Summary Benchmark ===");
    println!("Run ID: {}", run_id);
    println!("Experiment: {}", config.experiment.name);
    println!("Dataset: {}", config.experiment.dataset.display());
    println!("Repeats: {}", config.experiment.repeats);
    println!("Failure policy: {}", config.experiment.failure_policy);
    println!(
        "Metrics: {}",
        config
            .experiment
            .metrics
            .iter()
            .map(|m| m.label())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!();

    let documents = load_documents(&config.experiment.dataset, &config.dataset)?;
    println!("Loaded {} documents", documents.len());

    let models = create_models(&config)?;
    println!(
        "Models: {}",
        models.iter().map(|m| m.name()).collect::<Vec<_>>().join(", ")
    );

    let prompts = PromptSet::from_config(&config.prompts)?;
    println!("Prompts: {}", prompts.len());

    let suite = MetricSuite::from_config(&config)?;

    let executor = Executor::from_config(&config, models, prompts, suite).with_progress(Arc::new(ConsoleProgress));

    println!("\nRunning benchmark...\n");
    let output = executor.run(&documents).await;

    println!("\n{:-<50}", "");
    println!(
        "Documents processed: {}, skipped: {}",
        output.documents_processed, output.documents_skipped
    );
    println!(
        "Generations: {} ({} failed)",
        output.generations, output.failed_generations
    );
    if let Some(transcript) = &config.experiment.transcript {
        println!("Transcript: {}", transcript.display());
    }

    match output.accumulator.aggregate(config.experiment.failure_policy) {
        Aggregation::NoScores => {
            tracing::warn!("Run {} produced no valid score", run_id);
            print_no_scores();
        }
        Aggregation::Table(table) => {
            print_console_report(&ResultRow::from_aggregate(&table));
            write_results_csv(&config.experiment.output, &table)?;
            println!("Results saved to: {}", config.experiment.output.display());
        }
    }

    Ok(())
}

fn dump_prompts(
    config: &Config,
    output_dir: PathBuf,
    dataset: Option<PathBuf>,
    max_documents: usize,
) -> Result<(), RunError> {
    let dataset = dataset.unwrap_or_else(|| config.experiment.dataset.clone());
    let documents = load_documents(&dataset, &config.dataset)?;
    let prompts = PromptSet::from_config(&config.prompts)?;

    std::fs::create_dir_all(&output_dir).map_err(ReportError::from)?;

    println!("=== Dumping Prompts ===");
    println!("Dataset: {}", dataset.display());
    println!("Output: {}", output_dir.display());
    println!();

    let mut written = 0;
    for document in documents.iter().filter(|d| d.is_usable()).take(max_documents) {
        // Model extraction needs API calls; the dump falls back to the full abstract
        let extract = match config.extraction.strategy {
            ExtractionStrategy::LexRank if prompts.uses_extract() => {
                Some(lexrank(&document.abstract_text, config.extraction.sentences))
            }
            _ => None,
        };

        for prompt in prompts.build_prompts(document, extract.as_deref()) {
            let filename = format!("doc{:04}-prompt{:02}-{}.txt", document.index, prompt.number, prompt.id);
            let content = format!(
                "=== Prompt {} ({}) ===\n\
                 Document:  {}\n\
                 Title:     {}\n\
                 Label:     {}\n\
                 {}\n\
                 === PROMPT ===\n\n\
                 {}",
                prompt.number,
                prompt.id,
                document.index,
                document.title.as_deref().unwrap_or("-"),
                prompt.label,
                "=".repeat(50),
                prompt.text,
            );
            std::fs::write(output_dir.join(&filename), &content).map_err(ReportError::from)?;
            println!("  [doc {}] prompt {} -> {}", document.index, prompt.number, filename);
            written += 1;
        }
    }

    println!("\nDone. {} files written to {}", written, output_dir.display());
    Ok(())
}

fn init_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();

    // Ensure parent directory exists
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    config.save_toml(&output)?;
    println!("Configuration written to: {}", output.display());
    Ok(())
}

fn generate_report(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let rows = read_results_csv(input)?;
    if rows.is_empty() {
        print_no_scores();
    } else {
        print_console_report(&rows);
    }
    Ok(())
}

async fn score_texts(
    config: &Config,
    candidate: &Path,
    reference: &Path,
    source: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let candidate = std::fs::read_to_string(candidate)?;
    let reference = std::fs::read_to_string(reference)?;
    let source = match source {
        Some(path) => std::fs::read_to_string(path)?,
        None => reference.clone(),
    };

    let suite = MetricSuite::from_config(config)?;
    let record = suite.evaluate(&candidate, &reference, &source).await;

    println!("=== Scores ===");
    for (metric, value) in &record.scores {
        if value.is_finite() {
            println!("  {:<11} {:>8.4}", metric.label(), value);
        } else {
            println!("  {:<11} {:>8}", metric.label(), "n/a");
        }
    }
    Ok(())
}
