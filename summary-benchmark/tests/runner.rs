//! End-to-end runs against scripted generators

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use summary_benchmark::{
    config::{ExtractionConfig, ExtractionStrategy, FailurePolicy, ModelConfig, ProviderKind},
    dataset::Document,
    metrics::{FleschKincaid, MetricId, MetricSuite, RougeScorer, Scorer},
    prompts::{PromptSet, PromptTemplate},
    providers::{CompletionRequest, CompletionResponse, GenerationError, GenerationResult, Generator, Model},
    reporting::{read_results_csv, read_transcript, write_results_csv, ResultRow, TranscriptWriter},
    runner::{Aggregation, Executor, RetryPolicy},
};

// =========================================================================
// Scripted generator
// =========================================================================

/// Plays back queued outcomes, then repeats `fallback`
struct ScriptedGenerator {
    script: Mutex<VecDeque<GenerationResult<String>>>,
    fallback: String,
    calls: AtomicUsize,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    fn new(fallback: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: fallback.to_string(),
            calls: AtomicUsize::new(0),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn then(self, outcome: GenerationResult<String>) -> Self {
        self.script.lock().unwrap().push_back(outcome);
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted-1"
    }

    async fn complete(&self, request: &CompletionRequest) -> GenerationResult<CompletionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(last) = request.messages.last() {
            self.prompts.lock().unwrap().push(last.content.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        let content = match next {
            Some(outcome) => outcome?,
            None => self.fallback.clone(),
        };
        Ok(CompletionResponse {
            content,
            model: "scripted-1".to_string(),
            input_tokens: 10,
            output_tokens: 3,
            finish_reason: "stop".to_string(),
            latency_ms: 1,
        })
    }
}

// =========================================================================
// Helpers
// =========================================================================

fn model(name: &str, generator: Arc<ScriptedGenerator>) -> Model {
    let config = ModelConfig {
        name: name.to_string(),
        provider: ProviderKind::OpenAI,
        model: "scripted-1".to_string(),
        enabled: true,
        max_tokens: 100,
        temperature: Some(0.3),
        system_prompt: None,
        api_key_env: None,
        base_url: None,
    };
    Model::new(config, generator)
}

fn rouge_suite() -> MetricSuite {
    MetricSuite::new(
        vec![MetricId::Rouge1, MetricId::Rouge2, MetricId::RougeL],
        vec![Arc::new(RougeScorer::new(true)) as Arc<dyn Scorer>],
    )
}

fn one_prompt() -> PromptSet {
    PromptSet::new(vec![PromptTemplate::new("plain", "Summarise in plain language: {abstract}")])
}

fn abc_documents(count: usize) -> Vec<Document> {
    (0..count)
        .map(|i| Document::new(i, format!("Abstract number {} about cells.", i), "A B C"))
        .collect()
}

fn api_error(status: u16) -> GenerationError {
    GenerationError::Api {
        status,
        message: "scripted".to_string(),
    }
}

fn fast_retry(retry_count: u32) -> RetryPolicy {
    RetryPolicy {
        retry_count,
        retry_delay_ms: 1,
        max_retry_delay_ms: 2,
        timeout_ms: 5_000,
    }
}

// =========================================================================
// Scenarios
// =========================================================================

#[tokio::test]
async fn test_identical_summary_scores_one() {
    let generator = Arc::new(ScriptedGenerator::new("A B C"));
    let executor = Executor::new(vec![model("GPT", generator.clone())], one_prompt(), rouge_suite())
        .with_retry_policy(RetryPolicy::no_retry());

    let output = executor.run(&abc_documents(2)).await;
    assert_eq!(output.documents_processed, 2);
    assert_eq!(output.generations, 2);
    assert_eq!(generator.calls(), 2);

    let aggregation = output.accumulator.aggregate(FailurePolicy::Drop);
    let table = aggregation.table().expect("scores expected");
    assert_eq!(table.rows.len(), 1);

    let row = table.row(1, "GPT").unwrap();
    assert_eq!(row.papers_tested, 2);
    assert_eq!(row.repeats, 1);
    for metric in [MetricId::Rouge1, MetricId::Rouge2, MetricId::RougeL] {
        assert_eq!(row.metrics[&metric].mean, 1.0, "{}", metric);
        assert_eq!(row.metrics[&metric].std, 0.0, "{}", metric);
    }
}

#[tokio::test]
async fn test_failed_repeat_under_each_policy() {
    // Two of four words match the three-word reference
    let generator = Arc::new(ScriptedGenerator::new("A B D E").then(Err(api_error(400))));
    let executor = Executor::new(vec![model("GPT", generator)], one_prompt(), rouge_suite())
        .with_retry_policy(RetryPolicy::no_retry())
        .with_repeats(3);

    let documents = vec![Document::new(0, "Some abstract.", "A B C")];
    let output = executor.run(&documents).await;
    assert_eq!(output.generations, 3);
    assert_eq!(output.failed_generations, 1);

    let values = output.accumulator.values(1, "GPT", MetricId::Rouge1).unwrap();
    assert_eq!(values.len(), 3);
    assert!(values[0].is_nan());

    let dropped = output.accumulator.aggregate(FailurePolicy::Drop);
    let summary = dropped.table().unwrap().row(1, "GPT").unwrap().metrics[&MetricId::Rouge1];
    assert_eq!(summary.valid, 2);
    assert_eq!(summary.recorded, 3);
    let expected = 2.0 * (2.0 / 4.0) * (2.0 / 3.0) / (2.0 / 4.0 + 2.0 / 3.0);
    assert!((summary.mean - expected).abs() < 1e-12);
    assert!(summary.std.abs() < 1e-12);

    let filled = output.accumulator.aggregate(FailurePolicy::ZeroFill);
    let summary = filled.table().unwrap().row(1, "GPT").unwrap().metrics[&MetricId::Rouge1];
    assert!((summary.mean - expected * 2.0 / 3.0).abs() < 1e-12);
    assert!(summary.std > 0.0);
}

#[tokio::test]
async fn test_empty_dataset_has_no_scores() {
    let generator = Arc::new(ScriptedGenerator::new("A B C"));
    let executor = Executor::new(vec![model("GPT", generator.clone())], one_prompt(), rouge_suite());

    let output = executor.run(&[]).await;
    assert_eq!(output.documents_processed, 0);
    assert_eq!(generator.calls(), 0);
    assert_eq!(output.accumulator.aggregate(FailurePolicy::Drop), Aggregation::NoScores);
}

#[tokio::test]
async fn test_all_generations_failing_has_no_scores() {
    let generator = Arc::new(
        ScriptedGenerator::new("unused")
            .then(Err(api_error(401)))
            .then(Err(api_error(401))),
    );
    let executor = Executor::new(vec![model("GPT", generator)], one_prompt(), rouge_suite())
        .with_retry_policy(RetryPolicy::no_retry());

    let output = executor.run(&abc_documents(2)).await;
    assert_eq!(output.failed_generations, 2);
    assert_eq!(output.accumulator.len(), 2);
    for policy in [FailurePolicy::Drop, FailurePolicy::ZeroFill] {
        assert_eq!(output.accumulator.aggregate(policy), Aggregation::NoScores);
    }
}

#[tokio::test]
async fn test_unusable_documents_are_skipped() {
    let generator = Arc::new(ScriptedGenerator::new("A B C"));
    let executor = Executor::new(vec![model("GPT", generator.clone())], one_prompt(), rouge_suite())
        .with_retry_policy(RetryPolicy::no_retry());

    let documents = vec![
        Document::new(0, "", "A B C"),
        Document::new(1, "A real abstract.", "A B C"),
        Document::new(2, "Another abstract.", "  "),
    ];
    let output = executor.run(&documents).await;
    assert_eq!(output.documents_processed, 1);
    assert_eq!(output.documents_skipped, 2);
    assert_eq!(generator.calls(), 1);

    let aggregation = output.accumulator.aggregate(FailurePolicy::Drop);
    assert_eq!(aggregation.table().unwrap().rows[0].papers_tested, 1);
}

#[tokio::test]
async fn test_max_documents_counts_usable_documents() {
    let generator = Arc::new(ScriptedGenerator::new("A B C"));
    let executor = Executor::new(vec![model("GPT", generator.clone())], one_prompt(), rouge_suite())
        .with_retry_policy(RetryPolicy::no_retry())
        .with_max_documents(Some(2));

    let mut documents = vec![Document::new(0, "", "A B C")];
    documents.extend((1..5).map(|i| Document::new(i, "Abstract.", "A B C")));

    let output = executor.run(&documents).await;
    assert_eq!(output.documents_processed, 2);
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn test_rows_per_prompt_and_model() {
    let gpt = Arc::new(ScriptedGenerator::new("A B C"));
    let gemini = Arc::new(ScriptedGenerator::new("A B"));
    let prompts = PromptSet::new(vec![
        PromptTemplate::new("first", "First: {abstract}"),
        PromptTemplate::new("second", "Second: {abstract}").with_label("Second prompt"),
    ]);
    let executor = Executor::new(
        vec![model("GPT", gpt.clone()), model("Gemini", gemini.clone())],
        prompts,
        rouge_suite(),
    )
    .with_retry_policy(RetryPolicy::no_retry())
    .with_repeats(2);

    let output = executor.run(&abc_documents(3)).await;
    assert_eq!(output.generations, 3 * 2 * 2 * 2);
    assert_eq!(gpt.calls(), 12);
    assert_eq!(gemini.calls(), 12);

    let aggregation = output.accumulator.aggregate(FailurePolicy::Drop);
    let table = aggregation.table().unwrap();
    let keys: Vec<(usize, &str)> = table.rows.iter().map(|r| (r.prompt_number, r.model.as_str())).collect();
    assert_eq!(keys, vec![(1, "GPT"), (1, "Gemini"), (2, "GPT"), (2, "Gemini")]);
    assert_eq!(table.row(2, "GPT").unwrap().prompt_label, "Second prompt");
    assert_eq!(table.row(1, "GPT").unwrap().metrics[&MetricId::Rouge1].mean, 1.0);
    assert!(table.row(1, "Gemini").unwrap().metrics[&MetricId::Rouge1].mean < 1.0);
}

#[tokio::test]
async fn test_non_retryable_error_is_not_retried() {
    let generator = Arc::new(ScriptedGenerator::new("A B C").then(Err(api_error(401))));
    let executor = Executor::new(vec![model("GPT", generator.clone())], one_prompt(), rouge_suite())
        .with_retry_policy(fast_retry(3));

    let result = executor.generate("prompt", &executor.models()[0]).await;
    assert!(matches!(result, Err(GenerationError::Api { status: 401, .. })));
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn test_retryable_error_is_retried() {
    let generator = Arc::new(
        ScriptedGenerator::new("  A B C  ")
            .then(Err(api_error(503)))
            .then(Err(GenerationError::EmptyResponse("blank".to_string()))),
    );
    let executor = Executor::new(vec![model("GPT", generator.clone())], one_prompt(), rouge_suite())
        .with_retry_policy(fast_retry(3));

    let summary = executor.generate("prompt", &executor.models()[0]).await.unwrap();
    assert_eq!(summary.text, "A B C");
    assert_eq!(summary.attempts, 3);
    assert_eq!(generator.calls(), 3);
}

#[tokio::test]
async fn test_retries_exhausted_returns_last_error() {
    let generator = Arc::new(
        ScriptedGenerator::new("A B C")
            .then(Err(api_error(500)))
            .then(Err(api_error(502))),
    );
    let executor = Executor::new(vec![model("GPT", generator.clone())], one_prompt(), rouge_suite())
        .with_retry_policy(fast_retry(1));

    let result = executor.generate("prompt", &executor.models()[0]).await;
    assert!(matches!(result, Err(GenerationError::Api { status: 502, .. })));
    assert_eq!(generator.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_slow_generator_times_out() {
    let generator = Arc::new(ScriptedGenerator::new("A B C").with_delay(Duration::from_secs(30)));
    let executor = Executor::new(vec![model("GPT", generator.clone())], one_prompt(), rouge_suite())
        .with_retry_policy(RetryPolicy {
            retry_count: 0,
            retry_delay_ms: 0,
            max_retry_delay_ms: 0,
            timeout_ms: 100,
        });

    let result = executor.generate("prompt", &executor.models()[0]).await;
    assert!(matches!(result, Err(GenerationError::Timeout { timeout_ms: 100 })));
}

#[tokio::test]
async fn test_summaries_are_truncated_before_scoring() {
    let generator = Arc::new(ScriptedGenerator::new("A B C D E F G"));
    let executor = Executor::new(vec![model("GPT", generator)], one_prompt(), rouge_suite())
        .with_retry_policy(RetryPolicy::no_retry())
        .with_max_summary_words(Some(3));

    let output = executor.run(&abc_documents(1)).await;
    let aggregation = output.accumulator.aggregate(FailurePolicy::Drop);
    let row = aggregation.table().unwrap().row(1, "GPT").unwrap().clone();
    assert_eq!(row.metrics[&MetricId::Rouge1].mean, 1.0);
}

#[tokio::test]
async fn test_failing_metric_leaves_others() {
    // Readability of an empty summary fails, ROUGE still scores
    let generator = Arc::new(ScriptedGenerator::new("A B C").then(Ok("   ".to_string())));
    let suite = MetricSuite::new(
        vec![MetricId::Rouge1, MetricId::Fkgl],
        vec![
            Arc::new(RougeScorer::new(true)) as Arc<dyn Scorer>,
            Arc::new(FleschKincaid) as Arc<dyn Scorer>,
        ],
    );
    let executor = Executor::new(vec![model("GPT", generator)], one_prompt(), suite)
        .with_retry_policy(RetryPolicy::no_retry());

    let output = executor.run(&abc_documents(2)).await;
    assert_eq!(output.failed_generations, 0);

    let fkgl = output.accumulator.values(1, "GPT", MetricId::Fkgl).unwrap();
    assert!(fkgl[0].is_nan());
    assert!(fkgl[1].is_finite());

    let aggregation = output.accumulator.aggregate(FailurePolicy::Drop);
    let row = aggregation.table().unwrap().row(1, "GPT").unwrap().clone();
    assert_eq!(row.metrics[&MetricId::Fkgl].valid, 1);
    assert_eq!(row.metrics[&MetricId::Rouge1].valid, 2);
}

#[tokio::test]
async fn test_run_writes_transcript_and_csv() {
    let dir = tempfile::tempdir().unwrap();
    let transcript = TranscriptWriter::new(dir.path().join("transcript.jsonl"));

    let generator = Arc::new(ScriptedGenerator::new("A B C").then(Err(api_error(400))));
    let executor = Executor::new(vec![model("GPT", generator)], one_prompt(), rouge_suite())
        .with_retry_policy(RetryPolicy::no_retry())
        .with_repeats(2)
        .with_transcript(transcript.clone());

    let output = executor.run(&abc_documents(2)).await;

    let entries = read_transcript(transcript.path()).unwrap();
    assert_eq!(entries.len(), 4);
    assert!(!entries[0].success);
    assert_eq!(entries[0].scores[&MetricId::Rouge1], None);
    assert_eq!(entries[1].summary.as_deref(), Some("A B C"));
    assert_eq!(entries[1].scores[&MetricId::Rouge1], Some(1.0));
    assert!(entries.iter().all(|e| e.prompt.contains("[Abstract text not shown]")));

    let aggregation = output.accumulator.aggregate(FailurePolicy::Drop);
    let table = aggregation.table().unwrap();
    let csv_path = dir.path().join("results.csv");
    write_results_csv(&csv_path, table).unwrap();
    assert_eq!(read_results_csv(&csv_path).unwrap(), ResultRow::from_aggregate(table));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_wait_replaces_backoff() {
    let generator = Arc::new(
        ScriptedGenerator::new("A B C").then(Err(GenerationError::RateLimited { retry_after_ms: 3_000 })),
    );
    let executor = Executor::new(vec![model("GPT", generator.clone())], one_prompt(), rouge_suite())
        .with_retry_policy(RetryPolicy {
            retry_count: 2,
            retry_delay_ms: 1_000,
            max_retry_delay_ms: 60_000,
            timeout_ms: 120_000,
        });

    let start = tokio::time::Instant::now();
    let summary = executor.generate("prompt", &executor.models()[0]).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(summary.attempts, 2);
    assert!(elapsed >= Duration::from_millis(3_000));
    assert!(elapsed < Duration::from_millis(4_000), "waited {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_on_last_attempt_returns_without_waiting() {
    let generator = Arc::new(
        ScriptedGenerator::new("A B C").then(Err(GenerationError::RateLimited { retry_after_ms: 30_000 })),
    );
    let executor = Executor::new(vec![model("GPT", generator.clone())], one_prompt(), rouge_suite())
        .with_retry_policy(RetryPolicy {
            retry_count: 0,
            retry_delay_ms: 1_000,
            max_retry_delay_ms: 60_000,
            timeout_ms: 120_000,
        });

    let start = tokio::time::Instant::now();
    let result = executor.generate("prompt", &executor.models()[0]).await;

    assert!(matches!(result, Err(GenerationError::RateLimited { retry_after_ms: 30_000 })));
    assert!(start.elapsed() < Duration::from_millis(1_000));
    assert_eq!(generator.calls(), 1);
}

fn model_extraction(model: &str) -> ExtractionConfig {
    ExtractionConfig {
        strategy: ExtractionStrategy::Model,
        sentences: 3,
        model: Some(model.to_string()),
    }
}

#[tokio::test]
async fn test_model_extraction_is_not_truncated() {
    let long_extract = (1..=50).map(|i| format!("word{}", i)).collect::<Vec<_>>().join(" ");
    let extractor = Arc::new(ScriptedGenerator::new(&long_extract));
    let writer = Arc::new(ScriptedGenerator::new("A B C D E F G H"));

    let prompts = PromptSet::new(vec![PromptTemplate::new("extract", "Simplify: {extract}")]);
    let executor = Executor::new(vec![model("GPT", writer.clone())], prompts, rouge_suite())
        .with_retry_policy(RetryPolicy::no_retry())
        .with_max_summary_words(Some(5))
        .with_extraction(model_extraction("Extractor"), Some(model("Extractor", extractor.clone())));

    let document = Document::new(0, "First sentence. Second sentence.", "A B C");
    let extract = executor.extract(&document).await.unwrap();
    assert_eq!(extract.split_whitespace().count(), 50);

    let output = executor.run(&[document]).await;
    assert_eq!(output.generations, 1);
    assert_eq!(writer.prompts(), vec![format!("Simplify: {}", long_extract)]);

    // The summary itself is still cut to five words
    let aggregation = output.accumulator.aggregate(FailurePolicy::Drop);
    let rouge1 = aggregation.table().unwrap().row(1, "GPT").unwrap().metrics[&MetricId::Rouge1].mean;
    let expected = 2.0 * (3.0 / 5.0) * 1.0 / (3.0 / 5.0 + 1.0);
    assert!((rouge1 - expected).abs() < 1e-12);
}

#[tokio::test]
async fn test_model_extraction_runs_once_per_document() {
    let extractor = Arc::new(ScriptedGenerator::new("Key sentence."));
    let writer = Arc::new(ScriptedGenerator::new("A B C"));

    let prompts = PromptSet::new(vec![PromptTemplate::new("extract", "Simplify: {extract}")]);
    let executor = Executor::new(vec![model("GPT", writer.clone())], prompts, rouge_suite())
        .with_retry_policy(RetryPolicy::no_retry())
        .with_repeats(3)
        .with_extraction(model_extraction("Extractor"), Some(model("Extractor", extractor.clone())));

    let output = executor.run(&abc_documents(2)).await;
    assert_eq!(extractor.calls(), 2);
    assert_eq!(writer.calls(), 6);
    assert_eq!(output.generations, 6);
    assert!(writer.prompts().iter().all(|p| p == "Simplify: Key sentence."));
}

#[tokio::test]
async fn test_failed_extraction_falls_back_to_abstract() {
    let extractor = Arc::new(ScriptedGenerator::new("unused").then(Err(api_error(401))));
    let writer = Arc::new(ScriptedGenerator::new("A B C"));

    let prompts = PromptSet::new(vec![PromptTemplate::new("extract", "Simplify: {extract}")]);
    let executor = Executor::new(vec![model("GPT", writer.clone())], prompts, rouge_suite())
        .with_retry_policy(RetryPolicy::no_retry())
        .with_extraction(model_extraction("Extractor"), Some(model("Extractor", extractor)));

    let document = Document::new(0, "The whole abstract.", "A B C");
    executor.run(&[document]).await;
    assert_eq!(writer.prompts(), vec!["Simplify: The whole abstract.".to_string()]);
}
