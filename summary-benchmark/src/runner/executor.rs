//! Sequential experiment loop: documents × prompts × models × repeats

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use super::accumulator::Accumulator;
use super::pacing::{Pacer, RetryPolicy};
use crate::config::{Config, ExtractionConfig, ExtractionStrategy};
use crate::dataset::Document;
use crate::metrics::{MetricRecord, MetricSuite};
use crate::prompts::{lexrank, PromptSet, PromptTemplate, KEY_SENTENCE_EXTRACTION};
use crate::providers::{GenerationError, Model};
use crate::reporting::{TranscriptEntry, TranscriptWriter};

/// Text returned by a generator, after truncation
#[derive(Debug, Clone)]
pub struct GeneratedSummary {
    pub text: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub latency_ms: u64,
    /// Attempts made, including the successful one
    pub attempts: u32,
}

/// What a run produced
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub accumulator: Accumulator,
    pub documents_processed: usize,
    pub documents_skipped: usize,
    pub generations: usize,
    pub failed_generations: usize,
}

/// Runs the experiment one call at a time
pub struct Executor {
    models: Vec<Model>,
    prompts: PromptSet,
    suite: MetricSuite,
    retry: RetryPolicy,
    pacer: Pacer,
    repeats: u32,
    max_documents: Option<usize>,
    max_summary_words: Option<usize>,
    extraction: ExtractionConfig,
    extraction_model: Option<Model>,
    transcript: Option<TranscriptWriter>,
    progress: Arc<dyn ProgressCallback>,
}

impl Executor {
    /// Executor with one repeat, no pacing and the default retry policy
    pub fn new(models: Vec<Model>, prompts: PromptSet, suite: MetricSuite) -> Self {
        Self {
            models,
            prompts,
            suite,
            retry: RetryPolicy::default(),
            pacer: Pacer::disabled(),
            repeats: 1,
            max_documents: None,
            max_summary_words: None,
            extraction: ExtractionConfig::default(),
            extraction_model: None,
            transcript: None,
            progress: Arc::new(NoOpProgress),
        }
    }

    /// Apply every run setting from the experiment configuration
    pub fn from_config(config: &Config, models: Vec<Model>, prompts: PromptSet, suite: MetricSuite) -> Self {
        let extraction_model = match (&config.extraction.strategy, &config.extraction.model) {
            (ExtractionStrategy::Model, Some(name)) => models.iter().find(|m| m.name() == name).cloned(),
            _ => None,
        };

        let mut executor = Self::new(models, prompts, suite)
            .with_retry_policy(RetryPolicy::from_config(&config.generation))
            .with_pacer(Pacer::from_millis(config.experiment.pacing_ms))
            .with_repeats(config.experiment.repeats)
            .with_extraction(config.extraction.clone(), extraction_model);
        executor.max_documents = config.experiment.max_documents;
        executor.max_summary_words = config.generation.max_summary_words;
        if let Some(path) = &config.experiment.transcript {
            executor = executor.with_transcript(TranscriptWriter::new(path));
        }
        executor
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn with_repeats(mut self, repeats: u32) -> Self {
        self.repeats = repeats;
        self
    }

    pub fn with_max_documents(mut self, max: Option<usize>) -> Self {
        self.max_documents = max;
        self
    }

    pub fn with_max_summary_words(mut self, max: Option<usize>) -> Self {
        self.max_summary_words = max;
        self
    }

    pub fn with_extraction(mut self, extraction: ExtractionConfig, model: Option<Model>) -> Self {
        self.extraction = extraction;
        self.extraction_model = model;
        self
    }

    pub fn with_transcript(mut self, transcript: TranscriptWriter) -> Self {
        self.transcript = Some(transcript);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    /// Generate one summary, cut to `max_summary_words` when set
    pub async fn generate(&self, prompt: &str, model: &Model) -> Result<GeneratedSummary, GenerationError> {
        let mut summary = self.generate_raw(prompt, model).await?;
        if let Some(max) = self.max_summary_words {
            summary.text = truncate_words(&summary.text, max);
        }
        Ok(summary)
    }

    /// One generation with retries and no truncation.
    ///
    /// Retryable failures wait `delay_for(retry)` before the next attempt; a
    /// rate limit waits its own `retry_after` (capped) instead. Nothing waits
    /// after the final attempt.
    pub async fn generate_raw(&self, prompt: &str, model: &Model) -> Result<GeneratedSummary, GenerationError> {
        let request = model.request(prompt);
        let mut last_error = None;
        let mut rate_limit_wait: Option<Duration> = None;

        for attempt in 0..=self.retry.retry_count {
            if attempt > 0 {
                let delay = rate_limit_wait.take().unwrap_or_else(|| self.retry.delay_for(attempt));
                tracing::info!("Retry {} on {} after {:?}", attempt, model.name(), delay);
                sleep(delay).await;
            }

            let result = match tokio::time::timeout(self.retry.timeout(), model.generator.complete(&request)).await {
                Ok(result) => result,
                Err(_) => Err(GenerationError::Timeout {
                    timeout_ms: self.retry.timeout_ms,
                }),
            };

            match result {
                Ok(response) => {
                    return Ok(GeneratedSummary {
                        text: response.content.trim().to_string(),
                        model: response.model,
                        input_tokens: response.input_tokens,
                        output_tokens: response.output_tokens,
                        latency_ms: response.latency_ms,
                        attempts: attempt + 1,
                    });
                }
                Err(GenerationError::RateLimited { retry_after_ms }) => {
                    let wait = retry_after_ms.min(self.retry.max_retry_delay_ms);
                    tracing::warn!("Rate limited on {}, retry after {}ms", model.name(), wait);
                    rate_limit_wait = Some(Duration::from_millis(wait));
                    last_error = Some(GenerationError::RateLimited { retry_after_ms });
                }
                Err(e) if e.is_retryable() => {
                    tracing::warn!("Attempt {} on {} failed: {}", attempt + 1, model.name(), e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| GenerationError::Config("no attempts were made".to_string())))
    }

    /// Key sentences for `{extract}`; `None` means use the full abstract
    pub async fn extract(&self, document: &Document) -> Option<String> {
        match self.extraction.strategy {
            ExtractionStrategy::None => None,
            ExtractionStrategy::LexRank => Some(lexrank(&document.abstract_text, self.extraction.sentences)),
            ExtractionStrategy::Model => {
                let model = self.extraction_model.as_ref()?;
                let prompt = PromptTemplate::new("extraction", KEY_SENTENCE_EXTRACTION).render(document, None);
                let result = self.generate_raw(&prompt, model).await;
                self.pacer.pause().await;
                match result {
                    Ok(summary) => {
                        tracing::debug!("Extracted key sentences for document {}: {}", document.index, summary.text);
                        Some(summary.text)
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Extraction failed for document {} on {}, using full abstract: {}",
                            document.index,
                            model.name(),
                            e
                        );
                        None
                    }
                }
            }
        }
    }

    /// Process every usable document and collect the score lists
    pub async fn run(&self, documents: &[Document]) -> RunOutput {
        let mut accumulator = Accumulator::new(self.suite.metrics().to_vec(), self.repeats);
        let mut processed = 0;
        let mut skipped = 0;
        let mut generations = 0;
        let mut failed = 0;

        if !self.pacer.delay().is_zero() {
            tracing::info!("Pausing {:?} after each generation", self.pacer.delay());
        }

        let total = match self.max_documents {
            Some(max) => documents.iter().filter(|d| d.is_usable()).count().min(max),
            None => documents.iter().filter(|d| d.is_usable()).count(),
        };

        for document in documents {
            if self.max_documents.is_some_and(|max| processed >= max) {
                break;
            }
            if let Some(field) = document.missing_field() {
                tracing::warn!("Skipping document {}: no {}", document.index, field);
                skipped += 1;
                continue;
            }

            processed += 1;
            self.progress.on_document_start(document.index, processed, total);

            let extract = if self.prompts.uses_extract() {
                self.extract(document).await
            } else {
                None
            };

            for prompt in self.prompts.build_prompts(document, extract.as_deref()) {
                tracing::info!(
                    "Document {} prompt {}: {}",
                    document.index,
                    prompt.number,
                    prompt.sanitized
                );

                for model in &self.models {
                    for repeat in 0..self.repeats {
                        generations += 1;
                        let outcome = self.generate(&prompt.text, model).await;

                        let record = match &outcome {
                            Ok(summary) => {
                                tracing::info!(
                                    "Document {} prompt {} repeat {} on {}: {} words",
                                    document.index,
                                    prompt.number,
                                    repeat + 1,
                                    model.name(),
                                    summary.text.split_whitespace().count()
                                );
                                self.suite
                                    .evaluate(&summary.text, &document.reference, &document.abstract_text)
                                    .await
                            }
                            Err(e) => {
                                failed += 1;
                                tracing::error!(
                                    "Generation failed for document {} prompt {} repeat {} on {}: {}",
                                    document.index,
                                    prompt.number,
                                    repeat + 1,
                                    model.name(),
                                    e
                                );
                                MetricRecord::failed(self.suite.metrics())
                            }
                        };

                        if let Some(transcript) = &self.transcript {
                            let entry = TranscriptEntry::new(document.index, &prompt, model.name(), repeat + 1, &outcome, &record);
                            if let Err(e) = transcript.append(&entry) {
                                tracing::warn!("Could not write transcript: {}", e);
                            }
                        }

                        accumulator.record(document.index, &prompt, model.name(), &record);
                        self.progress.on_generation_complete(
                            document.index,
                            prompt.number,
                            model.name(),
                            repeat + 1,
                            outcome.is_ok(),
                        );
                        self.pacer.pause().await;
                    }
                }
            }

            self.progress.on_progress(processed, total);
        }

        RunOutput {
            accumulator,
            documents_processed: processed,
            documents_skipped: skipped,
            generations,
            failed_generations: failed,
        }
    }
}

/// First `max` whitespace-separated words
pub fn truncate_words(text: &str, max: usize) -> String {
    text.split_whitespace().take(max).collect::<Vec<_>>().join(" ")
}

/// Progress callback for tracking execution
pub trait ProgressCallback: Send + Sync {
    fn on_document_start(&self, document_index: usize, position: usize, total: usize);
    fn on_generation_complete(&self, document_index: usize, prompt_number: usize, model: &str, repeat: u32, success: bool);
    fn on_progress(&self, completed: usize, total: usize);
}

/// Default no-op progress callback
pub struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_document_start(&self, _document_index: usize, _position: usize, _total: usize) {}
    fn on_generation_complete(&self, _document_index: usize, _prompt_number: usize, _model: &str, _repeat: u32, _success: bool) {}
    fn on_progress(&self, _completed: usize, _total: usize) {}
}

/// Console progress callback
pub struct ConsoleProgress;

impl ProgressCallback for ConsoleProgress {
    fn on_document_start(&self, document_index: usize, position: usize, total: usize) {
        println!("Document {} ({}/{})", document_index, position, total);
    }

    fn on_generation_complete(&self, _document_index: usize, prompt_number: usize, model: &str, repeat: u32, success: bool) {
        let status = if success { "OK" } else { "FAILED" };
        println!("  prompt {} / {} / repeat {}: {}", prompt_number, model, repeat, status);
    }

    fn on_progress(&self, completed: usize, total: usize) {
        println!("Progress: {}/{} documents complete", completed, total);
    }
}
