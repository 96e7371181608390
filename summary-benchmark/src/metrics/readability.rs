//! Readability indices: Flesch-Kincaid grade, Coleman-Liau and Dale-Chall

use async_trait::async_trait;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

use super::{MetricId, ScoreInput, Scorer, ScoringError, ScoringResult};

/// Surface counts a readability formula is built from
#[derive(Debug, Clone)]
pub struct TextStats {
    pub sentences: usize,
    /// Lowercased words, punctuation stripped
    pub words: Vec<String>,
    pub letters: usize,
    pub syllables: usize,
}

impl TextStats {
    pub fn from_text(text: &str) -> ScoringResult<Self> {
        static WORD: OnceLock<Regex> = OnceLock::new();
        let word_re = WORD.get_or_init(|| Regex::new(r"[A-Za-z0-9]+(?:['’][A-Za-z]+)*").unwrap());

        let words: Vec<String> = word_re
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase().replace('’', "'"))
            .collect();
        if words.is_empty() {
            return Err(ScoringError::EmptyText);
        }

        let letters = words
            .iter()
            .map(|w| w.chars().filter(|c| c.is_alphanumeric()).count())
            .sum();
        let syllables = words.iter().map(|w| syllable_count(w)).sum();

        Ok(Self {
            sentences: sentence_count(text),
            words,
            letters,
            syllables,
        })
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Average sentence length in words
    pub fn avg_sentence_length(&self) -> f64 {
        self.word_count() as f64 / self.sentences as f64
    }

    /// Average syllables per word
    pub fn avg_syllables_per_word(&self) -> f64 {
        self.syllables as f64 / self.word_count() as f64
    }
}

/// Sentences ending in `.`, `!` or `?`, never fewer than one
fn sentence_count(text: &str) -> usize {
    text.split(['.', '!', '?'])
        .filter(|s| s.chars().any(|c| c.is_alphanumeric()))
        .count()
        .max(1)
}

/// Vowel-group syllable estimate
pub fn syllable_count(word: &str) -> usize {
    let letters: Vec<char> = word
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if letters.is_empty() {
        return 1;
    }

    let is_vowel = |c: char| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
    let mut count = 0;
    let mut prev_vowel = false;
    for &c in &letters {
        let vowel = is_vowel(c);
        if vowel && !prev_vowel {
            count += 1;
        }
        prev_vowel = vowel;
    }

    // Silent final e, but keep "-le" endings like "table"
    let n = letters.len();
    if count > 1 && letters[n - 1] == 'e' && !(n >= 2 && letters[n - 2] == 'l') {
        count -= 1;
    }

    count.max(1)
}

/// Flesch-Kincaid grade level
pub struct FleschKincaid;

impl FleschKincaid {
    pub fn compute(stats: &TextStats) -> f64 {
        0.39 * stats.avg_sentence_length() + 11.8 * stats.avg_syllables_per_word() - 15.59
    }
}

#[async_trait]
impl Scorer for FleschKincaid {
    fn name(&self) -> &str {
        "flesch-kincaid"
    }

    fn metrics(&self) -> &[MetricId] {
        &[MetricId::Fkgl]
    }

    async fn score(&self, input: &ScoreInput<'_>) -> ScoringResult<Vec<(MetricId, f64)>> {
        let stats = TextStats::from_text(input.candidate)?;
        Ok(vec![(MetricId::Fkgl, Self::compute(&stats))])
    }
}

/// Coleman-Liau index
pub struct ColemanLiau;

impl ColemanLiau {
    pub fn compute(stats: &TextStats) -> f64 {
        let words = stats.word_count() as f64;
        let letters_per_100 = stats.letters as f64 / words * 100.0;
        let sentences_per_100 = stats.sentences as f64 / words * 100.0;
        0.058 * letters_per_100 - 0.296 * sentences_per_100 - 15.8
    }
}

#[async_trait]
impl Scorer for ColemanLiau {
    fn name(&self) -> &str {
        "coleman-liau"
    }

    fn metrics(&self) -> &[MetricId] {
        &[MetricId::Cli]
    }

    async fn score(&self, input: &ScoreInput<'_>) -> ScoringResult<Vec<(MetricId, f64)>> {
        let stats = TextStats::from_text(input.candidate)?;
        Ok(vec![(MetricId::Cli, Self::compute(&stats))])
    }
}

/// Dale-Chall readability score.
///
/// Needs the Dale-Chall list of familiar words. Without it every score is a
/// `ScoringError`, so only this metric is lost.
pub struct DaleChall {
    easy_words: Result<HashSet<String>, String>,
}

impl DaleChall {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let easy_words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        Self {
            easy_words: Ok(easy_words),
        }
    }

    /// Load the word list, one word per line
    pub fn from_word_list_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::new(content.lines()),
            Err(e) => {
                tracing::warn!("Could not read Dale-Chall word list {}: {}", path.display(), e);
                Self {
                    easy_words: Err(format!("{}: {}", path.display(), e)),
                }
            }
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            easy_words: Err("scoring.readability.dale_chall_words is not set".to_string()),
        }
    }

    pub fn compute(&self, stats: &TextStats) -> ScoringResult<f64> {
        let easy = self
            .easy_words
            .as_ref()
            .map_err(|e| ScoringError::WordList(e.clone()))?;

        let difficult: HashSet<&str> = stats
            .words
            .iter()
            .filter(|w| syllable_count(w) >= 2 && !easy.contains(w.as_str()))
            .map(|w| w.as_str())
            .collect();

        let pdw = difficult.len() as f64 / stats.word_count() as f64 * 100.0;
        let mut score = 0.1579 * pdw + 0.0496 * stats.avg_sentence_length();
        if pdw > 5.0 {
            score += 3.6365;
        }
        Ok(score)
    }
}

#[async_trait]
impl Scorer for DaleChall {
    fn name(&self) -> &str {
        "dale-chall"
    }

    fn metrics(&self) -> &[MetricId] {
        &[MetricId::Dcrs]
    }

    async fn score(&self, input: &ScoreInput<'_>) -> ScoringResult<Vec<(MetricId, f64)>> {
        let stats = TextStats::from_text(input.candidate)?;
        Ok(vec![(MetricId::Dcrs, self.compute(&stats)?)])
    }
}
