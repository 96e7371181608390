//! ROUGE-1, ROUGE-2 and ROUGE-L F-measures
//!
//! Tokenization matches the usual ROUGE scoring package: text is lowercased,
//! every run of characters outside `[a-z0-9]` becomes a separator, and tokens
//! longer than three characters are optionally stemmed.

use async_trait::async_trait;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashMap;
use std::sync::OnceLock;

use super::{MetricId, ScoreInput, Scorer, ScoringResult};

/// Precision, recall and F-measure of one ROUGE variant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RougeScore {
    pub precision: f64,
    pub recall: f64,
    pub fmeasure: f64,
}

impl RougeScore {
    fn from_counts(overlap: usize, candidate_total: usize, reference_total: usize) -> Self {
        let precision = overlap as f64 / candidate_total.max(1) as f64;
        let recall = overlap as f64 / reference_total.max(1) as f64;
        Self {
            precision,
            recall,
            fmeasure: fmeasure(precision, recall),
        }
    }
}

fn fmeasure(precision: f64, recall: f64) -> f64 {
    if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    }
}

/// Native ROUGE scorer
pub struct RougeScorer {
    stemmer: Option<Stemmer>,
}

impl RougeScorer {
    pub fn new(use_stemmer: bool) -> Self {
        Self {
            stemmer: use_stemmer.then(|| Stemmer::create(Algorithm::English)),
        }
    }

    /// Split text into normalized tokens
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        static NON_ALNUM: OnceLock<Regex> = OnceLock::new();
        let re = NON_ALNUM.get_or_init(|| Regex::new(r"[^a-z0-9]+").unwrap());

        let lowered = text.to_lowercase();
        re.replace_all(&lowered, " ")
            .split_whitespace()
            .map(|token| match &self.stemmer {
                Some(stemmer) if token.len() > 3 => stemmer.stem(token).into_owned(),
                _ => token.to_string(),
            })
            .filter(|token| !token.is_empty())
            .collect()
    }

    /// ROUGE-N over n-gram multisets
    pub fn rouge_n(&self, candidate: &str, reference: &str, n: usize) -> RougeScore {
        let cand_tokens = self.tokenize(candidate);
        let ref_tokens = self.tokenize(reference);
        let cand = ngram_counts(&cand_tokens, n);
        let refs = ngram_counts(&ref_tokens, n);

        let overlap: usize = refs
            .iter()
            .map(|(gram, count)| (*count).min(cand.get(gram).copied().unwrap_or(0)))
            .sum();

        RougeScore::from_counts(overlap, cand.values().sum(), refs.values().sum())
    }

    /// ROUGE-L over the longest common token subsequence
    pub fn rouge_l(&self, candidate: &str, reference: &str) -> RougeScore {
        let cand = self.tokenize(candidate);
        let refs = self.tokenize(reference);
        if cand.is_empty() || refs.is_empty() {
            return RougeScore {
                precision: 0.0,
                recall: 0.0,
                fmeasure: 0.0,
            };
        }
        let lcs = lcs_length(&refs, &cand);
        RougeScore::from_counts(lcs, cand.len(), refs.len())
    }
}

fn ngram_counts(tokens: &[String], n: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    if n == 0 || tokens.len() < n {
        return counts;
    }
    for gram in tokens.windows(n) {
        *counts.entry(gram).or_insert(0) += 1;
    }
    counts
}

fn lcs_length(a: &[String], b: &[String]) -> usize {
    // Two rolling rows of the DP table
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for x in a {
        for (j, y) in b.iter().enumerate() {
            curr[j + 1] = if x == y {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[async_trait]
impl Scorer for RougeScorer {
    fn name(&self) -> &str {
        "rouge"
    }

    fn metrics(&self) -> &[MetricId] {
        &[MetricId::Rouge1, MetricId::Rouge2, MetricId::RougeL]
    }

    async fn score(&self, input: &ScoreInput<'_>) -> ScoringResult<Vec<(MetricId, f64)>> {
        Ok(vec![
            (MetricId::Rouge1, self.rouge_n(input.candidate, input.reference, 1).fmeasure),
            (MetricId::Rouge2, self.rouge_n(input.candidate, input.reference, 2).fmeasure),
            (MetricId::RougeL, self.rouge_l(input.candidate, input.reference).fmeasure),
        ])
    }
}
