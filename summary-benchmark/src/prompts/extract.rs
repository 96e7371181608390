//! Extractive key-sentence selection (LexRank)

use std::collections::{HashMap, HashSet};

const SIMILARITY_THRESHOLD: f64 = 0.1;
const DAMPING: f64 = 0.85;
const EPSILON: f64 = 1e-8;
const MAX_ITERATIONS: usize = 200;

/// Split text after `.`, `!` or `?` followed by whitespace or end of text.
///
/// Decimals such as `3.5` stay in one sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            while let Some(&next) = chars.peek() {
                if matches!(next, '.' | '!' | '?' | '"' | '\'' | ')') {
                    current.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            if chars.peek().map_or(true, |n| n.is_whitespace()) {
                let sentence = current.trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                current.clear();
            }
        }
    }

    let rest = current.trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

fn words(sentence: &str) -> Vec<String> {
    sentence
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Pick the `count` most central sentences, returned in original order and
/// joined with spaces. Text with at most `count` sentences comes back whole.
pub fn lexrank(text: &str, count: usize) -> String {
    let sentences = split_sentences(text);
    if sentences.len() <= count {
        return text.trim().to_string();
    }

    let scores = lexrank_scores(&sentences);
    let mut ranked: Vec<usize> = (0..sentences.len()).collect();
    ranked.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    let mut chosen: Vec<usize> = ranked.into_iter().take(count).collect();
    chosen.sort_unstable();
    chosen
        .iter()
        .map(|&i| sentences[i].as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Centrality of each sentence in the thresholded similarity graph
pub fn lexrank_scores(sentences: &[String]) -> Vec<f64> {
    let n = sentences.len();
    if n == 0 {
        return Vec::new();
    }

    let tokenized: Vec<Vec<String>> = sentences.iter().map(|s| words(s)).collect();

    let mut document_frequency: HashMap<&str, usize> = HashMap::new();
    for tokens in &tokenized {
        let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
        for word in unique {
            *document_frequency.entry(word).or_insert(0) += 1;
        }
    }
    let idf = |word: &str| -> f64 {
        let df = document_frequency.get(word).copied().unwrap_or(1);
        (n as f64 / df as f64).ln()
    };

    // tf-idf vectors with term frequency normalized by the sentence's max tf
    let vectors: Vec<HashMap<&str, f64>> = tokenized
        .iter()
        .map(|tokens| {
            let mut tf: HashMap<&str, f64> = HashMap::new();
            for t in tokens {
                *tf.entry(t.as_str()).or_insert(0.0) += 1.0;
            }
            let max_tf = tf.values().cloned().fold(0.0, f64::max);
            tf.into_iter()
                .map(|(w, f)| (w, f / max_tf * idf(w)))
                .collect()
        })
        .collect();
    let norms: Vec<f64> = vectors
        .iter()
        .map(|v| v.values().map(|x| x * x).sum::<f64>().sqrt())
        .collect();

    let mut adjacency = vec![vec![false; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            if norms[i] == 0.0 || norms[j] == 0.0 {
                continue;
            }
            let dot: f64 = vectors[i]
                .iter()
                .filter_map(|(w, x)| vectors[j].get(w).map(|y| x * y))
                .sum();
            if dot / (norms[i] * norms[j]) > SIMILARITY_THRESHOLD {
                adjacency[i][j] = true;
                adjacency[j][i] = true;
            }
        }
    }
    let degrees: Vec<usize> = adjacency
        .iter()
        .map(|row| row.iter().filter(|&&e| e).count())
        .collect();

    // Power iteration; sentences without neighbours spread their mass evenly
    let uniform = 1.0 / n as f64;
    let mut scores = vec![uniform; n];
    for _ in 0..MAX_ITERATIONS {
        let dangling: f64 = (0..n).filter(|&i| degrees[i] == 0).map(|i| scores[i]).sum();
        let mut next = vec![(1.0 - DAMPING) * uniform + DAMPING * dangling * uniform; n];
        for i in 0..n {
            if degrees[i] == 0 {
                continue;
            }
            let share = DAMPING * scores[i] / degrees[i] as f64;
            for j in 0..n {
                if adjacency[i][j] {
                    next[j] += share;
                }
            }
        }
        let delta: f64 = next.iter().zip(&scores).map(|(a, b)| (a - b).abs()).sum();
        scores = next;
        if delta < EPSILON {
            break;
        }
    }
    scores
}
