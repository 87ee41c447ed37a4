//! Hybrid response scoring.
//!
//! A pure function over (prompt, response) producing a value in `[0, 1]`:
//! a weighted blend of content length, error-free match, textual similarity
//! to the prompt, and inverse latency. Weights come from
//! `RAEBURN_SCORE_WEIGHTS` (JSON object or CSV) and are re-normalized to
//! sum to one before use. Scoring never reads or writes adapter state.

use crate::providers::ProviderResponse;
use std::collections::HashMap;

const LENGTH_CEILING: usize = 4000;

/// Weights for the four sub-scores. `matched` corresponds to the `match`
/// key of the environment override.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub length: f64,
    pub matched: f64,
    pub similarity: f64,
    pub latency: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            length: 0.15,
            matched: 0.25,
            similarity: 0.45,
            latency: 0.15,
        }
    }
}

impl ScoreWeights {
    /// Parse `RAEBURN_SCORE_WEIGHTS`. Accepts a JSON object with keys
    /// `length`, `match`, `similarity`, `latency`, or a CSV of four floats
    /// in that order. Any parse problem falls back to the defaults.
    pub fn from_env() -> Self {
        match std::env::var("RAEBURN_SCORE_WEIGHTS") {
            Ok(raw) if !raw.trim().is_empty() => {
                Self::parse(&raw).unwrap_or_default()
            }
            _ => Self::default(),
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.starts_with('{') {
            let v: serde_json::Value = serde_json::from_str(raw).ok()?;
            let defaults = Self::default();
            let field = |key: &str, fallback: f64| {
                v.get(key).and_then(|x| x.as_f64()).unwrap_or(fallback)
            };
            return Some(Self {
                length: field("length", defaults.length),
                matched: field("match", defaults.matched),
                similarity: field("similarity", defaults.similarity),
                latency: field("latency", defaults.latency),
            });
        }
        let parts: Vec<f64> = raw
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .ok()?;
        if parts.len() < 4 {
            return None;
        }
        Some(Self {
            length: parts[0],
            matched: parts[1],
            similarity: parts[2],
            latency: parts[3],
        })
    }

    /// Scale the weights to sum to one. A zero (or negative) sum falls back
    /// to the default split so the score stays bounded.
    pub fn normalized(&self) -> Self {
        let total = self.length + self.matched + self.similarity + self.latency;
        if total <= 0.0 {
            return Self::default();
        }
        Self {
            length: self.length / total,
            matched: self.matched / total,
            similarity: self.similarity / total,
            latency: self.latency / total,
        }
    }
}

/// Score a provider response against its prompt. Deterministic and pure.
pub fn hybrid_score(prompt: &str, response: &ProviderResponse, weights: &ScoreWeights) -> f64 {
    let weights = weights.normalized();
    let content_len = response.content.chars().count();
    let length_score = content_len.min(LENGTH_CEILING) as f64 / LENGTH_CEILING as f64;
    let match_score = if response.error.is_none() { 1.0 } else { 0.0 };
    let sim_score = sequence_ratio(prompt, &response.content);
    let latency_score = 1.0 / (1.0 + (response.latency_ms as f64).max(1.0));
    length_score * weights.length
        + match_score * weights.matched
        + sim_score * weights.similarity
        + latency_score * weights.latency
}

/// Symmetric matching-blocks ratio between two strings, in `[0, 1]`:
/// `2 * M / (|a| + |b|)` where `M` is the total length of the longest
/// non-overlapping matching blocks (the classic sequence-matcher measure).
/// Empty input on either side scores zero.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, &ch) in b.iter().enumerate() {
        b2j.entry(ch).or_default().push(j);
    }

    let mut matched = 0usize;
    let mut queue = vec![(0usize, a.len(), 0usize, b.len())];
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, k) = longest_match(&a, &b2j, alo, ahi, blo, bhi);
        if k > 0 {
            matched += k;
            if alo < i && blo < j {
                queue.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                queue.push((i + k, ahi, j + k, bhi));
            }
        }
    }
    2.0 * matched as f64 / (a.len() + b.len()) as f64
}

/// Longest contiguous matching block of `a[alo..ahi]` within `b[blo..bhi]`.
fn longest_match(
    a: &[char],
    b2j: &HashMap<char, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut besti, mut bestj, mut bestsize) = (alo, blo, 0usize);
    let mut j2len: HashMap<usize, usize> = HashMap::new();
    for (i, &ch) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut newj2len: HashMap<usize, usize> = HashMap::new();
        if let Some(positions) = b2j.get(&ch) {
            for &j in positions {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = if j > 0 {
                    j2len.get(&(j - 1)).copied().unwrap_or(0) + 1
                } else {
                    1
                };
                newj2len.insert(j, k);
                if k > bestsize {
                    besti = i + 1 - k;
                    bestj = j + 1 - k;
                    bestsize = k;
                }
            }
        }
        j2len = newj2len;
    }
    (besti, bestj, bestsize)
}
