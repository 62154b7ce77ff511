
use anyhow::Result;
use std::collections::{HashMap, HashSet};

use super::CrossEncoder;

const TERM_SATURATION: f32 = 1.2;
const PHRASE_WEIGHT: f32 = 0.5;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "can", "do", "does", "for", "from", "how",
    "i", "in", "is", "it", "my", "of", "on", "or", "should", "that", "the", "this", "to", "what",
    "when", "which", "why", "with", "you", "your",
];

/// Offline pairwise scorer based on query term overlap
///
/// Each distinct query term found in the passage contributes a saturating
/// term-frequency weight; adjacent query term pairs found adjacent in the
/// passage add a phrase bonus. Scores are normalised by query length.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalCrossEncoder;

impl CrossEncoder for LexicalCrossEncoder {
    #[inline]
    fn model_name(&self) -> &str {
        "lexical-overlap"
    }

    #[inline]
    fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
        let query_terms = terms(query);
        Ok(passages
            .iter()
            .map(|passage| score_pair(&query_terms, passage))
            .collect())
    }
}

fn terms(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty() && !STOPWORDS.contains(t))
        .map(str::to_string)
        .collect()
}

fn score_pair(query_terms: &[String], passage: &str) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }

    let passage_terms = terms(passage);
    let mut frequencies: HashMap<&str, f32> = HashMap::new();
    for term in &passage_terms {
        *frequencies.entry(term.as_str()).or_default() += 1.0;
    }

    let distinct: HashSet<&str> = query_terms.iter().map(String::as_str).collect();
    let term_score: f32 = distinct
        .iter()
        .filter_map(|term| frequencies.get(term))
        .map(|&tf| tf * (TERM_SATURATION + 1.0) / (tf + TERM_SATURATION))
        .sum();

    let passage_pairs: HashSet<(&str, &str)> = passage_terms
        .windows(2)
        .map(|w| (w[0].as_str(), w[1].as_str()))
        .collect();
    let phrase_hits = query_terms
        .windows(2)
        .filter(|w| passage_pairs.contains(&(w[0].as_str(), w[1].as_str())))
        .count();

    (phrase_hits as f32).mul_add(PHRASE_WEIGHT, term_score) / distinct.len() as f32
}
