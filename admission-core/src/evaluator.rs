//! Heuristic note evaluator.
//!
//! A local, network-free approximation of the platform's claim/opinion and
//! URL checks. It is only a stand-in for when no authoritative evaluator is
//! configured and makes no claim to reproduce the real scorer.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::urls::url_counts;

static TWO_DIGIT_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{2,}\b").expect("TWO_DIGIT_NUMBER_RE regex should compile"));

/// Phrases that mark a note as opinion rather than fact.
pub const SUBJECTIVE_MARKERS: &[&str] = &[
    "i think",
    "in my opinion",
    "we believe",
    "i believe",
    "should",
    "must",
    "clearly",
    "obviously",
];

const PRIOR: f64 = 0.6;
const SUBJECTIVE_STEP: f64 = 0.05;
const MAX_SUBJECTIVE_HITS: usize = 6;
const URL_BONUS: f64 = 0.10;
const NUMBER_BONUS: f64 = 0.05;
const QUOTE_BONUS: f64 = 0.05;
const MALFORMED_URL_PENALTY: f64 = 0.10;

/// Heuristic scores for one note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub claim_opinion_score: f64,
    /// At least one URL and no malformed ones.
    pub url_pass: bool,
    pub url_count: usize,
    pub invalid_url_count: usize,
    pub subjective_hits: usize,
}

/// Heuristic result attached to a stored draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeuristicScore {
    pub draft_id: Uuid,
    #[serde(flatten)]
    pub result: EvaluationResult,
    pub created_at: DateTime<Utc>,
}

impl HeuristicScore {
    pub fn new(draft_id: Uuid, result: EvaluationResult) -> Self {
        Self {
            draft_id,
            result,
            created_at: Utc::now(),
        }
    }
}

/// Pure heuristic scorer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoteEvaluator;

impl NoteEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, text: &str) -> EvaluationResult {
        let lower = text.to_lowercase();
        let subjective_hits: usize = SUBJECTIVE_MARKERS
            .iter()
            .map(|m| lower.matches(m).count())
            .sum();

        let (url_count, invalid_url_count) = url_counts(text);
        let valid_urls = url_count - invalid_url_count;
        let has_number = TWO_DIGIT_NUMBER_RE.is_match(text);
        let has_quotes = text.contains('"') || text.contains('\'');

        let mut score = PRIOR;
        score -= SUBJECTIVE_STEP * subjective_hits.min(MAX_SUBJECTIVE_HITS) as f64;
        if valid_urls > 0 {
            score += URL_BONUS;
        }
        if has_number {
            score += NUMBER_BONUS;
        }
        if has_quotes {
            score += QUOTE_BONUS;
        }
        if invalid_url_count >= 2 {
            score -= MALFORMED_URL_PENALTY;
        }

        EvaluationResult {
            claim_opinion_score: score.clamp(0.0, 1.0),
            url_pass: url_count > 0 && invalid_url_count == 0,
            url_count,
            invalid_url_count,
            subjective_hits,
        }
    }
}
