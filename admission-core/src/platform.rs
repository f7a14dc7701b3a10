//! Platform seams (the authoritative evaluator and the note submitter)
//! plus tolerant parsing of their response shapes.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::tags::MisleadingTag;

/// Errors from platform transport.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("platform transport failed: {0}")]
    Transport(String),

    #[error("platform returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("platform call timed out after {0:?}")]
    Timeout(Duration),

    #[error("platform response was not JSON: {0}")]
    Decode(String),

    #[error("platform unavailable: {0}")]
    Unavailable(String),
}

/// Note classification enum of the submission endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    #[default]
    MisinformedOrPotentiallyMisleading,
    NotMisleading,
}

/// The `info` block of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteInfo {
    pub classification: Classification,
    pub misleading_tags: Vec<MisleadingTag>,
    pub text: String,
    pub trustworthy_sources: bool,
}

/// Wire payload for the submission endpoint.
///
/// Only [`crate::gateway::SubmissionGateway`] builds these, after the text
/// has passed contract validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteSubmission {
    pub info: NoteInfo,
    pub post_id: String,
    pub test_mode: bool,
}

/// Practice-mode grader.
#[async_trait]
pub trait PlatformEvaluator: Send + Sync {
    async fn evaluate_note(&self, post_id: &str, note_text: &str) -> Result<Value, PlatformError>;
}

/// Exam-mode / final submitter.
#[async_trait]
pub trait PlatformSubmitter: Send + Sync {
    async fn submit_note(&self, submission: &NoteSubmission) -> Result<Value, PlatformError>;
}

pub async fn evaluate_with_timeout(
    evaluator: &dyn PlatformEvaluator,
    post_id: &str,
    note_text: &str,
    timeout: Duration,
) -> Result<Value, PlatformError> {
    tokio::time::timeout(timeout, evaluator.evaluate_note(post_id, note_text))
        .await
        .unwrap_or(Err(PlatformError::Timeout(timeout)))
}

pub async fn submit_with_timeout(
    submitter: &dyn PlatformSubmitter,
    submission: &NoteSubmission,
    timeout: Duration,
) -> Result<Value, PlatformError> {
    tokio::time::timeout(timeout, submitter.submit_note(submission))
        .await
        .unwrap_or(Err(PlatformError::Timeout(timeout)))
}

/// Score map keys.
pub const URL_VALIDITY: &str = "url_validity_score";
pub const CLAIM_OPINION: &str = "claim_opinion_score";
pub const HARASSMENT_ABUSE: &str = "harassment_abuse_score";

/// Key paths at which an evaluator response may carry the claim/opinion score.
const CLAIM_OPINION_PATHS: &[&str] = &[
    "/noteContent/claimOpinionScore",
    "/data/noteContent/claimOpinionScore",
    "/claim_opinion_score",
    "/evaluation/claimOpinionScore",
];

/// Numbers or numeric strings; NaN and infinities count as absent.
fn as_score(value: &Value) -> Option<f64> {
    let score = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    score.is_finite().then_some(score)
}

/// Claim/opinion score from a practice evaluation; 0.0 for unknown shapes.
pub fn parse_claim_opinion_score(response: &Value) -> f64 {
    CLAIM_OPINION_PATHS
        .iter()
        .find_map(|path| response.pointer(path).and_then(as_score))
        .unwrap_or(0.0)
}

/// The three exam dimensions parsed from a submission response.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AdmissionScores {
    pub url_validity: f64,
    pub claim_opinion: f64,
    pub harassment_abuse: f64,
}

/// Parse exam dimensions from either known response shape.
///
/// Shape A carries snake_case keys at the root; shape B nests camelCase keys
/// under `note_evaluation` or `evaluation`. Shape B wins when both are
/// present. Missing dimensions are 0.0.
pub fn parse_admission_scores(response: &Value) -> AdmissionScores {
    let mut scores = AdmissionScores::default();

    let root = |key: &str| response.get(key).and_then(as_score);
    if let Some(v) = root(URL_VALIDITY) {
        scores.url_validity = v;
    }
    if let Some(v) = root(CLAIM_OPINION) {
        scores.claim_opinion = v;
    }
    if let Some(v) = root(HARASSMENT_ABUSE) {
        scores.harassment_abuse = v;
    }

    let nested = response
        .get("note_evaluation")
        .filter(|v| v.is_object())
        .or_else(|| response.get("evaluation").filter(|v| v.is_object()));
    if let Some(eval) = nested {
        let field = |key: &str| eval.get(key).and_then(as_score);
        if let Some(v) = field("urlValidity") {
            scores.url_validity = v;
        }
        if let Some(v) = field("claimOpinion") {
            scores.claim_opinion = v;
        }
        if let Some(v) = field("harassmentAbuse") {
            scores.harassment_abuse = v;
        }
    }

    scores
}
