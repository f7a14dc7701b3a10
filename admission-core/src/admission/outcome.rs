use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Which admission check produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionMode {
    Practice,
    Exam,
}

impl std::fmt::Display for AdmissionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Practice => write!(f, "practice"),
            Self::Exam => write!(f, "exam"),
        }
    }
}

/// Fixed vocabulary of failure reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FailureReason {
    UrlValidity,
    ClaimOpinion,
    HarassmentAbuse,
    #[serde(rename = "API Error")]
    ApiError,
    #[serde(rename = "System Error")]
    SystemError,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UrlValidity => "UrlValidity",
            Self::ClaimOpinion => "ClaimOpinion",
            Self::HarassmentAbuse => "HarassmentAbuse",
            Self::ApiError => "API Error",
            Self::SystemError => "System Error",
        }
    }

    /// Whether a content rewrite can address this reason.
    pub fn is_content(self) -> bool {
        matches!(self, Self::ClaimOpinion | Self::HarassmentAbuse)
    }

    /// Whether any repair step (source or rewrite) can address this reason.
    pub fn is_repairable(self) -> bool {
        self == Self::UrlValidity || self.is_content()
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path a practice check took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PracticePath {
    /// The primary scorer answered.
    Primary,
    /// The primary failed and the oracle-simulated score was used.
    Fallback,
    /// Both failed.
    SystemError,
}

/// Who produced the claim/opinion score of a practice check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    Platform,
    Heuristic,
    Oracle,
}

/// Result of one admission check. Always well formed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "OutcomeRecord")]
pub struct AdmissionOutcome {
    pub id: Uuid,
    pub draft_id: Uuid,
    pub mode: AdmissionMode,
    passed: bool,
    failure_reasons: Vec<FailureReason>,
    pub scores: BTreeMap<String, f64>,
    pub practice_path: Option<PracticePath>,
    pub score_source: Option<ScoreSource>,
    pub raw_payload: Option<Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Serialized form. Any stored `passed` flag is ignored and recomputed.
#[derive(Deserialize)]
struct OutcomeRecord {
    id: Uuid,
    draft_id: Uuid,
    mode: AdmissionMode,
    #[serde(default)]
    failure_reasons: Vec<FailureReason>,
    #[serde(default)]
    scores: BTreeMap<String, f64>,
    #[serde(default)]
    practice_path: Option<PracticePath>,
    #[serde(default)]
    score_source: Option<ScoreSource>,
    #[serde(default)]
    raw_payload: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<OutcomeRecord> for AdmissionOutcome {
    fn from(r: OutcomeRecord) -> Self {
        Self {
            id: r.id,
            draft_id: r.draft_id,
            mode: r.mode,
            passed: r.failure_reasons.is_empty(),
            failure_reasons: r.failure_reasons,
            scores: r.scores,
            practice_path: r.practice_path,
            score_source: r.score_source,
            raw_payload: r.raw_payload,
            error: r.error,
            created_at: r.created_at,
        }
    }
}

impl AdmissionOutcome {
    /// `passed` is derived from the reasons, so the two can never disagree.
    pub fn new(
        draft_id: Uuid,
        mode: AdmissionMode,
        failure_reasons: Vec<FailureReason>,
        scores: BTreeMap<String, f64>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            draft_id,
            mode,
            passed: failure_reasons.is_empty(),
            failure_reasons,
            scores,
            practice_path: None,
            score_source: None,
            raw_payload: None,
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_practice_path(mut self, path: PracticePath, source: Option<ScoreSource>) -> Self {
        self.practice_path = Some(path);
        self.score_source = source;
        self
    }

    pub fn with_raw_payload(mut self, payload: Value) -> Self {
        self.raw_payload = Some(payload);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn failure_reasons(&self) -> &[FailureReason] {
        &self.failure_reasons
    }

    /// Reasons as their wire strings.
    pub fn reason_labels(&self) -> Vec<&'static str> {
        self.failure_reasons.iter().map(|r| r.as_str()).collect()
    }

    pub fn used_fallback(&self) -> bool {
        self.practice_path == Some(PracticePath::Fallback)
    }
}
