//! Engine configuration: thresholds, tunables and call timeouts.
//!
//! A single [`EngineConfig`] is built once at bootstrap and handed to every
//! component constructor. Nothing in this crate reads process environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::tags::MisleadingTag;

/// Consensus aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Multiplier on the panel's standard deviation subtracted from the mean.
    pub penalty_factor: f64,
    /// Aggregate strictly above this is `LIKELY_HELPFUL`.
    pub likely_helpful_above: f64,
    /// Aggregate strictly below this is `NOT_HELPFUL`.
    pub not_helpful_below: f64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            penalty_factor: 1.0,
            likely_helpful_above: 0.6,
            not_helpful_below: 0.4,
        }
    }
}

/// Admission gates for practice and exam mode.
///
/// The exam gates and the practice gate are deliberately independent values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionThresholds {
    pub practice_claim_opinion_min: f64,
    pub exam_url_validity_min: f64,
    pub exam_claim_opinion_min: f64,
    pub exam_harassment_abuse_min: f64,
}

impl Default for AdmissionThresholds {
    fn default() -> Self {
        Self {
            practice_claim_opinion_min: 0.3,
            exam_url_validity_min: 0.95,
            exam_claim_opinion_min: 0.3,
            exam_harassment_abuse_min: 0.98,
        }
    }
}

/// Refine loop bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineConfig {
    /// Maximum rewrite rounds per lineage.
    pub max_rounds: u32,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self { max_rounds: 2 }
    }
}

/// End-to-end pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Repair → re-check rounds after a failed practice check.
    pub max_repair_rounds: u32,
    /// Best aggregate required before any admission check is attempted.
    pub submit_min_score: f64,
    /// Exam submissions go to the platform in test mode.
    pub test_mode: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_repair_rounds: 1,
            submit_min_score: 0.6,
            test_mode: true,
        }
    }
}

/// Wire-contract limits enforced by the submission gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    pub max_chars: usize,
    /// Characters kept before the first URL when truncating.
    pub url_lead_chars: usize,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            max_chars: 280,
            url_lead_chars: 200,
        }
    }
}

/// Per-call timeouts for every external collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub oracle_secs: u64,
    pub platform_secs: u64,
    pub url_probe_secs: u64,
}

impl TimeoutConfig {
    pub fn oracle(&self) -> Duration {
        Duration::from_secs(self.oracle_secs)
    }

    pub fn platform(&self) -> Duration {
        Duration::from_secs(self.platform_secs)
    }

    pub fn url_probe(&self) -> Duration {
        Duration::from_secs(self.url_probe_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            oracle_secs: 60,
            platform_secs: 30,
            url_probe_secs: 5,
        }
    }
}

/// Tag selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TagConfig {
    /// Tag used when the oracle cannot produce a valid selection.
    /// `None` makes selection failures surface as errors.
    pub fallback: Option<MisleadingTag>,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            fallback: Some(MisleadingTag::MissingImportantContext),
        }
    }
}

/// Top-level configuration injected into every component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub consensus: ConsensusConfig,
    pub admission: AdmissionThresholds,
    pub refine: RefineConfig,
    pub pipeline: PipelineConfig,
    pub submission: SubmissionConfig,
    pub timeouts: TimeoutConfig,
    pub tags: TagConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!((config.consensus.penalty_factor - 1.0).abs() < f64::EPSILON);
        assert!((config.admission.exam_url_validity_min - 0.95).abs() < f64::EPSILON);
        assert!((config.admission.exam_harassment_abuse_min - 0.98).abs() < f64::EPSILON);
        assert!((config.admission.practice_claim_opinion_min - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.submission.max_chars, 280);
        assert_eq!(config.timeouts.oracle(), Duration::from_secs(60));
        assert_eq!(
            config.tags.fallback,
            Some(MisleadingTag::MissingImportantContext)
        );
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{"consensus": {"penalty_factor": 0.5}, "pipeline": {"test_mode": false}}"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert!((config.consensus.penalty_factor - 0.5).abs() < f64::EPSILON);
        assert!((config.consensus.likely_helpful_above - 0.6).abs() < f64::EPSILON);
        assert!(!config.pipeline.test_mode);
        assert_eq!(config.pipeline.max_repair_rounds, 1);
    }
}
