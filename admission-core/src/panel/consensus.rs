//! Consensus scoring: runs the persona panel and aggregates a bridge score.
//!
//! ```text
//! aggregate = clamp(mean(scores) − penalty_factor × stddev(scores), 0, 1)
//! ```
//!
//! The variance penalty models the bridging requirement: a note that splits
//! the panel scores worse than one every persona finds acceptable.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::critic::{PersonaCritic, PersonaFeedback};
use super::persona::Panel;
use crate::config::{ConsensusConfig, TimeoutConfig};
use crate::draft::Draft;
use crate::oracle::LanguageOracle;

/// Admission-likelihood tier for an aggregate score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusTier {
    LikelyHelpful,
    NeedsWork,
    NotHelpful,
}

impl std::fmt::Display for StatusTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LikelyHelpful => write!(f, "LIKELY_HELPFUL"),
            Self::NeedsWork => write!(f, "NEEDS_WORK"),
            Self::NotHelpful => write!(f, "NOT_HELPFUL"),
        }
    }
}

/// Outcome of one panel run over one draft. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub id: Uuid,
    pub draft_id: Uuid,
    /// Aggregate score in `[0, 1]`.
    pub aggregate: f64,
    pub status: StatusTier,
    pub feedback: Vec<PersonaFeedback>,
    pub model_id: String,
    pub created_at: DateTime<Utc>,
}

impl ConsensusResult {
    /// The lowest-scoring critique; the first one wins ties.
    pub fn harshest(&self) -> Option<&PersonaFeedback> {
        harshest(&self.feedback)
    }

    /// Number of personas whose call degraded to a sentinel.
    pub fn degraded_count(&self) -> usize {
        self.feedback.iter().filter(|f| f.is_sentinel()).count()
    }
}

/// The lowest-scoring entry of `feedback`; the first one wins ties.
pub fn harshest(feedback: &[PersonaFeedback]) -> Option<&PersonaFeedback> {
    feedback
        .iter()
        .reduce(|worst, f| if f.score < worst.score { f } else { worst })
}

/// Variance-penalised mean of `scores`, clamped to `[0, 1]`.
///
/// An empty slice scores 0.0. A panel with zero spread scores exactly its
/// common value.
pub fn aggregate(scores: &[f64], penalty_factor: f64) -> f64 {
    let Some(&first) = scores.first() else {
        return 0.0;
    };
    if scores.iter().all(|&s| s == first) {
        return first.clamp(0.0, 1.0);
    }

    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
    (mean - penalty_factor * variance.sqrt()).clamp(0.0, 1.0)
}

/// Map an aggregate to its tier.
pub fn tier_for(aggregate: f64, config: &ConsensusConfig) -> StatusTier {
    if aggregate > config.likely_helpful_above {
        StatusTier::LikelyHelpful
    } else if aggregate < config.not_helpful_below {
        StatusTier::NotHelpful
    } else {
        StatusTier::NeedsWork
    }
}

/// Runs a fixed panel of persona critics over drafts.
pub struct ConsensusScorer {
    critics: Vec<PersonaCritic>,
    model_id: String,
    config: ConsensusConfig,
}

impl ConsensusScorer {
    pub fn new(
        panel: &Panel,
        oracle: Arc<dyn LanguageOracle>,
        config: ConsensusConfig,
        timeouts: &TimeoutConfig,
    ) -> Self {
        let model_id = oracle.model_id();
        let critics = panel
            .personas()
            .iter()
            .map(|p| PersonaCritic::new(p.clone(), Arc::clone(&oracle), timeouts.oracle()))
            .collect();
        Self {
            critics,
            model_id,
            config,
        }
    }

    pub fn panel_size(&self) -> usize {
        self.critics.len()
    }

    /// Critique `draft` with every persona concurrently and aggregate.
    pub async fn score(&self, draft: &Draft) -> ConsensusResult {
        let feedback: Vec<PersonaFeedback> =
            join_all(self.critics.iter().map(|c| c.critique(&draft.text))).await;
        let result = self.build_result(draft, feedback);
        info!(
            draft_id = %draft.id,
            aggregate = result.aggregate,
            status = %result.status,
            degraded = result.degraded_count(),
            "consensus computed"
        );
        result
    }

    /// Aggregate already-collected feedback for `draft`.
    pub fn build_result(&self, draft: &Draft, feedback: Vec<PersonaFeedback>) -> ConsensusResult {
        let scores: Vec<f64> = feedback.iter().map(|f| f.score).collect();
        let aggregate = aggregate(&scores, self.config.penalty_factor);
        ConsensusResult {
            id: Uuid::new_v4(),
            draft_id: draft.id,
            aggregate,
            status: tier_for(aggregate, &self.config),
            feedback,
            model_id: self.model_id.clone(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fb(id: &str, score: f64) -> PersonaFeedback {
        PersonaFeedback {
            persona_id: id.to_string(),
            score,
            rationale: "r".to_string(),
            missing_context: false,
            strengths: vec![],
            weaknesses: vec![],
        }
    }

    #[test]
    fn test_zero_variance_is_exact() {
        assert_eq!(aggregate(&[0.7; 5], 1.0), 0.7);
        assert_eq!(aggregate(&[0.3], 1.0), 0.3);
    }

    #[test]
    fn test_high_variance_penalised() {
        let scores = [0.0, 1.0, 0.0, 1.0, 0.0];
        let penalised = aggregate(&scores, 1.0);
        assert!(penalised < 0.4);
        assert!(penalised >= 0.0);
    }

    #[test]
    fn test_penalty_factor_tunable() {
        let scores = [0.6, 0.8];
        let mild = aggregate(&scores, 0.5);
        let harsh = aggregate(&scores, 1.0);
        assert!((mild - 0.65).abs() < 1e-9);
        assert!((harsh - 0.6).abs() < 1e-9);
        assert!((aggregate(&scores, 0.0) - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_empty_scores() {
        assert_eq!(aggregate(&[], 1.0), 0.0);
    }

    #[test]
    fn test_aggregate_always_in_unit_range() {
        let grids: Vec<Vec<f64>> = vec![
            vec![1.0, 1.0, 1.0],
            vec![0.0],
            vec![1.0, 0.0],
            vec![0.99, 0.01, 0.5, 0.5],
            vec![0.2, 0.9, 0.4, 0.6, 0.1],
        ];
        for scores in grids {
            for factor in [0.0, 0.5, 1.0, 1.5, 3.0] {
                let a = aggregate(&scores, factor);
                assert!((0.0..=1.0).contains(&a), "{scores:?} × {factor} → {a}");
            }
        }
    }

    #[test]
    fn test_tiers() {
        let config = ConsensusConfig::default();
        assert_eq!(tier_for(0.61, &config), StatusTier::LikelyHelpful);
        assert_eq!(tier_for(0.6, &config), StatusTier::NeedsWork);
        assert_eq!(tier_for(0.4, &config), StatusTier::NeedsWork);
        assert_eq!(tier_for(0.39, &config), StatusTier::NotHelpful);
    }

    #[test]
    fn test_harshest_first_on_ties() {
        let feedback = vec![fb("a", 0.5), fb("b", 0.2), fb("c", 0.2), fb("d", 0.9)];
        assert_eq!(harshest(&feedback).unwrap().persona_id, "b");
        assert!(harshest(&[]).is_none());
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(
            serde_json::to_string(&StatusTier::NotHelpful).unwrap(),
            "\"NOT_HELPFUL\""
        );
        assert_eq!(StatusTier::LikelyHelpful.to_string(), "LIKELY_HELPFUL");
    }
}
