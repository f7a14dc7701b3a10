//! End-to-end note pipeline for one (post, draft).
//!
//! ```text
//! persist draft ─► consensus ─► refine loop ─► best draft ─► heuristic record
//!        │
//!        └─ best ≥ submit_min_score ─► practice ⇄ repair (bounded) ─► tags ─► exam
//!                                                                        │
//!                                                   submission record ◄──┘ (pass)
//! ```
//!
//! A repairable exam rejection re-enters practice with the repaired draft,
//! sharing the practice repair budget.
//!
//! Every stage is written to the store only after it completes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::admission::{
    AdmissionEngine, AdmissionOutcome, AdmissionPhase, AdmissionSession, FailureReason,
    RepairReport, TransitionError,
};
use crate::config::{PipelineConfig, RefineConfig};
use crate::draft::{Draft, Post};
use crate::evaluator::{HeuristicScore, NoteEvaluator};
use crate::gateway::{ContractViolation, SubmissionRecord};
use crate::panel::{ConsensusResult, ConsensusScorer, RefineError, Refiner, StatusTier};
use crate::store::{NoteStore, StoreError};
use crate::tags::{MisleadingTag, TagError, TagSelector};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("refinement failed: {0}")]
    Refine(#[from] RefineError),

    #[error("admission state: {0}")]
    Transition(#[from] TransitionError),

    #[error("submission contract violated: {0}")]
    Contract(#[from] ContractViolation),

    #[error("tag selection: {0}")]
    Tags(#[from] TagError),
}

/// Where a pipeline run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    /// Best aggregate stayed under `submit_min_score`; nothing was checked.
    BelowThreshold,
    /// Practice never passed within the repair budget.
    PracticeFailed,
    /// The exam rejected the note and no repair could follow.
    ExamRejected,
    Submitted,
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BelowThreshold => write!(f, "below_threshold"),
            Self::PracticeFailed => write!(f, "practice_failed"),
            Self::ExamRejected => write!(f, "exam_rejected"),
            Self::Submitted => write!(f, "submitted"),
        }
    }
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub post_id: String,
    pub root_draft_id: Uuid,
    pub status: PipelineStatus,
    /// Every draft created, in creation order.
    pub drafts: Vec<Draft>,
    pub consensus: Vec<ConsensusResult>,
    pub best_draft_id: Uuid,
    pub best_aggregate: f64,
    pub heuristic: HeuristicScore,
    pub session: Option<AdmissionSession>,
    pub practice: Vec<AdmissionOutcome>,
    pub repairs: Vec<RepairReport>,
    pub tags: Vec<MisleadingTag>,
    pub exam: Option<AdmissionOutcome>,
    pub submission: Option<SubmissionRecord>,
    /// Text of the last draft that went through admission, or the best draft.
    pub final_text: String,
}

pub struct NotePipeline {
    scorer: ConsensusScorer,
    refiner: Refiner,
    engine: AdmissionEngine,
    tags: TagSelector,
    store: Arc<dyn NoteStore>,
    heuristic: NoteEvaluator,
    refine: RefineConfig,
    config: PipelineConfig,
}

impl NotePipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        scorer: ConsensusScorer,
        refiner: Refiner,
        engine: AdmissionEngine,
        tags: TagSelector,
        store: Arc<dyn NoteStore>,
        refine: RefineConfig,
        config: PipelineConfig,
    ) -> Self {
        Self {
            scorer,
            refiner,
            engine,
            tags,
            store,
            heuristic: NoteEvaluator::new(),
            refine,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn NoteStore> {
        &self.store
    }

    async fn score_and_record(&self, draft: &Draft) -> Result<ConsensusResult, PipelineError> {
        let result = self.scorer.score(draft).await;
        self.store.record_consensus(&result)?;
        Ok(result)
    }

    /// Run the full flow for `draft_text` written by `writer_id` on `post`.
    pub async fn run(
        &self,
        post: &Post,
        writer_id: &str,
        draft_text: &str,
    ) -> Result<PipelineReport, PipelineError> {
        let root = Draft::new(writer_id, &post.id, draft_text);
        self.store.create_draft(&root)?;

        let mut drafts = vec![root.clone()];
        let mut consensus = vec![self.score_and_record(&root).await?];

        let mut rounds = 0;
        while rounds < self.refine.max_rounds {
            let (current, result) = match (drafts.last(), consensus.last()) {
                (Some(d), Some(r)) if r.status != StatusTier::LikelyHelpful => (d, r),
                _ => break,
            };
            let refinement = self.refiner.refine(current, result).await?;
            self.store.create_draft(&refinement.draft)?;
            let scored = self.score_and_record(&refinement.draft).await?;
            drafts.push(refinement.draft);
            consensus.push(scored);
            rounds += 1;
        }

        // Earliest draft wins ties.
        let mut best = 0;
        for (i, r) in consensus.iter().enumerate() {
            if r.aggregate > consensus[best].aggregate {
                best = i;
            }
        }
        let best_draft = drafts[best].clone();
        let best_aggregate = consensus[best].aggregate;

        let heuristic = HeuristicScore::new(best_draft.id, self.heuristic.evaluate(&best_draft.text));
        self.store.record_heuristic(&heuristic)?;

        let mut report = PipelineReport {
            post_id: post.id.clone(),
            root_draft_id: root.id,
            status: PipelineStatus::BelowThreshold,
            drafts,
            consensus,
            best_draft_id: best_draft.id,
            best_aggregate,
            heuristic,
            session: None,
            practice: Vec::new(),
            repairs: Vec::new(),
            tags: Vec::new(),
            exam: None,
            submission: None,
            final_text: best_draft.text.clone(),
        };

        if best_aggregate < self.config.submit_min_score {
            info!(
                draft_id = %best_draft.id,
                score = best_aggregate,
                "best draft below submission threshold"
            );
            return Ok(report);
        }

        let mut session = AdmissionSession::new(root.id);
        let result = self.admit(post, best_draft, &mut session, &mut report).await;
        report.session = Some(session);
        result?;

        info!(
            post_id = %post.id,
            status = %report.status,
            drafts = report.drafts.len(),
            "pipeline finished"
        );
        Ok(report)
    }

    /// Repair `candidate` for `reasons` and persist the result as a child.
    /// `None` when the repair changed nothing.
    async fn repair_candidate(
        &self,
        candidate: &Draft,
        reasons: &[FailureReason],
        report: &mut PipelineReport,
    ) -> Result<Option<Draft>, PipelineError> {
        let repaired = self.engine.repair(&candidate.text, reasons).await;
        let changed = repaired.changed();
        let text = repaired.text.clone();
        report.repairs.push(repaired);
        if !changed {
            warn!(
                draft_id = %candidate.id,
                reasons = ?reasons.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
                "repair left text unchanged"
            );
            return Ok(None);
        }

        let child = candidate.child(&text);
        self.store.create_draft(&child)?;
        report.drafts.push(child.clone());
        Ok(Some(child))
    }

    /// Practice with bounded repair, then tags and the exam. A rejected
    /// exam with content reasons goes back through repair and practice
    /// while the repair budget lasts.
    async fn admit(
        &self,
        post: &Post,
        mut candidate: Draft,
        session: &mut AdmissionSession,
        report: &mut PipelineReport,
    ) -> Result<(), PipelineError> {
        loop {
            session.transition(AdmissionPhase::Checking, "practice check")?;
            let outcome = self.engine.run_practice(&candidate, post).await;
            self.store.record_admission(&outcome)?;
            let passed = outcome.passed();
            let reasons = outcome.failure_reasons().to_vec();
            report.practice.push(outcome);
            report.final_text = candidate.text.clone();

            if !passed {
                let labels = reason_list(&reasons);
                session.transition(AdmissionPhase::Failed, &labels)?;
                if session.repair_rounds >= self.config.max_repair_rounds {
                    report.status = PipelineStatus::PracticeFailed;
                    return Ok(());
                }
                session.transition(AdmissionPhase::Repairing, &labels)?;
                match self.repair_candidate(&candidate, &reasons, report).await? {
                    Some(child) => {
                        candidate = child;
                        continue;
                    }
                    None => {
                        report.status = PipelineStatus::PracticeFailed;
                        return Ok(());
                    }
                }
            }
            session.transition(AdmissionPhase::Passed, "practice passed")?;

            report.tags = self.tags.select(&post.text, &candidate.text).await?;

            session.transition(AdmissionPhase::ExamSubmitting, "exam submission")?;
            let attempt = self
                .engine
                .run_exam(&candidate, &post.id, &report.tags)
                .await?;
            self.store.record_admission(&attempt.outcome)?;
            report.final_text = attempt.submission.info.text.clone();

            if let Some(record) = attempt.record() {
                session.transition(AdmissionPhase::Submitted, "exam passed")?;
                self.store.record_submission(&record)?;
                report.submission = Some(record);
                report.exam = Some(attempt.outcome);
                report.status = PipelineStatus::Submitted;
                return Ok(());
            }

            let reasons: Vec<FailureReason> = attempt
                .outcome
                .failure_reasons()
                .iter()
                .copied()
                .filter(|r| r.is_repairable())
                .collect();
            let labels = attempt.outcome.reason_labels().join(", ");
            session.transition(AdmissionPhase::Rejected, &labels)?;
            report.exam = Some(attempt.outcome);
            report.status = PipelineStatus::ExamRejected;

            if reasons.is_empty() || session.repair_rounds >= self.config.max_repair_rounds {
                return Ok(());
            }
            session.transition(AdmissionPhase::Repairing, &reason_list(&reasons))?;
            match self.repair_candidate(&candidate, &reasons, report).await? {
                Some(child) => candidate = child,
                None => return Ok(()),
            }
        }
    }
}

fn reason_list(reasons: &[FailureReason]) -> String {
    reasons.iter().map(|r| r.as_str()).collect::<Vec<_>>().join(", ")
}
