//! Admission engine: practice checks, exam submissions and repair.
//!
//! Every check returns a well-formed [`AdmissionOutcome`]. The only error
//! that escapes is a [`ContractViolation`] from the gateway, so a payload
//! known to be invalid is never sent.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{error, info, warn};

use super::outcome::{AdmissionMode, AdmissionOutcome, FailureReason, PracticePath, ScoreSource};
use super::repair::{RepairDispatcher, RepairReport};
use crate::config::{AdmissionThresholds, TimeoutConfig};
use crate::draft::{Draft, Post};
use crate::evaluator::NoteEvaluator;
use crate::gateway::{ContractViolation, SubmissionGateway, SubmissionRecord};
use crate::oracle::{complete_with_timeout, decode_oracle_json, LanguageOracle, OracleRequest};
use crate::platform::{
    evaluate_with_timeout, parse_admission_scores, parse_claim_opinion_score, AdmissionScores,
    NoteSubmission, PlatformEvaluator, CLAIM_OPINION, HARASSMENT_ABUSE, URL_VALIDITY,
};
use crate::prompts::PRACTICE_EVALUATOR_PROMPT;
use crate::tags::MisleadingTag;

/// Oracle-simulated practice score.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SimulatedScore {
    #[serde(rename = "claimOpinionScore")]
    claim_opinion_score: f64,
}

/// A gate fails unless the score is at least `min`; NaN always fails.
fn below(score: f64, min: f64) -> bool {
    !(score >= min)
}

/// One exam submission: the payload that was sent and what came back.
#[derive(Debug, Clone)]
pub struct ExamAttempt {
    pub submission: NoteSubmission,
    pub outcome: AdmissionOutcome,
}

impl ExamAttempt {
    /// Record of the submission, only when the exam passed.
    pub fn record(&self) -> Option<SubmissionRecord> {
        if !self.outcome.passed() {
            return None;
        }
        let response = self.outcome.raw_payload.clone().unwrap_or_default();
        Some(SubmissionRecord::submitted(
            self.outcome.draft_id,
            &self.submission,
            response,
        ))
    }
}

pub struct AdmissionEngine {
    gateway: SubmissionGateway,
    evaluator: Option<Arc<dyn PlatformEvaluator>>,
    oracle: Option<Arc<dyn LanguageOracle>>,
    heuristic: NoteEvaluator,
    repair: RepairDispatcher,
    thresholds: AdmissionThresholds,
    timeouts: TimeoutConfig,
    test_mode: bool,
}

impl AdmissionEngine {
    pub fn new(
        gateway: SubmissionGateway,
        thresholds: AdmissionThresholds,
        timeouts: TimeoutConfig,
    ) -> Self {
        let repair = RepairDispatcher::new(None, None, timeouts.oracle());
        Self {
            gateway,
            evaluator: None,
            oracle: None,
            heuristic: NoteEvaluator::new(),
            repair,
            thresholds,
            timeouts,
            test_mode: true,
        }
    }

    /// Authoritative practice evaluator.
    pub fn with_evaluator(mut self, evaluator: Arc<dyn PlatformEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Oracle used for the simulated practice fallback.
    pub fn with_oracle(mut self, oracle: Arc<dyn LanguageOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn with_repair(mut self, repair: RepairDispatcher) -> Self {
        self.repair = repair;
        self
    }

    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    pub fn gateway(&self) -> &SubmissionGateway {
        &self.gateway
    }

    /// Primary practice score: the platform when configured, else the
    /// local heuristic. `Err` carries the platform failure.
    async fn primary_score(
        &self,
        draft: &Draft,
        post: &Post,
    ) -> Result<(f64, ScoreSource, Option<serde_json::Value>), String> {
        match &self.evaluator {
            Some(evaluator) => {
                let response = evaluate_with_timeout(
                    evaluator.as_ref(),
                    &post.id,
                    &draft.text,
                    self.timeouts.platform(),
                )
                .await
                .map_err(|e| e.to_string())?;
                Ok((
                    parse_claim_opinion_score(&response),
                    ScoreSource::Platform,
                    Some(response),
                ))
            }
            None => {
                let heuristic = self.heuristic.evaluate(&draft.text);
                Ok((heuristic.claim_opinion_score, ScoreSource::Heuristic, None))
            }
        }
    }

    /// The single fallback attempt: ask the oracle to simulate the score.
    async fn simulated_score(&self, draft: &Draft, post: &Post) -> Result<f64, String> {
        let oracle = self
            .oracle
            .as_ref()
            .ok_or_else(|| "no oracle configured for fallback".to_string())?;
        let request = OracleRequest::new(
            PRACTICE_EVALUATOR_PROMPT,
            format!("Post: {}\nNote: {}", post.text, draft.text),
        );
        let reply = complete_with_timeout(oracle.as_ref(), &request, self.timeouts.oracle())
            .await
            .map_err(|e| e.to_string())?;
        let decoded: SimulatedScore = decode_oracle_json(&reply).map_err(|e| e.to_string())?;
        let score = decoded.claim_opinion_score;
        if !(0.0..=1.0).contains(&score) {
            return Err(format!("simulated score {score} outside [0, 1]"));
        }
        Ok(score)
    }

    /// Practice check: grade the draft without submitting it.
    pub async fn run_practice(&self, draft: &Draft, post: &Post) -> AdmissionOutcome {
        let (score, path, source, raw, trigger) = match self.primary_score(draft, post).await {
            Ok((score, source, raw)) => (score, PracticePath::Primary, source, raw, None),
            Err(primary_err) => {
                warn!(
                    draft_id = %draft.id,
                    error = %primary_err,
                    "practice evaluator failed; falling back to simulation"
                );
                match self.simulated_score(draft, post).await {
                    Ok(score) => (
                        score,
                        PracticePath::Fallback,
                        ScoreSource::Oracle,
                        None,
                        Some(primary_err),
                    ),
                    Err(fallback_err) => {
                        error!(
                            draft_id = %draft.id,
                            error = %fallback_err,
                            "practice fallback failed"
                        );
                        return AdmissionOutcome::new(
                            draft.id,
                            AdmissionMode::Practice,
                            vec![FailureReason::SystemError],
                            BTreeMap::new(),
                        )
                        .with_practice_path(PracticePath::SystemError, None)
                        .with_error(format!(
                            "API Error: {primary_err}. Simulation Error: {fallback_err}"
                        ));
                    }
                }
            }
        };

        let mut reasons = Vec::new();
        if below(score, self.thresholds.practice_claim_opinion_min) {
            reasons.push(FailureReason::ClaimOpinion);
        }
        let scores = BTreeMap::from([(CLAIM_OPINION.to_string(), score)]);

        let mut outcome = AdmissionOutcome::new(draft.id, AdmissionMode::Practice, reasons, scores)
            .with_practice_path(path, Some(source));
        if let Some(raw) = raw {
            outcome = outcome.with_raw_payload(raw);
        }
        if let Some(trigger) = trigger {
            outcome = outcome.with_error(trigger);
        }
        info!(
            draft_id = %draft.id,
            mode = %AdmissionMode::Practice,
            score,
            passed = outcome.passed(),
            reasons = ?outcome.reason_labels(),
            "practice check finished"
        );
        outcome
    }

    /// Failure reasons for parsed exam dimensions; gates are independent.
    pub fn exam_reasons(&self, scores: &AdmissionScores) -> Vec<FailureReason> {
        let t = &self.thresholds;
        let mut reasons = Vec::new();
        if below(scores.url_validity, t.exam_url_validity_min) {
            reasons.push(FailureReason::UrlValidity);
        }
        if below(scores.claim_opinion, t.exam_claim_opinion_min) {
            reasons.push(FailureReason::ClaimOpinion);
        }
        if below(scores.harassment_abuse, t.exam_harassment_abuse_min) {
            reasons.push(FailureReason::HarassmentAbuse);
        }
        reasons
    }

    /// Exam: build the payload through the gateway and submit it.
    pub async fn run_exam(
        &self,
        draft: &Draft,
        post_id: &str,
        tags: &[MisleadingTag],
    ) -> Result<ExamAttempt, ContractViolation> {
        let submission = self
            .gateway
            .build_submission(&draft.text, post_id, tags, self.test_mode)?;

        let outcome = match self.gateway.send(&submission).await {
            Ok(response) => {
                let parsed = parse_admission_scores(&response);
                let scores = BTreeMap::from([
                    (URL_VALIDITY.to_string(), parsed.url_validity),
                    (CLAIM_OPINION.to_string(), parsed.claim_opinion),
                    (HARASSMENT_ABUSE.to_string(), parsed.harassment_abuse),
                ]);
                AdmissionOutcome::new(draft.id, AdmissionMode::Exam, self.exam_reasons(&parsed), scores)
                    .with_raw_payload(response)
            }
            Err(e) => {
                error!(draft_id = %draft.id, post_id, error = %e, "exam submission failed");
                AdmissionOutcome::new(
                    draft.id,
                    AdmissionMode::Exam,
                    vec![FailureReason::ApiError],
                    BTreeMap::new(),
                )
                .with_error(e.to_string())
            }
        };

        info!(
            draft_id = %draft.id,
            mode = %AdmissionMode::Exam,
            passed = outcome.passed(),
            reasons = ?outcome.reason_labels(),
            "exam finished"
        );
        Ok(ExamAttempt {
            submission,
            outcome,
        })
    }

    /// Exam outcome only.
    pub async fn submit_final(
        &self,
        draft: &Draft,
        post_id: &str,
        tags: &[MisleadingTag],
    ) -> Result<AdmissionOutcome, ContractViolation> {
        Ok(self.run_exam(draft, post_id, tags).await?.outcome)
    }

    /// Run the repair steps the failure reasons call for.
    pub async fn repair(&self, text: &str, reasons: &[FailureReason]) -> RepairReport {
        self.repair.dispatch(text, reasons).await
    }
}
