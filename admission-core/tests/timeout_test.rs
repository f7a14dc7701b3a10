//! Stalled collaborators under paused time: every wait is bounded by the
//! configured timeouts.

mod common;

use std::sync::Arc;

use admission_core::admission::{
    FailureReason, PracticePath, RepairOutcome, RepairStep, ScoreSource,
};
use admission_core::oracle::{LanguageOracle, OracleError, OracleRequest};
use admission_core::platform::{
    NoteSubmission, PlatformError, PlatformEvaluator, PlatformSubmitter,
};
use admission_core::prompts::SOURCE_FINDER_PROMPT;
use admission_core::{ConsensusScorer, Draft, EngineConfig, MisleadingTag, Panel, Post};
use async_trait::async_trait;
use common::{critique, engine, transport, Call, MockSubmitter, ScriptedOracle};
use serde_json::Value;
use tokio::time::Instant;

/// Never answers requests matching `stall`; forwards the rest.
struct StallingOracle {
    inner: Arc<ScriptedOracle>,
    stall: fn(&OracleRequest) -> bool,
}

#[async_trait]
impl LanguageOracle for StallingOracle {
    fn model_id(&self) -> String {
        "stalling-oracle".to_string()
    }

    async fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
        if (self.stall)(request) {
            std::future::pending::<()>().await;
        }
        self.inner.complete(request).await
    }
}

struct StallingEvaluator;

#[async_trait]
impl PlatformEvaluator for StallingEvaluator {
    async fn evaluate_note(&self, _post_id: &str, _note_text: &str) -> Result<Value, PlatformError> {
        std::future::pending().await
    }
}

struct StallingSubmitter;

#[async_trait]
impl PlatformSubmitter for StallingSubmitter {
    async fn submit_note(&self, _submission: &NoteSubmission) -> Result<Value, PlatformError> {
        std::future::pending().await
    }
}

fn idle_submitter() -> MockSubmitter {
    let mut submitter = MockSubmitter::new();
    submitter.expect_submit_note().times(0);
    submitter
}

#[tokio::test(start_paused = true)]
async fn test_stalled_persona_degrades_to_sentinel() {
    let config = EngineConfig::default();
    let oracle = Arc::new(StallingOracle {
        inner: ScriptedOracle::new(|call, _| match call {
            Call::Critic => Ok(critique(0.8, "Sourced.", false)),
            other => Err(transport(&format!("unexpected {other:?}"))),
        }),
        stall: |request| request.user.contains("Persona Name: The Skeptic"),
    });
    let scorer = ConsensusScorer::new(
        &Panel::default(),
        oracle as Arc<dyn LanguageOracle>,
        config.consensus.clone(),
        &config.timeouts,
    );
    let draft = Draft::new("w", "42", "The bridge opened in 1998 https://example.gov/bridge");

    let started = Instant::now();
    let result = scorer.score(&draft).await;

    assert!(started.elapsed() >= config.timeouts.oracle());
    assert_eq!(result.feedback.len(), 5);
    assert_eq!(result.degraded_count(), 1);
    let skeptic = result
        .feedback
        .iter()
        .find(|f| f.persona_id == "skeptic")
        .unwrap();
    assert!(skeptic.is_sentinel());
    assert!(result
        .feedback
        .iter()
        .filter(|f| f.persona_id != "skeptic")
        .all(|f| (f.score - 0.8).abs() < 1e-9));
    assert!(result.aggregate < 0.8);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_evaluator_falls_back_to_simulation() {
    let config = EngineConfig::default();
    let oracle = ScriptedOracle::new(|call, _| match call {
        Call::PracticeEvaluator => Ok(r#"{"claimOpinionScore": 0.75}"#.to_string()),
        other => Err(transport(&format!("unexpected {other:?}"))),
    });
    let engine = engine(oracle.clone(), None, idle_submitter(), &config)
        .with_evaluator(Arc::new(StallingEvaluator));
    let draft = Draft::new("w", "42", "The bridge opened in 1998 https://example.gov/bridge");

    let started = Instant::now();
    let outcome = engine.run_practice(&draft, &Post::new("42", "Never built")).await;

    assert!(started.elapsed() >= config.timeouts.platform());
    assert!(outcome.passed());
    assert_eq!(outcome.practice_path, Some(PracticePath::Fallback));
    assert_eq!(outcome.score_source, Some(ScoreSource::Oracle));
    assert!(outcome.error.as_deref().unwrap().contains("timed out"));
    assert_eq!(oracle.count(Call::PracticeEvaluator), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_evaluator_and_oracle_is_system_error() {
    let config = EngineConfig::default();
    let oracle = Arc::new(StallingOracle {
        inner: ScriptedOracle::new(|call, _| Err(transport(&format!("unexpected {call:?}")))),
        stall: |_| true,
    });
    let engine = common::engine_with_oracle(oracle, idle_submitter(), &config)
        .with_evaluator(Arc::new(StallingEvaluator));
    let draft = Draft::new("w", "42", "The bridge opened in 1998 https://example.gov/bridge");

    let outcome = engine.run_practice(&draft, &Post::new("42", "Never built")).await;

    assert!(!outcome.passed());
    assert_eq!(outcome.failure_reasons(), &[FailureReason::SystemError]);
    assert_eq!(outcome.practice_path, Some(PracticePath::SystemError));
    let error = outcome.error.unwrap();
    assert!(error.contains("platform call timed out"));
    assert!(error.contains("oracle call timed out"));
}

#[tokio::test(start_paused = true)]
async fn test_stalled_submission_is_api_error() {
    let config = EngineConfig::default();
    let engine = common::engine_with_oracle(
        ScriptedOracle::new(|call, _| Err(transport(&format!("unexpected {call:?}")))),
        StallingSubmitter,
        &config,
    );
    let draft = Draft::new("w", "42", "The bridge opened in 1998 https://example.gov/bridge");

    let started = Instant::now();
    let attempt = engine
        .run_exam(&draft, "42", &[MisleadingTag::FactualError])
        .await
        .unwrap();

    assert!(started.elapsed() >= config.timeouts.platform());
    assert_eq!(attempt.outcome.failure_reasons(), &[FailureReason::ApiError]);
    assert!(attempt.outcome.error.as_deref().unwrap().contains("timed out"));
    assert!(attempt.record().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_stalled_source_step_still_runs_content_step() {
    const NOTE: &str = "I think the bridge opened in 1998 https://example.gov/bridge";
    const REWRITE: &str = "The bridge opened in 1998 https://example.gov/bridge";
    let config = EngineConfig::default();
    let oracle = Arc::new(StallingOracle {
        inner: ScriptedOracle::new(|call, _| match call {
            Call::ContentEditor => Ok(serde_json::json!({"rewritten_note": REWRITE}).to_string()),
            other => Err(transport(&format!("unexpected {other:?}"))),
        }),
        stall: |request| request.system == SOURCE_FINDER_PROMPT,
    });
    let engine = common::engine_with_oracle(oracle, idle_submitter(), &config);

    let report = engine
        .repair(NOTE, &[FailureReason::UrlValidity, FailureReason::ClaimOpinion])
        .await;

    assert_eq!(report.text, REWRITE);
    assert_eq!(report.steps.len(), 2);
    match &report.steps[0] {
        (RepairStep::Url, RepairOutcome::Unchanged(why)) => assert!(why.contains("timed out")),
        other => panic!("unexpected url step {other:?}"),
    }
    assert_eq!(
        report.steps[1],
        (RepairStep::Content, RepairOutcome::Repaired(REWRITE.into()))
    );
}
