//! Shared deterministic doubles for integration tests (no network).

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use admission_core::admission::{OracleContentRewriter, OracleSourceFinder, RepairDispatcher};
use admission_core::oracle::{LanguageOracle, OracleError, OracleRequest};
use admission_core::platform::{NoteSubmission, PlatformError, PlatformEvaluator, PlatformSubmitter};
use admission_core::prompts::{
    CONTENT_EDITOR_PROMPT, CRITIC_SYSTEM_PROMPT, PRACTICE_EVALUATOR_PROMPT, REFINER_SYSTEM_PROMPT,
    SOURCE_FINDER_PROMPT,
};
use admission_core::{
    AdmissionEngine, ConsensusScorer, EngineConfig, InMemoryNoteStore, MisleadingTag,
    NotePipeline, Panel, Refiner, SubmissionGateway, TagSelector,
};
use async_trait::async_trait;
use mockall::mock;
use serde_json::Value;

mock! {
    pub Evaluator {}

    #[async_trait]
    impl PlatformEvaluator for Evaluator {
        async fn evaluate_note(&self, post_id: &str, note_text: &str) -> Result<Value, PlatformError>;
    }
}

mock! {
    pub Submitter {}

    #[async_trait]
    impl PlatformSubmitter for Submitter {
        async fn submit_note(&self, submission: &NoteSubmission) -> Result<Value, PlatformError>;
    }
}

/// Which prompt a request was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Critic,
    Refiner,
    PracticeEvaluator,
    SourceFinder,
    ContentEditor,
    TagSelector,
}

impl Call {
    pub fn of(request: &OracleRequest) -> Self {
        match request.system.as_str() {
            s if s == CRITIC_SYSTEM_PROMPT => Self::Critic,
            s if s == REFINER_SYSTEM_PROMPT => Self::Refiner,
            s if s == PRACTICE_EVALUATOR_PROMPT => Self::PracticeEvaluator,
            s if s == SOURCE_FINDER_PROMPT => Self::SourceFinder,
            s if s == CONTENT_EDITOR_PROMPT => Self::ContentEditor,
            _ => Self::TagSelector,
        }
    }
}

type Handler = dyn Fn(Call, &OracleRequest) -> Result<String, OracleError> + Send + Sync;

/// Oracle whose replies are computed from the request by a closure.
pub struct ScriptedOracle {
    handler: Box<Handler>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedOracle {
    pub fn new(
        handler: impl Fn(Call, &OracleRequest) -> Result<String, OracleError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == call).count()
    }
}

#[async_trait]
impl LanguageOracle for ScriptedOracle {
    fn model_id(&self) -> String {
        "scripted-oracle".to_string()
    }

    async fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
        let call = Call::of(request);
        self.calls.lock().unwrap().push(call);
        (self.handler)(call, request)
    }
}

pub fn critique(score: f64, rationale: &str, missing_context: bool) -> String {
    serde_json::json!({
        "score": score,
        "rationale": rationale,
        "missing_context": missing_context,
        "strengths": [],
        "weaknesses": ["No evidence provided"],
    })
    .to_string()
}

pub fn transport(msg: &str) -> OracleError {
    OracleError::Transport(msg.to_string())
}

/// The draft text inside a critic request.
pub fn draft_in(request: &OracleRequest) -> &str {
    request
        .user
        .split("Draft Note: ")
        .nth(1)
        .unwrap_or_default()
}

pub fn engine(
    oracle: Arc<ScriptedOracle>,
    evaluator: Option<MockEvaluator>,
    submitter: MockSubmitter,
    config: &EngineConfig,
) -> AdmissionEngine {
    let engine = engine_with_oracle(oracle, submitter, config);
    match evaluator {
        Some(evaluator) => engine.with_evaluator(Arc::new(evaluator)),
        None => engine,
    }
}

/// Engine over any oracle, with oracle-backed repair and no evaluator.
pub fn engine_with_oracle(
    oracle: Arc<dyn LanguageOracle>,
    submitter: impl PlatformSubmitter + 'static,
    config: &EngineConfig,
) -> AdmissionEngine {
    let t = config.timeouts.oracle();
    let gateway = SubmissionGateway::new(
        Arc::new(submitter),
        config.submission.clone(),
        MisleadingTag::MissingImportantContext,
        config.timeouts.platform(),
    );
    let repair = RepairDispatcher::new(
        Some(Arc::new(OracleSourceFinder::new(oracle.clone(), t))),
        Some(Arc::new(OracleContentRewriter::new(oracle.clone(), t))),
        t,
    );
    AdmissionEngine::new(gateway, config.admission.clone(), config.timeouts.clone())
        .with_oracle(oracle)
        .with_repair(repair)
}

pub fn pipeline(
    oracle: Arc<ScriptedOracle>,
    evaluator: MockEvaluator,
    submitter: MockSubmitter,
    store: Arc<InMemoryNoteStore>,
) -> NotePipeline {
    let config = EngineConfig::default();
    let dyn_oracle: Arc<dyn LanguageOracle> = oracle.clone();
    let scorer = ConsensusScorer::new(
        &Panel::default(),
        dyn_oracle.clone(),
        config.consensus.clone(),
        &config.timeouts,
    );
    let refiner = Refiner::new(dyn_oracle.clone(), config.timeouts.oracle());
    let tags = TagSelector::new(
        Some(dyn_oracle),
        config.tags.fallback,
        config.timeouts.oracle(),
    );
    NotePipeline::new(
        scorer,
        refiner,
        engine(oracle, Some(evaluator), submitter, &config),
        tags,
        store,
        config.refine.clone(),
        config.pipeline.clone(),
    )
}
