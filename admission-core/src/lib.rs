//! Admission & Consensus Engine for fact-check notes.
//!
//! This library provides:
//! - A simulated reviewer panel: persona critiques, variance-penalised
//!   consensus, and refinement against the harshest critique
//! - A two-mode admission engine (practice / exam) with a single simulated
//!   fallback and failure-keyed repair
//! - Strict wire-contract enforcement before anything reaches the platform
//!
//! # Components
//!
//! - [`panel`]: `PersonaCritic`, `ConsensusScorer`, `Refiner`
//! - [`evaluator`]: `NoteEvaluator`, the network-free heuristic scorer
//! - [`admission`]: `AdmissionEngine`, its state machine and repair dispatch
//! - [`gateway`]: `SubmissionGateway`, normalisation and validation
//! - [`tags`]: `TagSelector` over the closed misleading-tag vocabulary
//! - [`pipeline`]: `NotePipeline`, the end-to-end flow
//! - [`store`]: persistence seam plus an in-memory store with snapshots
//!
//! All network collaborators are `async_trait` seams ([`oracle::LanguageOracle`],
//! [`platform::PlatformEvaluator`], [`platform::PlatformSubmitter`], ...);
//! concrete transports live in the `note-agents` crate.

#![allow(clippy::uninlined_format_args)]

pub mod admission;
pub mod config;
pub mod draft;
pub mod evaluator;
pub mod gateway;
pub mod oracle;
pub mod panel;
pub mod pipeline;
pub mod platform;
pub mod prompts;
pub mod store;
pub mod tags;
pub mod urls;

pub use admission::{
    AdmissionEngine, AdmissionMode, AdmissionOutcome, AdmissionPhase, AdmissionSession,
    ContentRewriter, ExamAttempt, FailureReason, OracleContentRewriter, OracleSourceFinder,
    PracticePath, RepairDispatcher, RepairOutcome, ScoreSource, SourceFinder, TransitionError,
    UrlProbe,
};
pub use config::EngineConfig;
pub use draft::{Draft, DraftStage, Post};
pub use evaluator::{EvaluationResult, HeuristicScore, NoteEvaluator};
pub use gateway::{ContractViolation, SubmissionGateway, SubmissionRecord, SubmissionStatus};
pub use oracle::{DecodeError, LanguageOracle, OracleError, OracleRequest};
pub use panel::{
    ConsensusResult, ConsensusScorer, Panel, PersonaCritic, PersonaFeedback, PersonaSpec,
    Refiner, StatusTier,
};
pub use pipeline::{NotePipeline, PipelineError, PipelineReport, PipelineStatus};
pub use platform::{
    AdmissionScores, Classification, NoteSubmission, PlatformError, PlatformEvaluator,
    PlatformSubmitter,
};
pub use store::{InMemoryNoteStore, NoteStore, StoreError, StoreSnapshot};
pub use tags::{MisleadingTag, TagError, TagSelector};
