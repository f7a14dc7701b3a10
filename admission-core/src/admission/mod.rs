//! Admission: practice/exam checks, their state machine, and repair.
//!
//! ```text
//! Idle ─► Checking ─┬─► Passed ─► ExamSubmitting ─┬─► Submitted
//!           ▲       └─► Failed ─┐                 └─► Rejected ─┐
//!           └──── Repairing ◄───┴───────────────────────────────┘
//! ```

pub mod engine;
pub mod outcome;
pub mod repair;
pub mod state;

pub use engine::{AdmissionEngine, ExamAttempt};
pub use outcome::{AdmissionMode, AdmissionOutcome, FailureReason, PracticePath, ScoreSource};
pub use repair::{
    apply_source, reason_explanation, ContentRewriter, OracleContentRewriter,
    OracleSourceFinder, RepairDispatcher, RepairError, RepairOutcome, RepairReport, RepairStep,
    SourceFinder, UrlProbe,
};
pub use state::{AdmissionPhase, AdmissionSession, AdmissionTransition, TransitionError};
