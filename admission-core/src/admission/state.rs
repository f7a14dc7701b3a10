//! Admission state machine: phases, transitions, and session tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Phase of one draft lineage's admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdmissionPhase {
    /// Nothing checked yet.
    Idle,
    /// Practice check in flight.
    Checking,
    /// Practice check passed.
    Passed,
    /// Practice check failed; only repair leads back out.
    Failed,
    /// Text is being repaired before another check.
    Repairing,
    /// Test-mode submission in flight.
    ExamSubmitting,
    /// Exam passed; terminal.
    Submitted,
    /// Exam rejected.
    Rejected,
}

impl AdmissionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Submitted)
    }

    /// Valid transitions from this phase.
    pub fn valid_transitions(self) -> &'static [AdmissionPhase] {
        match self {
            Self::Idle => &[Self::Checking, Self::ExamSubmitting],
            Self::Checking => &[Self::Passed, Self::Failed],
            Self::Passed => &[Self::ExamSubmitting],
            Self::Failed => &[Self::Repairing],
            Self::Repairing => &[Self::Checking],
            Self::ExamSubmitting => &[Self::Submitted, Self::Rejected],
            Self::Rejected => &[Self::Repairing],
            Self::Submitted => &[],
        }
    }
}

impl std::fmt::Display for AdmissionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Checking => write!(f, "checking"),
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Repairing => write!(f, "repairing"),
            Self::ExamSubmitting => write!(f, "exam_submitting"),
            Self::Submitted => write!(f, "submitted"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// A phase transition record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionTransition {
    pub from: AdmissionPhase,
    pub to: AdmissionPhase,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

/// Error for invalid state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: AdmissionPhase,
    pub to: AdmissionPhase,
    pub reason: String,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid transition {} → {}: {}",
            self.from, self.to, self.reason
        )
    }
}

impl std::error::Error for TransitionError {}

/// Admission history for one draft lineage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionSession {
    pub id: Uuid,
    /// Root draft of the lineage.
    pub root_draft_id: Uuid,
    pub phase: AdmissionPhase,
    /// Number of times the lineage entered `Repairing`.
    pub repair_rounds: u32,
    pub transitions: Vec<AdmissionTransition>,
    pub created_at: DateTime<Utc>,
}

impl AdmissionSession {
    pub fn new(root_draft_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            root_draft_id,
            phase: AdmissionPhase::Idle,
            repair_rounds: 0,
            transitions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Transition to a new phase with a reason.
    pub fn transition(&mut self, to: AdmissionPhase, reason: &str) -> Result<(), TransitionError> {
        if !self.phase.valid_transitions().contains(&to) {
            return Err(TransitionError {
                from: self.phase,
                to,
                reason: format!(
                    "not a valid transition (allowed: {:?})",
                    self.phase.valid_transitions()
                ),
            });
        }

        self.transitions.push(AdmissionTransition {
            from: self.phase,
            to,
            timestamp: Utc::now(),
            reason: reason.to_string(),
        });
        self.phase = to;

        if to == AdmissionPhase::Repairing {
            self.repair_rounds += 1;
        }
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Phases visited so far, starting with `Idle`.
    pub fn path(&self) -> Vec<AdmissionPhase> {
        let mut path = vec![AdmissionPhase::Idle];
        path.extend(self.transitions.iter().map(|t| t.to));
        path
    }

    pub fn status_line(&self) -> String {
        format!(
            "[{}] {} (repairs: {}, transitions: {})",
            self.root_draft_id,
            self.phase,
            self.repair_rounds,
            self.transitions.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut s = AdmissionSession::new(Uuid::new_v4());
        s.transition(AdmissionPhase::Checking, "practice").unwrap();
        s.transition(AdmissionPhase::Passed, "score 0.8").unwrap();
        s.transition(AdmissionPhase::ExamSubmitting, "exam").unwrap();
        s.transition(AdmissionPhase::Submitted, "all gates").unwrap();
        assert!(s.is_complete());
        assert_eq!(s.path().len(), 5);
        assert!(s.transition(AdmissionPhase::Checking, "again").is_err());
    }

    #[test]
    fn test_failed_cannot_submit() {
        let mut s = AdmissionSession::new(Uuid::new_v4());
        s.transition(AdmissionPhase::Checking, "practice").unwrap();
        s.transition(AdmissionPhase::Failed, "ClaimOpinion").unwrap();

        let err = s
            .transition(AdmissionPhase::ExamSubmitting, "skip")
            .unwrap_err();
        assert_eq!(err.from, AdmissionPhase::Failed);
        assert!(s.transition(AdmissionPhase::Submitted, "skip").is_err());
        assert!(s.transition(AdmissionPhase::Checking, "skip").is_err());
        assert_eq!(s.phase, AdmissionPhase::Failed);
    }

    #[test]
    fn test_repair_reenters_checking() {
        let mut s = AdmissionSession::new(Uuid::new_v4());
        s.transition(AdmissionPhase::Checking, "practice").unwrap();
        s.transition(AdmissionPhase::Failed, "UrlValidity").unwrap();
        s.transition(AdmissionPhase::Repairing, "url repair").unwrap();
        s.transition(AdmissionPhase::Checking, "re-check").unwrap();
        s.transition(AdmissionPhase::Passed, "ok").unwrap();
        assert_eq!(s.repair_rounds, 1);
    }

    #[test]
    fn test_rejected_exam_goes_to_repair() {
        let mut s = AdmissionSession::new(Uuid::new_v4());
        s.transition(AdmissionPhase::ExamSubmitting, "direct").unwrap();
        s.transition(AdmissionPhase::Rejected, "UrlValidity").unwrap();
        assert!(s.transition(AdmissionPhase::Submitted, "no").is_err());
        s.transition(AdmissionPhase::Repairing, "fix").unwrap();
        assert!(!s.is_complete());
    }

    #[test]
    fn test_transition_error_display() {
        let err = TransitionError {
            from: AdmissionPhase::Failed,
            to: AdmissionPhase::Submitted,
            reason: "nope".into(),
        };
        assert_eq!(err.to_string(), "invalid transition failed → submitted: nope");
    }
}
