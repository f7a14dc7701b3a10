//! Draft history persistence.
//!
//! The core only needs create / read-by-id / list-children plus append-only
//! result records. [`InMemoryNoteStore`] keeps everything behind one mutex
//! that is never held across an `.await`, and can checkpoint itself to a
//! versioned JSON snapshot.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::admission::AdmissionOutcome;
use crate::draft::Draft;
use crate::evaluator::HeuristicScore;
use crate::gateway::SubmissionRecord;
use crate::panel::ConsensusResult;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("draft {0} already exists")]
    DuplicateDraft(Uuid),

    #[error("draft {0} not found")]
    UnknownDraft(Uuid),

    #[error("draft {draft} references missing parent {parent}")]
    DanglingParent { draft: Uuid, parent: Uuid },

    #[error("parent chain of draft {0} forms a cycle")]
    Cycle(Uuid),

    #[error("snapshot version {found} is newer than supported {expected}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("snapshot serialize failed: {0}")]
    Serialize(String),

    #[error("snapshot deserialize failed: {0}")]
    Deserialize(String),

    #[error("snapshot io failed: {0}")]
    Io(String),
}

/// Persistence seam for drafts and the results attached to them.
pub trait NoteStore: Send + Sync {
    /// Insert a draft. A parent, if any, must already be stored.
    fn create_draft(&self, draft: &Draft) -> Result<(), StoreError>;

    fn get_draft(&self, id: Uuid) -> Option<Draft>;

    /// Direct children of `id`, in insertion order.
    fn children(&self, id: Uuid) -> Vec<Draft>;

    fn record_consensus(&self, result: &ConsensusResult) -> Result<(), StoreError>;

    fn consensus_for(&self, draft_id: Uuid) -> Vec<ConsensusResult>;

    fn record_admission(&self, outcome: &AdmissionOutcome) -> Result<(), StoreError>;

    fn admissions_for(&self, draft_id: Uuid) -> Vec<AdmissionOutcome>;

    fn record_submission(&self, record: &SubmissionRecord) -> Result<(), StoreError>;

    fn submissions_for(&self, draft_id: Uuid) -> Vec<SubmissionRecord>;

    fn record_heuristic(&self, score: &HeuristicScore) -> Result<(), StoreError>;

    fn heuristic_for(&self, draft_id: Uuid) -> Option<HeuristicScore>;

    /// `root` and all its descendants, breadth first.
    fn lineage(&self, root: Uuid) -> Vec<Draft> {
        let Some(root_draft) = self.get_draft(root) else {
            return Vec::new();
        };
        let mut out = vec![root_draft];
        let mut i = 0;
        while i < out.len() {
            let kids = self.children(out[i].id);
            out.extend(kids);
            i += 1;
        }
        out
    }
}

/// Serialized form of an [`InMemoryNoteStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: u32,
    pub drafts: Vec<Draft>,
    pub consensus: Vec<ConsensusResult>,
    pub admissions: Vec<AdmissionOutcome>,
    pub submissions: Vec<SubmissionRecord>,
    pub heuristics: Vec<HeuristicScore>,
}

impl StoreSnapshot {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn to_json(&self) -> Result<String, StoreError> {
        serde_json::to_string_pretty(self).map_err(|e| StoreError::Serialize(e.to_string()))
    }

    /// Parse and validate a snapshot.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| StoreError::Deserialize(e.to_string()))?;
        if snapshot.version > Self::CURRENT_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: Self::CURRENT_VERSION,
                found: snapshot.version,
            });
        }
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Every parent reference resolves and no parent chain loops.
    pub fn validate(&self) -> Result<(), StoreError> {
        let parents: HashMap<Uuid, Option<Uuid>> =
            self.drafts.iter().map(|d| (d.id, d.parent_id)).collect();
        if parents.len() != self.drafts.len() {
            let mut seen = HashSet::new();
            if let Some(dup) = self.drafts.iter().find(|d| !seen.insert(d.id)) {
                return Err(StoreError::DuplicateDraft(dup.id));
            }
        }

        for draft in &self.drafts {
            let mut visited = HashSet::from([draft.id]);
            let mut cursor = draft.parent_id;
            while let Some(parent) = cursor {
                let Some(next) = parents.get(&parent) else {
                    return Err(StoreError::DanglingParent {
                        draft: draft.id,
                        parent,
                    });
                };
                if !visited.insert(parent) {
                    return Err(StoreError::Cycle(draft.id));
                }
                cursor = *next;
            }
        }

        let known: HashSet<Uuid> = parents.keys().copied().collect();
        let record_ids = self
            .consensus
            .iter()
            .map(|r| r.draft_id)
            .chain(self.admissions.iter().map(|r| r.draft_id))
            .chain(self.submissions.iter().map(|r| r.draft_id))
            .chain(self.heuristics.iter().map(|r| r.draft_id));
        for id in record_ids {
            if !known.contains(&id) {
                return Err(StoreError::UnknownDraft(id));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Inner {
    drafts: HashMap<Uuid, Draft>,
    order: Vec<Uuid>,
    consensus: Vec<ConsensusResult>,
    admissions: Vec<AdmissionOutcome>,
    submissions: Vec<SubmissionRecord>,
    heuristics: Vec<HeuristicScore>,
}

impl Inner {
    fn require(&self, id: Uuid) -> Result<(), StoreError> {
        if self.drafts.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::UnknownDraft(id))
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryNoteStore {
    inner: Mutex<Inner>,
}

impl InMemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn draft_count(&self) -> usize {
        self.lock().order.len()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let inner = self.lock();
        StoreSnapshot {
            version: StoreSnapshot::CURRENT_VERSION,
            drafts: inner
                .order
                .iter()
                .filter_map(|id| inner.drafts.get(id).cloned())
                .collect(),
            consensus: inner.consensus.clone(),
            admissions: inner.admissions.clone(),
            submissions: inner.submissions.clone(),
            heuristics: inner.heuristics.clone(),
        }
    }

    /// Rebuild a store from a snapshot, validating it first.
    pub fn restore(snapshot: StoreSnapshot) -> Result<Self, StoreError> {
        if snapshot.version > StoreSnapshot::CURRENT_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: StoreSnapshot::CURRENT_VERSION,
                found: snapshot.version,
            });
        }
        snapshot.validate()?;
        let order = snapshot.drafts.iter().map(|d| d.id).collect();
        let drafts = snapshot.drafts.into_iter().map(|d| (d.id, d)).collect();
        Ok(Self {
            inner: Mutex::new(Inner {
                drafts,
                order,
                consensus: snapshot.consensus,
                admissions: snapshot.admissions,
                submissions: snapshot.submissions,
                heuristics: snapshot.heuristics,
            }),
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), StoreError> {
        let json = self.snapshot().to_json()?;
        std::fs::write(path, json).map_err(|e| StoreError::Io(e.to_string()))
    }

    pub fn load_from(path: &Path) -> Result<Self, StoreError> {
        let json = std::fs::read_to_string(path).map_err(|e| StoreError::Io(e.to_string()))?;
        Self::restore(StoreSnapshot::from_json(&json)?)
    }
}

impl NoteStore for InMemoryNoteStore {
    fn create_draft(&self, draft: &Draft) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.drafts.contains_key(&draft.id) {
            return Err(StoreError::DuplicateDraft(draft.id));
        }
        if let Some(parent) = draft.parent_id {
            if !inner.drafts.contains_key(&parent) {
                return Err(StoreError::DanglingParent {
                    draft: draft.id,
                    parent,
                });
            }
        }
        inner.order.push(draft.id);
        inner.drafts.insert(draft.id, draft.clone());
        Ok(())
    }

    fn get_draft(&self, id: Uuid) -> Option<Draft> {
        self.lock().drafts.get(&id).cloned()
    }

    fn children(&self, id: Uuid) -> Vec<Draft> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter_map(|cid| inner.drafts.get(cid))
            .filter(|d| d.parent_id == Some(id))
            .cloned()
            .collect()
    }

    fn record_consensus(&self, result: &ConsensusResult) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.require(result.draft_id)?;
        inner.consensus.push(result.clone());
        Ok(())
    }

    fn consensus_for(&self, draft_id: Uuid) -> Vec<ConsensusResult> {
        self.lock()
            .consensus
            .iter()
            .filter(|r| r.draft_id == draft_id)
            .cloned()
            .collect()
    }

    fn record_admission(&self, outcome: &AdmissionOutcome) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.require(outcome.draft_id)?;
        inner.admissions.push(outcome.clone());
        Ok(())
    }

    fn admissions_for(&self, draft_id: Uuid) -> Vec<AdmissionOutcome> {
        self.lock()
            .admissions
            .iter()
            .filter(|r| r.draft_id == draft_id)
            .cloned()
            .collect()
    }

    fn record_submission(&self, record: &SubmissionRecord) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.require(record.draft_id)?;
        inner.submissions.push(record.clone());
        Ok(())
    }

    fn submissions_for(&self, draft_id: Uuid) -> Vec<SubmissionRecord> {
        self.lock()
            .submissions
            .iter()
            .filter(|r| r.draft_id == draft_id)
            .cloned()
            .collect()
    }

    fn record_heuristic(&self, score: &HeuristicScore) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.require(score.draft_id)?;
        inner.heuristics.push(score.clone());
        Ok(())
    }

    fn heuristic_for(&self, draft_id: Uuid) -> Option<HeuristicScore> {
        self.lock()
            .heuristics
            .iter()
            .rev()
            .find(|r| r.draft_id == draft_id)
            .cloned()
    }
}
