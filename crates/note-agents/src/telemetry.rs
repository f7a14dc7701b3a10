//! Structured run telemetry.
//!
//! Each pipeline run appends one JSON line to `.note-telemetry.jsonl`
//! (path configurable). Appending never fails a run; problems are logged.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use admission_core::admission::{AdmissionMode, AdmissionPhase};
use admission_core::{
    DraftStage, PipelineReport, PipelineStatus, PracticePath, StatusTier, SubmissionStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// Install the global `tracing` subscriber, honouring `RUST_LOG`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// Bump when adding/removing/renaming fields.
pub const RUN_SCHEMA_VERSION: u8 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSummary {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub stage: DraftStage,
    pub aggregate: Option<f64>,
    pub tier: Option<StatusTier>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionSummary {
    pub draft_id: Uuid,
    pub mode: AdmissionMode,
    pub passed: bool,
    pub reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub practice_path: Option<PracticePath>,
}

/// One line of the run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub schema_version: u8,
    pub timestamp: DateTime<Utc>,
    pub post_id: String,
    pub root_draft_id: Uuid,
    pub status: PipelineStatus,
    pub best_draft_id: Uuid,
    pub best_aggregate: f64,
    pub drafts: Vec<DraftSummary>,
    pub admissions: Vec<AdmissionSummary>,
    pub repair_rounds: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_phase: Option<AdmissionPhase>,
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_status: Option<SubmissionStatus>,
}

impl RunRecord {
    pub fn from_report(report: &PipelineReport) -> Self {
        let drafts = report
            .drafts
            .iter()
            .map(|d| {
                let consensus = report.consensus.iter().find(|c| c.draft_id == d.id);
                DraftSummary {
                    id: d.id,
                    parent_id: d.parent_id,
                    stage: d.stage,
                    aggregate: consensus.map(|c| c.aggregate),
                    tier: consensus.map(|c| c.status),
                }
            })
            .collect();

        let admissions = report
            .practice
            .iter()
            .chain(report.exam.iter())
            .map(|o| AdmissionSummary {
                draft_id: o.draft_id,
                mode: o.mode,
                passed: o.passed(),
                reasons: o.reason_labels().into_iter().map(str::to_string).collect(),
                practice_path: o.practice_path,
            })
            .collect();

        Self {
            schema_version: RUN_SCHEMA_VERSION,
            timestamp: Utc::now(),
            post_id: report.post_id.clone(),
            root_draft_id: report.root_draft_id,
            status: report.status,
            best_draft_id: report.best_draft_id,
            best_aggregate: report.best_aggregate,
            drafts,
            admissions,
            repair_rounds: report.session.as_ref().map_or(0, |s| s.repair_rounds),
            final_phase: report.session.as_ref().map(|s| s.phase),
            tags: report.tags.iter().map(|t| t.as_str().to_string()).collect(),
            submission_status: report.submission.as_ref().map(|s| s.status),
        }
    }
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("run log io at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("run record serialize: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("run log line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Serialize `value` as one line and append it to `path`, creating the file.
fn append_line<T: Serialize>(value: &T, path: &Path) -> Result<(), TelemetryError> {
    let io_err = |source| TelemetryError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut line = serde_json::to_vec(value).map_err(TelemetryError::Serialize)?;
    line.push(b'\n');
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| file.write_all(&line))
        .map_err(io_err)
}

/// Append `record` to the run log. Failures are logged, never returned.
pub fn append_run(record: &RunRecord, path: &Path) {
    match append_line(record, path) {
        Ok(()) => info!(path = %path.display(), post_id = %record.post_id, "run logged"),
        Err(e) => warn!(post_id = %record.post_id, "run not logged: {e}"),
    }
}

/// Reads back a run log.
pub struct TelemetryReader {
    runs: Vec<RunRecord>,
}

impl TelemetryReader {
    /// Parse every non-blank line. The first bad line fails the read.
    pub fn read_from_file(path: &Path) -> Result<Self, TelemetryError> {
        let text = std::fs::read_to_string(path).map_err(|source| TelemetryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let runs = text
            .lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty())
            .map(|(i, l)| {
                serde_json::from_str(l).map_err(|source| TelemetryError::Json { line: i + 1, source })
            })
            .collect::<Result<Vec<RunRecord>, _>>()?;
        Ok(Self { runs })
    }

    pub fn runs(&self) -> &[RunRecord] {
        &self.runs
    }

    /// Share of runs that ended in a submission.
    pub fn submit_rate(&self) -> f64 {
        if self.runs.is_empty() {
            return 0.0;
        }
        let submitted = self
            .runs
            .iter()
            .filter(|r| r.status == PipelineStatus::Submitted)
            .count();
        submitted as f64 / self.runs.len() as f64
    }
}
