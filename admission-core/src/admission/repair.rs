//! Failure-keyed repair dispatch.
//!
//! URL repair always runs before content repair. Every step is best-effort:
//! a failing collaborator yields [`RepairOutcome::Unchanged`] and the text
//! carries on untouched.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::admission::outcome::FailureReason;
use crate::oracle::{
    complete_with_timeout, decode_oracle_json, DecodeError, LanguageOracle, OracleError,
    OracleRequest,
};
use crate::prompts::{CONTENT_EDITOR_PROMPT, SOURCE_FINDER_PROMPT};
use crate::urls::is_valid_url;

/// Errors from a single repair collaborator.
#[derive(Debug, Error)]
pub enum RepairError {
    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("rewriter returned empty text")]
    EmptyRewrite,

    #[error("repair step timed out after {0:?}")]
    Timeout(Duration),
}

/// Result of one repair step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum RepairOutcome {
    Repaired(String),
    Unchanged(String),
}

impl RepairOutcome {
    pub fn is_repaired(&self) -> bool {
        matches!(self, Self::Repaired(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStep {
    Url,
    Content,
}

/// Finds a better supporting source for a note.
#[async_trait]
pub trait SourceFinder: Send + Sync {
    async fn find_source(&self, note_text: &str) -> Result<Option<String>, RepairError>;
}

/// Rewrites note content to address failure reasons.
#[async_trait]
pub trait ContentRewriter: Send + Sync {
    async fn rewrite(&self, note_text: &str, reasons: &[FailureReason])
        -> Result<String, RepairError>;
}

/// URL liveness check.
#[async_trait]
pub trait UrlProbe: Send + Sync {
    async fn is_live(&self, url: &str) -> bool;
}

/// What each reason means, as given to the content rewriter.
pub fn reason_explanation(reason: FailureReason) -> &'static str {
    match reason {
        FailureReason::UrlValidity => {
            "The source link is missing, broken or not considered a reliable source."
        }
        FailureReason::ClaimOpinion => {
            "The note reads as opinion or speculation instead of a verifiable factual claim. \
             Remove subjective language and state checkable facts."
        }
        FailureReason::HarassmentAbuse => {
            "The note contains language that could be seen as harassment, insult or abuse. \
             Use a neutral, respectful tone."
        }
        FailureReason::ApiError => "The platform could not be reached; no content problem is known.",
        FailureReason::SystemError => "The note could not be scored; no content problem is known.",
    }
}

/// Append `url` as a source unless the text already contains it.
pub fn apply_source(text: &str, url: &str) -> RepairOutcome {
    if text.contains(url) {
        RepairOutcome::Unchanged(format!("source {url} already present"))
    } else {
        RepairOutcome::Repaired(format!("{} Source: {url}", text.trim_end()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FoundUrlReply {
    found_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RewriteReply {
    rewritten_note: String,
}

/// Oracle-backed source finder with an optional liveness probe.
pub struct OracleSourceFinder {
    oracle: Arc<dyn LanguageOracle>,
    probe: Option<Arc<dyn UrlProbe>>,
    timeout: Duration,
    probe_timeout: Duration,
}

impl OracleSourceFinder {
    pub fn new(oracle: Arc<dyn LanguageOracle>, timeout: Duration) -> Self {
        Self {
            oracle,
            probe: None,
            timeout,
            probe_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn UrlProbe>, probe_timeout: Duration) -> Self {
        self.probe = Some(probe);
        self.probe_timeout = probe_timeout;
        self
    }

    async fn is_live(&self, url: &str) -> bool {
        let Some(probe) = &self.probe else {
            return true;
        };
        tokio::time::timeout(self.probe_timeout, probe.is_live(url))
            .await
            .unwrap_or(false)
    }
}

#[async_trait]
impl SourceFinder for OracleSourceFinder {
    async fn find_source(&self, note_text: &str) -> Result<Option<String>, RepairError> {
        let request = OracleRequest::new(SOURCE_FINDER_PROMPT, format!("Note Text: {note_text}"));
        let reply = complete_with_timeout(self.oracle.as_ref(), &request, self.timeout).await?;
        let found: FoundUrlReply = decode_oracle_json(&reply)?;

        let Some(url) = found.found_url.map(|u| u.trim().to_string()) else {
            return Ok(None);
        };
        if !is_valid_url(&url) {
            debug!(%url, "source finder offered an invalid URL");
            return Ok(None);
        }
        if !self.is_live(&url).await {
            warn!(%url, "source finder offered a dead URL");
            return Ok(None);
        }
        Ok(Some(url))
    }
}

/// Oracle-backed content rewriter.
pub struct OracleContentRewriter {
    oracle: Arc<dyn LanguageOracle>,
    timeout: Duration,
}

impl OracleContentRewriter {
    pub fn new(oracle: Arc<dyn LanguageOracle>, timeout: Duration) -> Self {
        Self { oracle, timeout }
    }
}

#[async_trait]
impl ContentRewriter for OracleContentRewriter {
    async fn rewrite(
        &self,
        note_text: &str,
        reasons: &[FailureReason],
    ) -> Result<String, RepairError> {
        let failures = reasons
            .iter()
            .map(|r| format!("- {r}: {}", reason_explanation(*r)))
            .collect::<Vec<_>>()
            .join("\n");
        let request = OracleRequest::new(
            CONTENT_EDITOR_PROMPT,
            format!("Note Text: {note_text}\n\nFailures:\n{failures}"),
        );
        let reply = complete_with_timeout(self.oracle.as_ref(), &request, self.timeout).await?;
        let decoded: RewriteReply = decode_oracle_json(&reply)?;
        let text = decoded.rewritten_note.trim();
        if text.is_empty() {
            return Err(RepairError::EmptyRewrite);
        }
        Ok(text.to_string())
    }
}

/// Everything one dispatch did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairReport {
    pub original: String,
    pub text: String,
    pub steps: Vec<(RepairStep, RepairOutcome)>,
}

impl RepairReport {
    pub fn changed(&self) -> bool {
        self.text != self.original
    }
}

/// Routes failure reasons to the matching repair collaborators.
pub struct RepairDispatcher {
    source_finder: Option<Arc<dyn SourceFinder>>,
    rewriter: Option<Arc<dyn ContentRewriter>>,
    timeout: Duration,
}

impl RepairDispatcher {
    pub fn new(
        source_finder: Option<Arc<dyn SourceFinder>>,
        rewriter: Option<Arc<dyn ContentRewriter>>,
        timeout: Duration,
    ) -> Self {
        Self {
            source_finder,
            rewriter,
            timeout,
        }
    }

    /// URL step: ask for a source and append it if absent.
    pub async fn repair_url(&self, text: &str) -> RepairOutcome {
        let Some(finder) = &self.source_finder else {
            return RepairOutcome::Unchanged("no source finder configured".into());
        };
        let found = tokio::time::timeout(self.timeout, finder.find_source(text))
            .await
            .unwrap_or(Err(RepairError::Timeout(self.timeout)));
        match found {
            Ok(Some(url)) => apply_source(text, &url),
            Ok(None) => RepairOutcome::Unchanged("no better source found".into()),
            Err(e) => {
                warn!(error = %e, "url repair failed; text unchanged");
                RepairOutcome::Unchanged(e.to_string())
            }
        }
    }

    /// Content step: rewrite against the content-related reasons.
    pub async fn repair_content(&self, text: &str, reasons: &[FailureReason]) -> RepairOutcome {
        let Some(rewriter) = &self.rewriter else {
            return RepairOutcome::Unchanged("no content rewriter configured".into());
        };
        let rewritten = tokio::time::timeout(self.timeout, rewriter.rewrite(text, reasons))
            .await
            .unwrap_or(Err(RepairError::Timeout(self.timeout)));
        match rewritten {
            Ok(new_text) if new_text == text => {
                RepairOutcome::Unchanged("rewriter returned identical text".into())
            }
            Ok(new_text) => RepairOutcome::Repaired(new_text),
            Err(e) => {
                warn!(error = %e, "content repair failed; text unchanged");
                RepairOutcome::Unchanged(e.to_string())
            }
        }
    }

    /// Apply the repair steps `reasons` call for, URL first.
    pub async fn dispatch(&self, text: &str, reasons: &[FailureReason]) -> RepairReport {
        let mut current = text.to_string();
        let mut steps = Vec::new();

        if reasons.contains(&FailureReason::UrlValidity) {
            let outcome = self.repair_url(&current).await;
            if let RepairOutcome::Repaired(new_text) = &outcome {
                current = new_text.clone();
            }
            steps.push((RepairStep::Url, outcome));
        }

        let content: Vec<FailureReason> = reasons.iter().copied().filter(|r| r.is_content()).collect();
        if !content.is_empty() {
            let outcome = self.repair_content(&current, &content).await;
            if let RepairOutcome::Repaired(new_text) = &outcome {
                current = new_text.clone();
            }
            steps.push((RepairStep::Content, outcome));
        }

        let report = RepairReport {
            original: text.to_string(),
            text: current,
            steps,
        };
        info!(
            changed = report.changed(),
            steps = report.steps.len(),
            "repair dispatch finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FixedFinder(Result<Option<String>, ()>);

    #[async_trait]
    impl SourceFinder for FixedFinder {
        async fn find_source(&self, _note_text: &str) -> Result<Option<String>, RepairError> {
            self.0
                .clone()
                .map_err(|_| RepairError::Oracle(OracleError::Transport("down".into())))
        }
    }

    struct RecordingRewriter {
        seen: Mutex<Vec<(String, Vec<FailureReason>)>>,
        fail: bool,
    }

    #[async_trait]
    impl ContentRewriter for RecordingRewriter {
        async fn rewrite(
            &self,
            note_text: &str,
            reasons: &[FailureReason],
        ) -> Result<String, RepairError> {
            self.seen
                .lock()
                .unwrap()
                .push((note_text.to_string(), reasons.to_vec()));
            if self.fail {
                return Err(RepairError::EmptyRewrite);
            }
            Ok(format!("Rewritten: {note_text}"))
        }
    }

    fn rewriter(fail: bool) -> Arc<RecordingRewriter> {
        Arc::new(RecordingRewriter {
            seen: Mutex::new(Vec::new()),
            fail,
        })
    }

    #[test]
    fn test_apply_source_only_when_absent() {
        assert_eq!(
            apply_source("Note text.", "https://a.org"),
            RepairOutcome::Repaired("Note text. Source: https://a.org".into())
        );
        assert!(!apply_source("See https://a.org", "https://a.org").is_repaired());
    }

    #[test]
    fn test_every_reason_has_explanation() {
        for r in [
            FailureReason::UrlValidity,
            FailureReason::ClaimOpinion,
            FailureReason::HarassmentAbuse,
            FailureReason::ApiError,
            FailureReason::SystemError,
        ] {
            assert!(!reason_explanation(r).is_empty());
        }
    }

    #[tokio::test]
    async fn test_url_repair_runs_before_content() {
        let rw = rewriter(false);
        let dispatcher = RepairDispatcher::new(
            Some(Arc::new(FixedFinder(Ok(Some("https://b.org".into()))))),
            Some(rw.clone()),
            Duration::from_secs(1),
        );
        let report = dispatcher
            .dispatch(
                "Claim text.",
                &[FailureReason::ClaimOpinion, FailureReason::UrlValidity],
            )
            .await;

        assert_eq!(report.steps[0].0, RepairStep::Url);
        assert_eq!(report.steps[1].0, RepairStep::Content);
        let seen = rw.seen.lock().unwrap();
        assert_eq!(seen[0].0, "Claim text. Source: https://b.org");
        assert_eq!(seen[0].1, vec![FailureReason::ClaimOpinion]);
        assert_eq!(report.text, "Rewritten: Claim text. Source: https://b.org");
        assert!(report.changed());
    }

    #[tokio::test]
    async fn test_failures_leave_text_unchanged() {
        let dispatcher = RepairDispatcher::new(
            Some(Arc::new(FixedFinder(Err(())))),
            Some(rewriter(true)),
            Duration::from_secs(1),
        );
        let report = dispatcher
            .dispatch(
                "Original.",
                &[FailureReason::UrlValidity, FailureReason::HarassmentAbuse],
            )
            .await;
        assert_eq!(report.text, "Original.");
        assert!(!report.changed());
        assert!(report.steps.iter().all(|(_, o)| !o.is_repaired()));
    }

    #[tokio::test]
    async fn test_non_content_reasons_skip_rewriter() {
        let rw = rewriter(false);
        let dispatcher = RepairDispatcher::new(None, Some(rw.clone()), Duration::from_secs(1));
        let report = dispatcher
            .dispatch("Text.", &[FailureReason::ApiError])
            .await;
        assert!(report.steps.is_empty());
        assert!(rw.seen.lock().unwrap().is_empty());
    }
}
