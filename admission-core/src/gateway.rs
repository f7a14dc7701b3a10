//! Submission gateway: wire-contract enforcement before anything is sent.
//!
//! Contract: one paragraph, 1–280 characters, at least one valid URL, no
//! markdown heading, bullet or link syntax.
//!
//! ```text
//! raw ─► normalize ─► truncate ─► validate ─┬─ ok ─► NoteSubmission ─► platform
//!                                           └─ ContractViolation (never sent)
//! ```

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::SubmissionConfig;
use crate::platform::{
    submit_with_timeout, Classification, NoteInfo, NoteSubmission, PlatformError,
    PlatformSubmitter,
};
use crate::tags::MisleadingTag;
use crate::urls::{find_urls, has_valid_url};

static MARKDOWN_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\]]+)\]\((https?://[^\s)]+)\)").expect("MARKDOWN_LINK_RE regex should compile")
});

static RESIDUAL_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]+\]\(").expect("RESIDUAL_LINK_RE regex should compile"));

/// Markers that force the full normalisation pass.
const NOISY_MARKERS: &[&str] = &[
    "claim:", "summary:", "context:", "tweet:", "sources:", "- ", "* ", "• ",
];

/// Section names whose pure heading lines are dropped.
const HEADING_WORDS: &[&str] = &[
    "claim", "summary", "context", "tweet", "note", "analysis", "sources",
];

/// Label prefixes stripped from the start of a line.
const HEADING_PREFIXES: &[&str] = &[
    "claim:", "summary:", "context:", "tweet:", "note:", "analysis:", "sources:",
];

/// Ways a note text can break the wire contract.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContractViolation {
    #[error("note text is empty")]
    Empty,

    #[error("note text is {len} characters, limit is {max}")]
    TooLong { len: usize, max: usize },

    #[error("note text spans more than one line")]
    ContainsNewline,

    #[error("note text has no valid http(s) URL")]
    MissingUrl,

    #[error("note text starts with a heading or bullet marker")]
    LeadingMarkup,

    #[error("note text still contains markdown link syntax")]
    MarkdownLink,
}

/// Submission status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Submitted,
    Failed,
}

/// Record of one submission. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: Uuid,
    pub draft_id: Uuid,
    pub post_id: String,
    pub status: SubmissionStatus,
    pub text: String,
    pub response: Option<Value>,
    pub error: Option<String>,
    pub test_mode: bool,
    pub created_at: DateTime<Utc>,
}

impl SubmissionRecord {
    /// Record for a submission the platform accepted.
    pub fn submitted(draft_id: Uuid, submission: &NoteSubmission, response: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            draft_id,
            post_id: submission.post_id.clone(),
            status: SubmissionStatus::Submitted,
            text: submission.info.text.clone(),
            response: Some(response),
            error: None,
            test_mode: submission.test_mode,
            created_at: Utc::now(),
        }
    }

    /// Record for a submission the transport rejected.
    pub fn failed(draft_id: Uuid, submission: &NoteSubmission, error: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            draft_id,
            post_id: submission.post_id.clone(),
            status: SubmissionStatus::Failed,
            text: submission.info.text.clone(),
            response: None,
            error: Some(error),
            test_mode: submission.test_mode,
            created_at: Utc::now(),
        }
    }
}

/// True when `text` already looks like a plain single paragraph.
pub fn looks_simple(text: &str) -> bool {
    if text.contains('\n') {
        return false;
    }
    let lower = text.to_lowercase();
    !NOISY_MARKERS.iter().any(|m| lower.contains(m))
}

/// Whether a `#`-heading body names one of the known sections.
fn is_section_heading(body: &str) -> bool {
    let lower = body.to_lowercase();
    HEADING_WORDS.iter().any(|w| lower.starts_with(w))
}

/// Strip heading labels, bullets and numbering from the start of one line
/// until none remain.
fn strip_line_prefixes(line: &str) -> &str {
    let mut current = line.trim();
    loop {
        let before = current;

        let label = HEADING_PREFIXES.iter().find(|p| {
            current
                .get(..p.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(p))
        });
        if let Some(prefix) = label {
            current = current[prefix.len()..].trim_start_matches([' ', '-', ':']);
        }

        for bullet in ["- ", "* ", "• "] {
            if let Some(rest) = current.strip_prefix(bullet) {
                current = rest.trim_start();
            }
        }

        let digits = current.chars().take_while(char::is_ascii_digit).count();
        if digits > 0 && current[digits..].starts_with(". ") {
            current = current[digits + 2..].trim_start();
        }

        if current == before {
            return current;
        }
    }
}

/// Clean one line: rewrite links, drop section headings, strip prefixes.
/// Repeats until stable, since a rewritten link label can expose a new
/// prefix. `None` when the line should be dropped.
fn clean_line(line: &str) -> Option<String> {
    let mut current = line.trim().to_string();
    loop {
        let before = current.clone();

        let mut text = MARKDOWN_LINK_RE.replace_all(&current, "$1 ($2)").into_owned();
        if text.starts_with('#') {
            let body = text.trim_start_matches('#').trim();
            if is_section_heading(body) {
                return None;
            }
            text = body.to_string();
        }
        current = strip_line_prefixes(&text).to_string();

        if current == before {
            return (!current.is_empty()).then_some(current);
        }
    }
}

/// Normalise model output into a single plain paragraph.
pub fn normalize(raw: &str) -> String {
    if looks_simple(raw) {
        return raw.trim().to_string();
    }

    let mut parts: Vec<String> = Vec::new();
    let mut in_fence = false;
    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence || trimmed.is_empty() {
            continue;
        }
        parts.extend(clean_line(trimmed));
    }

    parts.join(" ")
}

/// Bring `text` within `config.max_chars`, keeping the first URL in view.
pub fn truncate(text: &str, config: &SubmissionConfig) -> String {
    let char_len = text.chars().count();
    if char_len <= config.max_chars {
        return text.to_string();
    }

    let start = match find_urls(text).first() {
        Some(m) => {
            let url_char_pos = text[..m.start].chars().count();
            url_char_pos.saturating_sub(config.url_lead_chars)
        }
        None => 0,
    };
    text.chars()
        .skip(start)
        .take(config.max_chars)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Hard validation of the wire contract.
pub fn validate(text: &str, config: &SubmissionConfig) -> Result<(), ContractViolation> {
    if text.trim().is_empty() {
        return Err(ContractViolation::Empty);
    }
    let len = text.chars().count();
    if len > config.max_chars {
        return Err(ContractViolation::TooLong {
            len,
            max: config.max_chars,
        });
    }
    if text.contains('\n') || text.contains('\r') {
        return Err(ContractViolation::ContainsNewline);
    }
    if !has_valid_url(text) {
        return Err(ContractViolation::MissingUrl);
    }
    let leading = text.trim_start();
    if leading.starts_with('#')
        || leading.starts_with('*')
        || leading.starts_with("- ")
        || leading.starts_with('•')
    {
        return Err(ContractViolation::LeadingMarkup);
    }
    if RESIDUAL_LINK_RE.is_match(text) {
        return Err(ContractViolation::MarkdownLink);
    }
    Ok(())
}

/// Normalise, truncate and validate `raw` into contract-conforming text.
pub fn prepare_text(raw: &str, config: &SubmissionConfig) -> Result<String, ContractViolation> {
    let normalized = normalize(raw);
    let text = truncate(&normalized, config);
    validate(&text, config)?;
    Ok(text)
}

/// Turns note text into validated submissions and sends them.
pub struct SubmissionGateway {
    submitter: Arc<dyn PlatformSubmitter>,
    config: SubmissionConfig,
    fallback_tag: MisleadingTag,
    timeout: Duration,
}

impl SubmissionGateway {
    pub fn new(
        submitter: Arc<dyn PlatformSubmitter>,
        config: SubmissionConfig,
        fallback_tag: MisleadingTag,
        timeout: Duration,
    ) -> Self {
        Self {
            submitter,
            config,
            fallback_tag,
            timeout,
        }
    }

    pub fn config(&self) -> &SubmissionConfig {
        &self.config
    }

    /// Build the wire payload. Fails on any contract violation.
    pub fn build_submission(
        &self,
        raw_text: &str,
        post_id: &str,
        tags: &[MisleadingTag],
        test_mode: bool,
    ) -> Result<NoteSubmission, ContractViolation> {
        let text = prepare_text(raw_text, &self.config)?;
        debug!(normalized = %text, "note text prepared for submission");

        let misleading_tags = if tags.is_empty() {
            vec![self.fallback_tag]
        } else {
            tags.to_vec()
        };
        let trustworthy_sources = !find_urls(&text).is_empty();

        Ok(NoteSubmission {
            info: NoteInfo {
                classification: Classification::default(),
                misleading_tags,
                text,
                trustworthy_sources,
            },
            post_id: post_id.to_string(),
            test_mode,
        })
    }

    /// Send an already-validated submission; transport errors are returned
    /// to the caller untouched.
    pub async fn send(
        &self,
        submission: &NoteSubmission,
    ) -> Result<Value, PlatformError> {
        submit_with_timeout(self.submitter.as_ref(), submission, self.timeout).await
    }

    /// Submit outside the admission flow (explicit override).
    ///
    /// Contract violations are raised and nothing is sent; transport failures
    /// produce a `failed` record.
    pub async fn submit(
        &self,
        draft_id: Uuid,
        raw_text: &str,
        post_id: &str,
        tags: &[MisleadingTag],
        test_mode: bool,
    ) -> Result<SubmissionRecord, ContractViolation> {
        let submission = self.build_submission(raw_text, post_id, tags, test_mode)?;
        let record = match self.send(&submission).await {
            Ok(response) => {
                info!(%draft_id, post_id, "note submitted");
                SubmissionRecord::submitted(draft_id, &submission, response)
            }
            Err(e) => {
                error!(%draft_id, post_id, error = %e, "note submission failed");
                SubmissionRecord::failed(draft_id, &submission, e.to_string())
            }
        };
        Ok(record)
    }
}
