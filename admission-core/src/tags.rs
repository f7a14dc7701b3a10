//! Misleading-tag selection from a closed vocabulary.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::oracle::{complete_with_timeout, extract_json_object, LanguageOracle, OracleRequest};
use crate::prompts::tag_selector_prompt;

/// Reasons the submission endpoint accepts for `misleading_tags`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MisleadingTag {
    DisputedClaimAsFact,
    FactualError,
    ManipulatedMedia,
    MisinterpretedSatire,
    MissingImportantContext,
    Other,
    OutdatedInformation,
}

impl MisleadingTag {
    pub const ALL: [MisleadingTag; 7] = [
        Self::DisputedClaimAsFact,
        Self::FactualError,
        Self::ManipulatedMedia,
        Self::MisinterpretedSatire,
        Self::MissingImportantContext,
        Self::Other,
        Self::OutdatedInformation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DisputedClaimAsFact => "disputed_claim_as_fact",
            Self::FactualError => "factual_error",
            Self::ManipulatedMedia => "manipulated_media",
            Self::MisinterpretedSatire => "misinterpreted_satire",
            Self::MissingImportantContext => "missing_important_context",
            Self::Other => "other",
            Self::OutdatedInformation => "outdated_information",
        }
    }

    /// Exact-match lookup; anything outside the vocabulary is `None`.
    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == label)
    }
}

impl std::fmt::Display for MisleadingTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised only when no fallback tag is configured.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TagError {
    #[error("tag selection failed and no fallback tag is configured: {0}")]
    NoValidTags(String),
}

/// Keep the in-vocabulary labels of a `{"misleading_tags": [...]}` reply,
/// in order and without duplicates. `Err` carries why nothing usable was found.
fn filter_reply(reply: &str) -> Result<Vec<MisleadingTag>, String> {
    let object = extract_json_object(reply).ok_or("reply has no JSON object")?;
    let value: Value = serde_json::from_str(object).map_err(|e| format!("invalid JSON: {e}"))?;
    let labels = value
        .get("misleading_tags")
        .and_then(Value::as_array)
        .ok_or("misleading_tags missing or not a list")?;

    let mut tags = Vec::new();
    for label in labels.iter().filter_map(Value::as_str) {
        match MisleadingTag::parse(label) {
            Some(tag) if !tags.contains(&tag) => tags.push(tag),
            Some(_) => {}
            None => debug!(label, "dropping out-of-vocabulary tag"),
        }
    }
    if tags.is_empty() {
        return Err("no labels from the vocabulary".to_string());
    }
    Ok(tags)
}

pub struct TagSelector {
    oracle: Option<Arc<dyn LanguageOracle>>,
    fallback: Option<MisleadingTag>,
    timeout: Duration,
}

impl TagSelector {
    pub fn new(
        oracle: Option<Arc<dyn LanguageOracle>>,
        fallback: Option<MisleadingTag>,
        timeout: Duration,
    ) -> Self {
        Self {
            oracle,
            fallback,
            timeout,
        }
    }

    /// Pick tags for a note on a post.
    pub async fn select(
        &self,
        post_text: &str,
        note_text: &str,
    ) -> Result<Vec<MisleadingTag>, TagError> {
        let outcome = match &self.oracle {
            None => Err("oracle not configured".to_string()),
            Some(oracle) => {
                let allowed: Vec<&str> = MisleadingTag::ALL.iter().map(|t| t.as_str()).collect();
                let request = OracleRequest::new(
                    tag_selector_prompt(&allowed),
                    format!(
                        "Post text:\n{post_text}\n\nCommunity Note:\n{note_text}\n\n\
                         Pick the most appropriate misleading_tags values from the list."
                    ),
                );
                match complete_with_timeout(oracle.as_ref(), &request, self.timeout).await {
                    Ok(reply) => filter_reply(&reply),
                    Err(e) => Err(e.to_string()),
                }
            }
        };

        match (outcome, self.fallback) {
            (Ok(tags), _) => Ok(tags),
            (Err(reason), Some(fallback)) => {
                warn!(%reason, %fallback, "tag selection fell back to default");
                Ok(vec![fallback])
            }
            (Err(reason), None) => Err(TagError::NoValidTags(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vocabulary() {
        assert_eq!(
            MisleadingTag::parse("factual_error"),
            Some(MisleadingTag::FactualError)
        );
        assert_eq!(MisleadingTag::parse("Factual_Error"), None);
        assert_eq!(MisleadingTag::parse("not_a_real_tag"), None);
        for tag in MisleadingTag::ALL {
            assert_eq!(MisleadingTag::parse(tag.as_str()), Some(tag));
            assert_eq!(
                serde_json::to_string(&tag).unwrap(),
                format!("\"{}\"", tag.as_str())
            );
        }
    }

    #[test]
    fn test_filter_partial_trust() {
        let tags =
            filter_reply(r#"{"misleading_tags": ["factual_error", "not_a_real_tag"]}"#).unwrap();
        assert_eq!(tags, vec![MisleadingTag::FactualError]);
    }

    #[test]
    fn test_filter_dedupes_and_skips_non_strings() {
        let tags = filter_reply(
            r#"{"misleading_tags": ["other", 7, "other", "outdated_information"]}"#,
        )
        .unwrap();
        assert_eq!(
            tags,
            vec![MisleadingTag::Other, MisleadingTag::OutdatedInformation]
        );
    }

    #[test]
    fn test_filter_failures() {
        assert!(filter_reply("not json").is_err());
        assert!(filter_reply(r#"{"misleading_tags": "factual_error"}"#).is_err());
        assert!(filter_reply(r#"{"misleading_tags": ["bogus"]}"#).is_err());
        assert!(filter_reply(r#"{"tags": ["other"]}"#).is_err());
    }

    #[tokio::test]
    async fn test_no_oracle_uses_fallback() {
        let selector = TagSelector::new(
            None,
            Some(MisleadingTag::MissingImportantContext),
            Duration::from_secs(1),
        );
        assert_eq!(
            selector.select("post", "note").await.unwrap(),
            vec![MisleadingTag::MissingImportantContext]
        );
    }

    #[tokio::test]
    async fn test_no_oracle_no_fallback_errors() {
        let selector = TagSelector::new(None, None, Duration::from_secs(1));
        assert!(matches!(
            selector.select("post", "note").await,
            Err(TagError::NoValidTags(_))
        ));
    }
}
