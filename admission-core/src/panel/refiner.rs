//! Refiner: rewrites a draft against its harshest critique.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::consensus::ConsensusResult;
use super::critic::PersonaFeedback;
use crate::draft::Draft;
use crate::oracle::{
    complete_with_timeout, decode_oracle_json, DecodeError, LanguageOracle, OracleError,
    OracleRequest,
};
use crate::prompts::REFINER_SYSTEM_PROMPT;

/// Refinement has no safe partial output, so every failure surfaces.
#[derive(Debug, Error)]
pub enum RefineError {
    #[error("no critiques to refine against")]
    NoCritiques,

    #[error("consensus result belongs to draft {result}, not {draft}")]
    DraftMismatch { draft: uuid::Uuid, result: uuid::Uuid },

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("unusable refinement reply: {0}")]
    Decode(#[from] DecodeError),

    #[error("refinement returned an empty note")]
    EmptyRewrite,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RefinementReply {
    rewritten_note: String,
    change_summary: String,
}

/// A refined child draft and what changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refinement {
    pub draft: Draft,
    pub change_summary: String,
    /// Persona whose critique was spotlighted.
    pub targeted_persona: String,
}

/// Build the rewrite prompt: all critiques, then the harshest spotlighted.
pub fn build_refine_prompt(
    draft_text: &str,
    critiques: &[PersonaFeedback],
    spotlight: &PersonaFeedback,
) -> String {
    let mut out = format!("Original Note: {}\n\nCritiques:\n", draft_text);
    for c in critiques {
        out.push_str(&format!(
            "- {} (score {:.2}): {}",
            c.persona_id, c.score, c.rationale
        ));
        if !c.weaknesses.is_empty() {
            out.push_str(&format!(" Weaknesses: {}.", c.weaknesses.join("; ")));
        }
        if c.missing_context {
            out.push_str(" Flags missing context.");
        }
        out.push('\n');
    }
    out.push_str(&format!(
        "\nPRIORITY: The harshest critique came from {} (score {:.2}): \"{}\". \
         Your rewrite must resolve this concern first.",
        spotlight.persona_id, spotlight.score, spotlight.rationale
    ));
    out
}

pub struct Refiner {
    oracle: Arc<dyn LanguageOracle>,
    timeout: Duration,
}

impl Refiner {
    pub fn new(oracle: Arc<dyn LanguageOracle>, timeout: Duration) -> Self {
        Self { oracle, timeout }
    }

    /// Produce a rewrite child of `draft` targeting the harshest critique in
    /// `result`.
    pub async fn refine(
        &self,
        draft: &Draft,
        result: &ConsensusResult,
    ) -> Result<Refinement, RefineError> {
        if result.draft_id != draft.id {
            return Err(RefineError::DraftMismatch {
                draft: draft.id,
                result: result.draft_id,
            });
        }
        let spotlight = result.harshest().ok_or(RefineError::NoCritiques)?;

        let request = OracleRequest::new(
            REFINER_SYSTEM_PROMPT,
            build_refine_prompt(&draft.text, &result.feedback, spotlight),
        );
        let reply = complete_with_timeout(self.oracle.as_ref(), &request, self.timeout).await?;
        let parsed: RefinementReply = decode_oracle_json(&reply)?;

        let text = parsed.rewritten_note.trim();
        if text.is_empty() {
            return Err(RefineError::EmptyRewrite);
        }

        let child = draft.child(text);
        info!(
            parent = %draft.id,
            child = %child.id,
            targeted = %spotlight.persona_id,
            "draft refined"
        );
        Ok(Refinement {
            draft: child,
            change_summary: parsed.change_summary,
            targeted_persona: spotlight.persona_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fb(id: &str, score: f64, rationale: &str) -> PersonaFeedback {
        PersonaFeedback {
            persona_id: id.to_string(),
            score,
            rationale: rationale.to_string(),
            missing_context: score < 0.3,
            strengths: vec![],
            weaknesses: vec!["no source".to_string()],
        }
    }

    #[test]
    fn test_prompt_lists_all_and_spotlights_harshest() {
        let critiques = vec![
            fb("skeptic", 0.1, "No evidence at all."),
            fb("supporter", 0.6, "Fair enough."),
        ];
        let prompt = build_refine_prompt("The sky is green.", &critiques, &critiques[0]);
        assert!(prompt.starts_with("Original Note: The sky is green."));
        assert!(prompt.contains("- skeptic (score 0.10): No evidence at all."));
        assert!(prompt.contains("- supporter (score 0.60): Fair enough."));
        assert!(prompt.contains("Weaknesses: no source."));
        assert!(prompt.contains("Flags missing context."));
        assert!(prompt.contains("PRIORITY: The harshest critique came from skeptic"));
    }
}
