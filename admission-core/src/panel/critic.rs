//! Persona critic: scores one draft against one persona's rubric.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::persona::PersonaSpec;
use crate::oracle::{complete_with_timeout, decode_oracle_json, LanguageOracle, OracleRequest};
use crate::prompts::CRITIC_SYSTEM_PROMPT;

/// Maximum strengths or weaknesses kept per critique.
pub const MAX_POINTS: usize = 2;

/// Rationale recorded when a critique could not be obtained.
pub const SENTINEL_RATIONALE: &str = "error during simulation";

/// One persona's verdict on one draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaFeedback {
    pub persona_id: String,
    /// Helpfulness score in `[0, 1]`.
    pub score: f64,
    pub rationale: String,
    /// The persona thinks the note leaves out context readers need.
    pub missing_context: bool,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
}

impl PersonaFeedback {
    /// Degraded feedback standing in for a failed critique.
    pub fn sentinel(persona_id: &str) -> Self {
        Self {
            persona_id: persona_id.to_string(),
            score: 0.0,
            rationale: SENTINEL_RATIONALE.to_string(),
            missing_context: true,
            strengths: Vec::new(),
            weaknesses: Vec::new(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.rationale == SENTINEL_RATIONALE && self.score == 0.0
    }
}

impl std::fmt::Display for PersonaFeedback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {:.2} {}", self.persona_id, self.score, self.rationale)
    }
}

/// Reply schema for a critique call.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CritiqueReply {
    score: f64,
    rationale: String,
    missing_context: bool,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    weaknesses: Vec<String>,
}

/// Critiques drafts as a single persona.
pub struct PersonaCritic {
    persona: PersonaSpec,
    oracle: Arc<dyn LanguageOracle>,
    timeout: Duration,
}

impl PersonaCritic {
    pub fn new(persona: PersonaSpec, oracle: Arc<dyn LanguageOracle>, timeout: Duration) -> Self {
        Self {
            persona,
            oracle,
            timeout,
        }
    }

    pub fn persona(&self) -> &PersonaSpec {
        &self.persona
    }

    fn request_for(&self, draft_text: &str) -> OracleRequest {
        let user = format!(
            "Persona Name: {}\nCore Motivation: {}\nRubric: {}\nScoring Guide: {}\n\nDraft Note: {}",
            self.persona.name,
            self.persona.core_motivation,
            self.persona.rubric.join(", "),
            self.persona.scoring_guide,
            draft_text
        );
        OracleRequest::new(CRITIC_SYSTEM_PROMPT, user)
    }

    /// Score `draft_text`. Never fails: any oracle or decode problem yields
    /// [`PersonaFeedback::sentinel`].
    pub async fn critique(&self, draft_text: &str) -> PersonaFeedback {
        let request = self.request_for(draft_text);
        let reply = match complete_with_timeout(self.oracle.as_ref(), &request, self.timeout).await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!(persona = %self.persona.id, error = %e, "critique call failed, using sentinel");
                return PersonaFeedback::sentinel(&self.persona.id);
            }
        };

        match decode_oracle_json::<CritiqueReply>(&reply) {
            Ok(parsed) if (0.0..=1.0).contains(&parsed.score) => {
                debug!(persona = %self.persona.id, score = parsed.score, "critique received");
                PersonaFeedback {
                    persona_id: self.persona.id.clone(),
                    score: parsed.score,
                    rationale: parsed.rationale,
                    missing_context: parsed.missing_context,
                    strengths: parsed.strengths.into_iter().take(MAX_POINTS).collect(),
                    weaknesses: parsed.weaknesses.into_iter().take(MAX_POINTS).collect(),
                }
            }
            Ok(parsed) => {
                warn!(persona = %self.persona.id, score = parsed.score, "critique score out of range, using sentinel");
                PersonaFeedback::sentinel(&self.persona.id)
            }
            Err(e) => {
                warn!(persona = %self.persona.id, error = %e, "unparsable critique, using sentinel");
                PersonaFeedback::sentinel(&self.persona.id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::OracleError;
    use async_trait::async_trait;

    struct FixedOracle(Result<&'static str, ()>);

    #[async_trait]
    impl LanguageOracle for FixedOracle {
        fn model_id(&self) -> String {
            "fixed".to_string()
        }

        async fn complete(&self, _request: &OracleRequest) -> Result<String, OracleError> {
            self.0
                .map(str::to_string)
                .map_err(|_| OracleError::Transport("connection reset".to_string()))
        }
    }

    fn critic(reply: Result<&'static str, ()>) -> PersonaCritic {
        PersonaCritic::new(
            PersonaSpec::new("skeptic", "The Skeptic", "doubt", &["Evidence"], "guide"),
            Arc::new(FixedOracle(reply)),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_critique_parses_and_caps_points() {
        let reply = r#"```json
{"score": 0.8, "rationale": "Well sourced.", "missing_context": false,
 "strengths": ["a", "b", "c"], "weaknesses": ["x"]}
```"#;
        let feedback = critic(Ok(reply)).critique("draft").await;
        assert_eq!(feedback.persona_id, "skeptic");
        assert!((feedback.score - 0.8).abs() < f64::EPSILON);
        assert_eq!(feedback.strengths, vec!["a", "b"]);
        assert_eq!(feedback.weaknesses, vec!["x"]);
        assert!(!feedback.is_sentinel());
    }

    #[tokio::test]
    async fn test_unparsable_reply_yields_sentinel() {
        let feedback = critic(Ok("I refuse to answer in JSON")).critique("draft").await;
        assert!(feedback.is_sentinel());
        assert!(feedback.missing_context);
        assert_eq!(feedback.rationale, SENTINEL_RATIONALE);
    }

    #[tokio::test]
    async fn test_extra_field_yields_sentinel() {
        let reply = r#"{"score": 0.5, "rationale": "ok", "missing_context": false, "mood": "grumpy"}"#;
        assert!(critic(Ok(reply)).critique("draft").await.is_sentinel());
    }

    #[tokio::test]
    async fn test_out_of_range_score_yields_sentinel() {
        let reply = r#"{"score": 7, "rationale": "ok", "missing_context": false}"#;
        assert!(critic(Ok(reply)).critique("draft").await.is_sentinel());
    }

    #[tokio::test]
    async fn test_transport_error_yields_sentinel() {
        assert!(critic(Err(())).critique("draft").await.is_sentinel());
    }

    #[test]
    fn test_request_embeds_persona_and_draft() {
        let request = critic(Ok("{}")).request_for("The sky is green.");
        assert!(request.user.contains("The Skeptic"));
        assert!(request.user.contains("Rubric: Evidence"));
        assert!(request.user.ends_with("Draft Note: The sky is green."));
        assert_eq!(request.system, CRITIC_SYSTEM_PROMPT);
    }
}
