//! Reviewer personas: fixed archetypes with a rubric and scoring guide.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A simulated reviewer archetype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaSpec {
    /// Stable identifier, unique within a panel.
    pub id: String,
    /// Display name, e.g. "The Skeptic".
    pub name: String,
    /// What drives this reviewer.
    pub core_motivation: String,
    /// Criteria this reviewer judges a note on.
    pub rubric: Vec<String>,
    /// How this reviewer maps impressions to a 0.0–1.0 score.
    pub scoring_guide: String,
}

impl PersonaSpec {
    pub fn new(
        id: &str,
        name: &str,
        core_motivation: &str,
        rubric: &[&str],
        scoring_guide: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            core_motivation: core_motivation.to_string(),
            rubric: rubric.iter().map(|c| c.to_string()).collect(),
            scoring_guide: scoring_guide.to_string(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PanelError {
    #[error("panel has no personas")]
    Empty,

    #[error("duplicate persona id: {0}")]
    DuplicatePersona(String),
}

/// An ordered set of personas with unique ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Panel {
    personas: Vec<PersonaSpec>,
}

impl Panel {
    pub fn new(personas: Vec<PersonaSpec>) -> Result<Self, PanelError> {
        if personas.is_empty() {
            return Err(PanelError::Empty);
        }
        for (i, persona) in personas.iter().enumerate() {
            if personas[..i].iter().any(|p| p.id == persona.id) {
                return Err(PanelError::DuplicatePersona(persona.id.clone()));
            }
        }
        Ok(Self { personas })
    }

    pub fn personas(&self) -> &[PersonaSpec] {
        &self.personas
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}

impl Default for Panel {
    /// The standard five-reviewer panel, chosen to disagree with each other.
    fn default() -> Self {
        Self {
            personas: vec![
                PersonaSpec::new(
                    "skeptic",
                    "The Skeptic",
                    "Questions every claim until it is backed by evidence",
                    &["Evidence quality", "Source credibility"],
                    "1.0 only when every factual claim is sourced; below 0.3 when the note asserts without evidence",
                ),
                PersonaSpec::new(
                    "supporter",
                    "The Supporter",
                    "Sympathises with the original post and resents unfair corrections",
                    &["Fairness to the author", "Context", "Nuance"],
                    "High when the note adds context without mocking the author; low when it reads as a gotcha",
                ),
                PersonaSpec::new(
                    "fact_checker",
                    "The Fact Checker",
                    "Cares only about verifiable accuracy",
                    &["Accuracy", "Citations", "Specificity"],
                    "High for precise, checkable statements with a primary source; low for vague or wrong claims",
                ),
                PersonaSpec::new(
                    "methodologist",
                    "The Methodologist",
                    "Judges whether the reasoning and data actually support the conclusion",
                    &["Sound reasoning", "Appropriate data", "No overreach"],
                    "High when conclusions follow from cited data; low for cherry-picking or overgeneralisation",
                ),
                PersonaSpec::new(
                    "ideological_opponent",
                    "The Ideological Opponent",
                    "Holds the opposite political view to the note writer and watches for bias",
                    &["Neutral tone", "No partisan framing", "Balanced sourcing"],
                    "High when the note would persuade someone who disagrees; low for loaded or partisan language",
                ),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_panel_has_five_unique_personas() {
        let panel = Panel::default();
        assert_eq!(panel.len(), 5);
        let rebuilt = Panel::new(panel.personas().to_vec());
        assert!(rebuilt.is_ok());
    }

    #[test]
    fn test_duplicate_persona_rejected() {
        let p = PersonaSpec::new("a", "A", "m", &["c"], "g");
        assert_eq!(
            Panel::new(vec![p.clone(), p]).unwrap_err(),
            PanelError::DuplicatePersona("a".to_string())
        );
    }

    #[test]
    fn test_empty_panel_rejected() {
        assert_eq!(Panel::new(vec![]).unwrap_err(), PanelError::Empty);
    }
}
