//! Drafts and the posts they annotate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle stage of a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStage {
    /// First-pass draft.
    Draft,
    /// Produced by refining or repairing a parent draft.
    Rewrite,
}

impl std::fmt::Display for DraftStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Rewrite => write!(f, "rewrite"),
        }
    }
}

/// The social post a note is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub text: String,
}

impl Post {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// A candidate note.
///
/// Drafts form a tree through `parent_id`. Children are only ever built from
/// an existing parent via [`Draft::child`], so a lineage cannot loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub id: Uuid,
    pub text: String,
    pub stage: DraftStage,
    pub parent_id: Option<Uuid>,
    pub writer_id: String,
    pub post_id: String,
    pub created_at: DateTime<Utc>,
}

impl Draft {
    /// A root draft for `post_id` written by `writer_id`.
    pub fn new(writer_id: &str, post_id: &str, text: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.to_string(),
            stage: DraftStage::Draft,
            parent_id: None,
            writer_id: writer_id.to_string(),
            post_id: post_id.to_string(),
            created_at: Utc::now(),
        }
    }

    /// A rewrite of this draft carrying `text`.
    pub fn child(&self, text: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.to_string(),
            stage: DraftStage::Rewrite,
            parent_id: Some(self.id),
            writer_id: self.writer_id.clone(),
            post_id: self.post_id.clone(),
            created_at: Utc::now(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}
