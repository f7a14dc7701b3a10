//! Language oracle seam and the JSON parse boundary for its replies.
//!
//! The oracle returns free text that is expected to embed one JSON object.
//! Replies are decoded eagerly into a per-call-site schema; anything that
//! does not fit becomes a [`DecodeError`] of a specific kind.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from a single oracle call.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle transport failed: {0}")]
    Transport(String),

    #[error("oracle call timed out after {0:?}")]
    Timeout(Duration),

    #[error("oracle unavailable: {0}")]
    Unavailable(String),
}

/// Errors turning oracle text into a typed result.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// No balanced `{...}` anywhere in the reply.
    #[error("no JSON object in oracle reply")]
    NoJsonObject,

    /// A JSON object was found but is not valid JSON.
    #[error("malformed JSON: {0}")]
    Malformed(String),

    /// Valid JSON that does not match the expected schema
    /// (missing, extra or out-of-range fields).
    #[error("schema mismatch: {0}")]
    Schema(String),
}

/// One request to the oracle: a system rubric plus user content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRequest {
    pub system: String,
    pub user: String,
}

impl OracleRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// A language-generation backend.
#[async_trait]
pub trait LanguageOracle: Send + Sync {
    /// Identifier of the model behind this oracle, recorded on results.
    fn model_id(&self) -> String;

    /// Send one request and return the raw reply text.
    async fn complete(&self, request: &OracleRequest) -> Result<String, OracleError>;
}

/// Call the oracle with an explicit deadline.
pub async fn complete_with_timeout(
    oracle: &dyn LanguageOracle,
    request: &OracleRequest,
    timeout: Duration,
) -> Result<String, OracleError> {
    match tokio::time::timeout(timeout, oracle.complete(request)).await {
        Ok(result) => result,
        Err(_) => Err(OracleError::Timeout(timeout)),
    }
}

/// Return the first balanced `{...}` in `text`, ignoring code-fence markers.
///
/// Braces inside JSON string literals do not count toward balance.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Decode an oracle reply into `T`.
///
/// `T` is expected to use `#[serde(deny_unknown_fields)]` so that extra
/// fields surface as [`DecodeError::Schema`].
pub fn decode_oracle_json<T: DeserializeOwned>(reply: &str) -> Result<T, DecodeError> {
    let object = extract_json_object(reply).ok_or(DecodeError::NoJsonObject)?;
    let value: serde_json::Value =
        serde_json::from_str(object).map_err(|e| DecodeError::Malformed(e.to_string()))?;
    serde_json::from_value(value).map_err(|e| DecodeError::Schema(e.to_string()))
}
