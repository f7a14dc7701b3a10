//! Grok chat-completions client implementing [`LanguageOracle`].

use std::time::Duration;

use admission_core::oracle::{LanguageOracle, OracleError, OracleRequest};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::ClientError;
use crate::config::GrokSettings;

/// Sampling temperature for every oracle call; critiques and rewrites
/// should be stable across runs.
const TEMPERATURE: f64 = 0.2;

pub struct GrokOracle {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
    model: String,
}

impl GrokOracle {
    /// Build from settings; fails without an API key.
    pub fn new(settings: &GrokSettings, timeout: Duration) -> Result<Self, ClientError> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or(ClientError::MissingCredential("GROK_API_KEY or XAI_API_KEY"))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            api_url: settings.api_url.clone(),
            model: settings.model.clone(),
        })
    }
}

/// OpenAI-style request body for one oracle request.
pub fn chat_body(model: &str, request: &OracleRequest) -> Value {
    json!({
        "model": model,
        "messages": [
            {"role": "system", "content": request.system},
            {"role": "user", "content": request.user},
        ],
        "temperature": TEMPERATURE,
    })
}

/// Pull `choices[0].message.content` out of a completion response.
pub fn extract_content(response: &Value) -> Result<String, OracleError> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            OracleError::Transport(format!(
                "completion response has no message content: {}",
                truncate_for_log(&response.to_string())
            ))
        })
}

fn truncate_for_log(text: &str) -> String {
    text.chars().take(200).collect()
}

#[async_trait]
impl LanguageOracle for GrokOracle {
    fn model_id(&self) -> String {
        self.model.clone()
    }

    async fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&chat_body(&self.model, request))
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 | 429 | 503 => {
                    OracleError::Unavailable(format!("HTTP {status}: {}", truncate_for_log(&body)))
                }
                _ => OracleError::Transport(format!("HTTP {status}: {}", truncate_for_log(&body))),
            });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| OracleError::Transport(format!("invalid completion JSON: {e}")))?;
        let content = extract_content(&json)?;
        debug!(model = %self.model, chars = content.len(), "oracle reply");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_body_shape() {
        let body = chat_body("grok-x", &OracleRequest::new("rubric", "note"));
        assert_eq!(body["model"], "grok-x");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "rubric");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "note");
    }

    #[test]
    fn test_extract_content() {
        let ok = json!({"choices": [{"message": {"role": "assistant", "content": "{\"score\": 1}"}}]});
        assert_eq!(extract_content(&ok).unwrap(), "{\"score\": 1}");

        let empty = json!({"choices": []});
        assert!(matches!(extract_content(&empty), Err(OracleError::Transport(_))));
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let settings = GrokSettings {
            api_key: None,
            api_url: "http://localhost".into(),
            model: "m".into(),
        };
        assert!(matches!(
            GrokOracle::new(&settings, Duration::from_secs(1)),
            Err(ClientError::MissingCredential(_))
        ));
    }
}
