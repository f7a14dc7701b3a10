//! X platform transport: practice evaluation, note submission and post lookup.

use std::sync::LazyLock;
use std::time::Duration;

use admission_core::platform::{NoteSubmission, PlatformError, PlatformEvaluator, PlatformSubmitter};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::ClientError;
use crate::config::XSettings;

static STATUS_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"status/(\d+)").expect("STATUS_ID regex should compile"));

/// Numeric post id from a post URL, or the input itself when it is already an id.
pub fn extract_post_id(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Some(trimmed.to_string());
    }
    STATUS_ID_RE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub struct XPlatformClient {
    client: reqwest::Client,
    bearer_token: String,
    submit_url: String,
    evaluate_urls: Vec<String>,
    posts_url: String,
}

impl XPlatformClient {
    pub fn new(settings: &XSettings, timeout: Duration) -> Result<Self, ClientError> {
        let bearer_token = settings
            .bearer_token
            .clone()
            .ok_or(ClientError::MissingCredential("X_BEARER_TOKEN or X_API_BEARER_TOKEN"))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            bearer_token,
            submit_url: settings.submit_url.clone(),
            evaluate_urls: settings.evaluate_urls.clone(),
            posts_url: settings.posts_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<reqwest::Response, PlatformError> {
        self.client
            .post(url)
            .bearer_auth(&self.bearer_token)
            .json(body)
            .send()
            .await
            .map_err(|e| PlatformError::Transport(e.to_string()))
    }

    /// Text of a post, `None` when the platform has no text for it.
    pub async fn fetch_post_text(&self, post_id: &str) -> Result<Option<String>, PlatformError> {
        let url = format!("{}/{post_id}", self.posts_url);
        let response = self
            .client
            .get(&url)
            .query(&[("tweet.fields", "text")])
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .map_err(|e| PlatformError::Transport(e.to_string()))?;
        let json = read_json(response).await?;
        Ok(json["data"]["text"].as_str().map(str::to_string))
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value, PlatformError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PlatformError::Status {
            status: status.as_u16(),
            body,
        });
    }
    let text = response
        .text()
        .await
        .map_err(|e| PlatformError::Transport(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| PlatformError::Decode(e.to_string()))
}

#[async_trait]
impl PlatformEvaluator for XPlatformClient {
    async fn evaluate_note(&self, post_id: &str, note_text: &str) -> Result<Value, PlatformError> {
        let body = json!({"note_text": note_text, "post_id": post_id});
        let mut not_found = Vec::new();

        for url in &self.evaluate_urls {
            let response = self.post_json(url, &body).await?;
            if response.status() == reqwest::StatusCode::NOT_FOUND {
                debug!(url = %url, "evaluate endpoint not found, trying next");
                not_found.push(url.clone());
                continue;
            }
            return read_json(response).await;
        }

        warn!(tried = ?not_found, "no evaluate endpoint answered");
        Err(PlatformError::Unavailable(format!(
            "no evaluate endpoint found (tried {})",
            not_found.join(", ")
        )))
    }
}

#[async_trait]
impl PlatformSubmitter for XPlatformClient {
    async fn submit_note(&self, submission: &NoteSubmission) -> Result<Value, PlatformError> {
        let body =
            serde_json::to_value(submission).map_err(|e| PlatformError::Decode(e.to_string()))?;
        let response = self.post_json(&self.submit_url, &body).await?;
        let json = read_json(response).await?;
        info!(
            post_id = %submission.post_id,
            test_mode = submission.test_mode,
            "note submitted"
        );
        Ok(json)
    }
}
