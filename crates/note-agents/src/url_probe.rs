//! HTTP liveness probe for source URLs proposed during repair.

use std::time::Duration;

use admission_core::admission::UrlProbe;
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use crate::clients::ClientError;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; NoteAgentsBot/1.0)";

/// HEAD first, then GET for servers that reject HEAD. Only 200 counts as live.
pub struct HttpUrlProbe {
    client: reqwest::Client,
}

impl HttpUrlProbe {
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl UrlProbe for HttpUrlProbe {
    async fn is_live(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(resp) if resp.status() == StatusCode::OK => return true,
            Ok(resp) => debug!(url, status = %resp.status(), "HEAD not OK, retrying with GET"),
            Err(e) => debug!(url, error = %e, "HEAD failed, retrying with GET"),
        }
        match self.client.get(url).send().await {
            Ok(resp) => resp.status() == StatusCode::OK,
            Err(e) => {
                debug!(url, error = %e, "GET failed");
                false
            }
        }
    }
}
