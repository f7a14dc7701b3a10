//! Process configuration: environment variables plus an optional TOML overlay.
//!
//! Secrets only ever come from the environment. The TOML file carries
//! endpoints, paths and the `[engine.*]` tables of [`EngineConfig`].

use std::path::{Path, PathBuf};

use admission_core::EngineConfig;
use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_GROK_URL: &str = "https://api.x.ai/v1/chat/completions";
pub const DEFAULT_GROK_MODEL: &str = "grok-4-fast-reasoning";
pub const DEFAULT_SUBMIT_URL: &str = "https://api.x.com/2/notes";
pub const DEFAULT_EVALUATE_URLS: &[&str] = &[
    "https://api.x.com/2/evaluate_note",
    "https://api.twitter.com/2/evaluate_note",
];
pub const DEFAULT_POSTS_URL: &str = "https://api.x.com/2/tweets";
pub const DEFAULT_TELEMETRY_PATH: &str = ".note-telemetry.jsonl";

/// Language oracle endpoint.
#[derive(Debug, Clone)]
pub struct GrokSettings {
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
}

/// Platform endpoints and bearer credential.
#[derive(Debug, Clone)]
pub struct XSettings {
    pub bearer_token: Option<String>,
    pub submit_url: String,
    /// Tried in order; a 404 moves on to the next one.
    pub evaluate_urls: Vec<String>,
    pub posts_url: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub grok: GrokSettings,
    pub x: XSettings,
    pub engine: EngineConfig,
    pub telemetry_path: PathBuf,
    /// JSON snapshot of the note store, loaded before and saved after a run.
    pub store_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct GrokOverlay {
    api_url: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct XOverlay {
    submit_url: Option<String>,
    evaluate_url: Option<String>,
    posts_url: Option<String>,
}

/// Shape of the `--config` TOML file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileOverlay {
    telemetry_path: Option<PathBuf>,
    store_path: Option<PathBuf>,
    grok: GrokOverlay,
    x: XOverlay,
    engine: Option<EngineConfig>,
}

impl AppConfig {
    /// Read the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut evaluate_urls = Vec::new();
        if let Some(url) = var("X_EVALUATE_NOTE_URL") {
            evaluate_urls.push(url.trim_end_matches('/').to_string());
        }
        evaluate_urls.extend(DEFAULT_EVALUATE_URLS.iter().map(|u| u.to_string()));
        evaluate_urls.dedup();

        Self {
            grok: GrokSettings {
                api_key: var("GROK_API_KEY").or_else(|| var("XAI_API_KEY")),
                api_url: var("GROK_API_URL").unwrap_or_else(|| DEFAULT_GROK_URL.into()),
                model: var("GROK_MODEL").unwrap_or_else(|| DEFAULT_GROK_MODEL.into()),
            },
            x: XSettings {
                bearer_token: var("X_BEARER_TOKEN").or_else(|| var("X_API_BEARER_TOKEN")),
                submit_url: var("X_COMMUNITY_NOTES_SUBMIT_URL")
                    .unwrap_or_else(|| DEFAULT_SUBMIT_URL.into()),
                evaluate_urls,
                posts_url: DEFAULT_POSTS_URL.into(),
            },
            engine: EngineConfig::default(),
            telemetry_path: PathBuf::from(DEFAULT_TELEMETRY_PATH),
            store_path: None,
        }
    }

    /// Apply a TOML overlay file on top of this configuration.
    pub fn with_file(self, path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        self.with_toml(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Apply TOML overlay text on top of this configuration.
    pub fn with_toml(mut self, raw: &str) -> Result<Self> {
        let overlay: FileOverlay = toml::from_str(raw).context("Failed to parse TOML")?;

        if let Some(url) = overlay.grok.api_url {
            self.grok.api_url = url;
        }
        if let Some(model) = overlay.grok.model {
            self.grok.model = model;
        }
        if let Some(url) = overlay.x.submit_url {
            self.x.submit_url = url;
        }
        if let Some(url) = overlay.x.evaluate_url {
            let url = url.trim_end_matches('/').to_string();
            self.x.evaluate_urls.retain(|u| *u != url);
            self.x.evaluate_urls.insert(0, url);
        }
        if let Some(url) = overlay.x.posts_url {
            self.x.posts_url = url;
        }
        if let Some(engine) = overlay.engine {
            self.engine = engine;
        }
        if let Some(path) = overlay.telemetry_path {
            self.telemetry_path = path;
        }
        if overlay.store_path.is_some() {
            self.store_path = overlay.store_path;
        }
        Ok(self)
    }
}
