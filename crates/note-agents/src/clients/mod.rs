//! HTTP transports behind the admission-core seams.

pub mod grok;
pub mod x_platform;

pub use grok::GrokOracle;
pub use x_platform::{extract_post_id, XPlatformClient};

use thiserror::Error;

/// Errors constructing a client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("missing credential: set {0}")]
    MissingCredential(&'static str),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}
