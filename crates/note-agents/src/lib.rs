//! Live transports and process plumbing for the note admission pipeline.
//!
//! - [`clients`]: Grok oracle and X platform HTTP clients
//! - [`url_probe`]: liveness checks for repaired sources
//! - [`config`]: environment plus TOML overlay
//! - [`runtime`]: wiring of admission-core components
//! - [`telemetry`]: tracing setup and the JSONL run log

pub mod clients;
pub mod config;
pub mod runtime;
pub mod telemetry;
pub mod url_probe;
