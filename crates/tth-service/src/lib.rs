//! Trusted Types Helper Service
//!
//! The background half of the helper: receives violation reports and panel
//! queries as messages, keeps per-tab state, and answers with clusters,
//! category views, default-policy status and synthesized policies.

pub mod config;
pub mod message;
pub mod service;

pub use config::ServiceConfig;
pub use message::{DefaultPolicyStatus, HttpHeader, Message, Response};
pub use service::AnalysisService;

/// Service errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Malformed message: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Failed to read config: {0}")]
    ConfigRead(#[source] std::io::Error),

    #[error("Invalid config: {0}")]
    ConfigParse(#[source] serde_json::Error),
}
