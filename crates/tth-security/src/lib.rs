//! Trusted Types Helper: security primitives
//!
//! Web-platform vocabulary shared by the analysis pipeline.
//!
//! Features:
//! - Violation categories and the DOM sinks that produce them
//! - Content Security Policy parsing and the report-only header check
//! - Origin extraction for URL allowlists

pub mod csp;
pub mod origin;
pub mod trusted_types;

pub use csp::{ContentSecurityPolicy, HeaderRule, trusted_types_header_rule};
pub use origin::allowlist_origin;
pub use trusted_types::{CategoryError, DomSink, ViolationCategory};
