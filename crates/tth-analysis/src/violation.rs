//! Violations
//!
//! The report the transport delivers and the immutable record built from it.

use serde::{Deserialize, Serialize};
use tth_security::ViolationCategory;

use crate::root_cause::INTERNAL_FRAME_COUNT;
use crate::stack_trace::{self, StackTrace, TraceLine};

/// One violation as delivered by the in-page hook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationReport {
    /// `Markup`/`Script`/`ScriptUrl`; `HTML` and `URL` are accepted too
    pub category: String,
    pub payload: String,
    pub raw_stack_trace: String,
    pub document_url: String,
    pub observed_at_ms: u64,
}

/// A detected violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub payload: String,
    /// `None` when the reported category was not recognized
    pub category: Option<ViolationCategory>,
    pub observed_at: u64,
    pub stack_trace: StackTrace,
    pub document_url: String,
    pub source_file: Option<String>,
}

impl Violation {
    pub fn new(
        payload: impl Into<String>,
        category: Option<ViolationCategory>,
        observed_at: u64,
        stack_trace: StackTrace,
        document_url: impl Into<String>,
    ) -> Self {
        let source_file = match stack_trace.get(INTERNAL_FRAME_COUNT) {
            Some(TraceLine::Frame(frame)) => Some(frame.script_url.clone()),
            _ => None,
        };

        Self {
            payload: payload.into(),
            category,
            observed_at,
            stack_trace,
            document_url: document_url.into(),
            source_file,
        }
    }

    /// Build a violation from a transport report, parsing its stack.
    pub fn from_report(report: ViolationReport) -> Self {
        let category = match report.category.parse::<ViolationCategory>() {
            Ok(category) => Some(category),
            Err(err) => {
                tracing::warn!("{}; clustering without a category", err);
                None
            }
        };
        let stack_trace = stack_trace::parse(&report.raw_stack_trace);

        Self::new(report.payload, category, report.observed_at_ms, stack_trace, report.document_url)
    }
}
