//! Root cause extraction
//!
//! The in-page hook always contributes the same leading lines to a trace: the
//! `Error` header, `getStackTrace`, `createMessage`, and the policy callback
//! (`createHTML`, `createScript` or `createScriptURL`). The first frame after
//! them is the application call site that hit the sink.

use crate::stack_trace::{StackTrace, TraceLine};
use crate::violation::Violation;

/// Leading trace lines that belong to the interception layer.
pub const INTERNAL_FRAME_COUNT: usize = 4;

/// Root cause reported for traces too short to contain an application frame.
pub const NO_ROOT_CAUSE: &str = "No valid first stack frame";

/// The first line past the interception layer, if the trace reaches it.
pub fn first_valid_frame(trace: &StackTrace) -> Option<&TraceLine> {
    if trace.len() > INTERNAL_FRAME_COUNT {
        trace.get(INTERNAL_FRAME_COUNT)
    } else {
        None
    }
}

/// Canonical text for a trace's root cause.
pub fn root_cause_text(trace: &StackTrace) -> String {
    match first_valid_frame(trace) {
        None => NO_ROOT_CAUSE.to_string(),
        Some(TraceLine::Opaque(line)) => line.clone(),
        Some(TraceLine::Frame(frame)) => frame.to_string(),
    }
}

/// Whether two violations come from the same call site.
///
/// Structured frames compare by line and column only; the script URL is left
/// out so the same bundle served from different paths still matches. Category
/// and document URL are not considered.
pub fn same_root_cause(a: &Violation, b: &Violation) -> bool {
    match (first_valid_frame(&a.stack_trace), first_valid_frame(&b.stack_trace)) {
        (Some(TraceLine::Frame(x)), Some(TraceLine::Frame(y))) => {
            x.line_number == y.line_number && x.column_number == y.column_number
        }
        (Some(TraceLine::Opaque(x)), Some(TraceLine::Opaque(y))) => x == y,
        _ => false,
    }
}
