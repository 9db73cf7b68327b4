//! Trusted Types Helper HTML
//!
//! Fragment inspection and sanitization built on html5ever.
//! Both are consumed by policy synthesis through narrow traits so callers can
//! substitute their own (for example a sanitizer living in another process).

mod inspector;
mod sanitizer;

pub use inspector::{FragmentInspector, FragmentSummary, HtmlInspector, InspectorConfig};
pub use sanitizer::{AllowlistSanitizer, Sanitizer, SanitizerConfig};

use std::io::Read;
use std::time::Duration;

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::RcDom;

/// Parse markup into an `RcDom`. html5ever wraps bare fragments in implied
/// `html`/`head`/`body` elements; the leading doctype keeps the parser in
/// no-quirks mode and out of the missing-doctype error path.
pub(crate) fn parse_dom(html: &str) -> std::io::Result<RcDom> {
    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut "<!DOCTYPE html>".as_bytes().chain(html.as_bytes()))
}

/// Fragment inspection error
#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error("Fragment of {len} bytes exceeds the {limit} byte limit")]
    TooLarge { len: usize, limit: usize },

    #[error("Malformed markup: {0}")]
    Malformed(String),

    #[error("Failed to read fragment: {0}")]
    Read(#[from] std::io::Error),
}

/// Sanitizer round-trip error
#[derive(Debug, thiserror::Error)]
pub enum SanitizeError {
    #[error("Sanitizer rejected input: {0}")]
    Rejected(String),

    #[error("Sanitizer unavailable: {0}")]
    Unavailable(String),

    #[error("Sanitizer did not answer within {0:?}")]
    TimedOut(Duration),

    #[error("Failed to read markup: {0}")]
    Read(#[from] std::io::Error),
}
