//! Fragment inspection
//!
//! Enumerates the element and attribute names used anywhere in a markup
//! fragment.

use std::collections::BTreeSet;

use markup5ever_rcdom::{Handle, NodeData};
use serde::{Deserialize, Serialize};

use crate::{InspectError, parse_dom};

/// Elements html5ever synthesizes around a bare fragment.
const IMPLIED_WRAPPERS: [&str; 3] = ["html", "head", "body"];

/// Distinct tag and attribute names found in a fragment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentSummary {
    pub tags: BTreeSet<String>,
    pub attributes: BTreeSet<String>,
}

/// Anything that can list the tags and attributes of a markup fragment.
pub trait FragmentInspector {
    fn inspect(&self, html: &str) -> Result<FragmentSummary, InspectError>;
}

/// Inspector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectorConfig {
    /// Fragments longer than this are reported as unparsable
    pub max_fragment_bytes: usize,
    /// Treat any html5ever parse error as unparsable
    pub strict: bool,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            max_fragment_bytes: 1024 * 1024, // 1MB
            strict: false,
        }
    }
}

/// html5ever-backed inspector
#[derive(Debug, Clone, Default)]
pub struct HtmlInspector {
    config: InspectorConfig,
}

impl HtmlInspector {
    pub fn new(config: InspectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InspectorConfig {
        &self.config
    }
}

impl FragmentInspector for HtmlInspector {
    fn inspect(&self, html: &str) -> Result<FragmentSummary, InspectError> {
        if html.len() > self.config.max_fragment_bytes {
            return Err(InspectError::TooLarge {
                len: html.len(),
                limit: self.config.max_fragment_bytes,
            });
        }

        let dom = parse_dom(html)?;

        if self.config.strict {
            if let Some(first) = dom.errors.borrow().first() {
                return Err(InspectError::Malformed(first.to_string()));
            }
        }

        let mut summary = FragmentSummary::default();
        collect_names(&dom.document, &mut summary);

        for wrapper in IMPLIED_WRAPPERS {
            if !mentions_tag(html, wrapper) {
                summary.tags.remove(wrapper);
            }
        }

        tracing::debug!(
            "Inspected fragment: {} tags, {} attributes",
            summary.tags.len(),
            summary.attributes.len()
        );
        Ok(summary)
    }
}

/// Walk the tree without recursion; adversarial fragments can nest deeply.
fn collect_names(root: &Handle, summary: &mut FragmentSummary) {
    let mut pending = vec![root.clone()];

    while let Some(handle) = pending.pop() {
        if let NodeData::Element { name, attrs, template_contents, .. } = &handle.data {
            summary.tags.insert(name.local.to_string());
            for attr in attrs.borrow().iter() {
                let attr_name = match &attr.name.prefix {
                    Some(prefix) => format!("{}:{}", prefix, attr.name.local),
                    None => attr.name.local.to_string(),
                };
                summary.attributes.insert(attr_name);
            }
            if let Some(contents) = template_contents.borrow().as_ref() {
                pending.push(contents.clone());
            }
        }
        pending.extend(handle.children.borrow().iter().cloned());
    }
}

/// True when `html` contains a start tag named `tag`, ASCII case-insensitively.
fn mentions_tag(html: &str, tag: &str) -> bool {
    let bytes = html.as_bytes();
    let mut from = 0;

    while let Some(offset) = bytes[from..].iter().position(|&b| b == b'<') {
        let start = from + offset + 1;
        let end = start + tag.len();
        if end <= bytes.len() && bytes[start..end].eq_ignore_ascii_case(tag.as_bytes()) {
            match bytes.get(end) {
                None => return true,
                Some(b) if b.is_ascii_whitespace() || *b == b'>' || *b == b'/' => return true,
                _ => {}
            }
        }
        from = start;
    }
    false
}
