//! HTML Sanitization
//!
//! The sanitizer round trip used by policy synthesis, plus a local
//! allowlist sanitizer that walks the html5ever tree.

use std::collections::{HashMap, HashSet};

use markup5ever_rcdom::{Handle, NodeData};
use serde::{Deserialize, Serialize};

use crate::{SanitizeError, parse_dom};

/// A sanitizer reachable through an asynchronous request/response exchange.
///
/// Implementations may live in another execution context; callers bound the
/// wait themselves.
#[allow(async_fn_in_trait)]
pub trait Sanitizer {
    async fn sanitize(&self, html: &str) -> Result<String, SanitizeError>;
}

/// Sanitizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizerConfig {
    pub allowed_elements: HashSet<String>,
    pub allowed_attributes: HashMap<String, HashSet<String>>,
    pub drop_elements: HashSet<String>,
    pub drop_attributes: HashSet<String>,
    pub allow_custom_elements: bool,
    pub allow_comments: bool,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        let mut config = Self {
            allowed_elements: HashSet::new(), allowed_attributes: HashMap::new(),
            drop_elements: HashSet::new(), drop_attributes: HashSet::new(),
            allow_custom_elements: false, allow_comments: false,
        };

        // Default safe elements
        for tag in ["a", "abbr", "b", "blockquote", "br", "code", "div", "em", "h1", "h2", "h3",
                    "h4", "h5", "h6", "hr", "i", "img", "li", "ol", "p", "pre", "s", "span", "strong",
                    "sub", "sup", "table", "tbody", "td", "tfoot", "th", "thead", "tr", "u", "ul"] {
            config.allowed_elements.insert(tag.into());
        }

        // Dangerous elements, removed with their content
        for tag in ["script", "style", "iframe", "frame", "frameset", "object", "embed",
                    "applet", "form", "input", "button", "select", "textarea", "base", "meta", "link",
                    "template", "noscript"] {
            config.drop_elements.insert(tag.into());
        }

        // Dangerous attributes
        for attr in ["formaction", "xlink:href", "srcdoc", "style"] {
            config.drop_attributes.insert(attr.into());
        }

        // Safe global attributes
        let global_attrs: HashSet<String> = ["class", "id", "title", "lang", "dir", "hidden", "tabindex"]
            .iter().map(|s| s.to_string()).collect();
        config.allowed_attributes.insert("*".into(), global_attrs);

        let a_attrs: HashSet<String> = ["href", "target", "rel"].iter().map(|s| s.to_string()).collect();
        config.allowed_attributes.insert("a".into(), a_attrs);

        let img_attrs: HashSet<String> = ["src", "alt", "width", "height"].iter().map(|s| s.to_string()).collect();
        config.allowed_attributes.insert("img".into(), img_attrs);

        config
    }
}

/// Elements serialized without a closing tag
const VOID_ELEMENTS: [&str; 13] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];

const WRAPPERS: [&str; 3] = ["html", "head", "body"];

/// Local allowlist sanitizer
#[derive(Debug, Clone, Default)]
pub struct AllowlistSanitizer {
    config: SanitizerConfig,
}

enum Step {
    Visit(Handle),
    Close(String),
}

impl AllowlistSanitizer {
    pub fn new(config: SanitizerConfig) -> Self { Self { config } }

    /// Sanitize markup, returning the serialized safe subset.
    pub fn sanitize_str(&self, html: &str) -> Result<String, SanitizeError> {
        let dom = parse_dom(html)?;
        let mut output = String::new();
        let mut steps = vec![Step::Visit(dom.document.clone())];

        while let Some(step) = steps.pop() {
            let handle = match step {
                Step::Close(tag) => {
                    output.push_str("</");
                    output.push_str(&tag);
                    output.push('>');
                    continue;
                }
                Step::Visit(handle) => handle,
            };

            match &handle.data {
                NodeData::Document => push_children(&mut steps, &handle),
                NodeData::Text { contents } => escape_text(&contents.borrow(), &mut output),
                NodeData::Comment { contents } if self.config.allow_comments => {
                    output.push_str("<!--");
                    output.push_str(&contents.replace("--", ""));
                    output.push_str("-->");
                }
                NodeData::Element { name, attrs, .. } => {
                    let tag = (*name.local).to_ascii_lowercase();

                    if self.config.drop_elements.contains(&tag) {
                        continue;
                    }
                    if WRAPPERS.contains(&tag.as_str()) || !self.is_element_allowed(&tag) {
                        // Keep the content, lose the element.
                        push_children(&mut steps, &handle);
                        continue;
                    }

                    output.push('<');
                    output.push_str(&tag);
                    for attr in attrs.borrow().iter() {
                        let attr_name = match &attr.name.prefix {
                            Some(prefix) => format!("{}:{}", prefix, attr.name.local),
                            None => (*attr.name.local).to_ascii_lowercase(),
                        };
                        if !self.is_attribute_allowed(&attr_name, &tag) {
                            continue;
                        }
                        output.push(' ');
                        output.push_str(&attr_name);
                        output.push_str("=\"");
                        output.push_str(&sanitize_attribute_value(&attr_name, &attr.value));
                        output.push('"');
                    }
                    output.push('>');

                    if !VOID_ELEMENTS.contains(&tag.as_str()) {
                        steps.push(Step::Close(tag));
                        push_children(&mut steps, &handle);
                    }
                }
                _ => {}
            }
        }

        tracing::debug!("Sanitized {} bytes into {} bytes", html.len(), output.len());
        Ok(output)
    }

    fn is_element_allowed(&self, tag: &str) -> bool {
        self.config.allowed_elements.contains(tag)
            || (self.config.allow_custom_elements && tag.contains('-'))
    }

    fn is_attribute_allowed(&self, attr: &str, element: &str) -> bool {
        if self.config.drop_attributes.contains(attr) { return false; }
        if attr.starts_with("on") { return false; } // Event handlers
        if let Some(allowed) = self.config.allowed_attributes.get(element) {
            if allowed.contains(attr) { return true; }
        }
        if let Some(global) = self.config.allowed_attributes.get("*") {
            return global.contains(attr);
        }
        false
    }
}

impl Sanitizer for AllowlistSanitizer {
    async fn sanitize(&self, html: &str) -> Result<String, SanitizeError> {
        self.sanitize_str(html)
    }
}

/// Children are pushed in reverse so they pop in document order.
fn push_children(steps: &mut Vec<Step>, handle: &Handle) {
    steps.extend(handle.children.borrow().iter().rev().cloned().map(Step::Visit));
}

fn escape_text(text: &str, output: &mut String) {
    for c in text.chars() {
        match c {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            c => output.push(c),
        }
    }
}

fn sanitize_attribute_value(attr: &str, value: &str) -> String {
    if attr == "href" || attr == "src" {
        let lower: String = value.chars()
            .filter(|c| !c.is_whitespace() && !c.is_control())
            .collect::<String>()
            .to_ascii_lowercase();
        if lower.starts_with("javascript:") || lower.starts_with("data:text/html") ||
           lower.starts_with("vbscript:") {
            return String::new();
        }
    }
    value.replace('&', "&amp;").replace('"', "&quot;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitize(html: &str) -> String {
        AllowlistSanitizer::default().sanitize_str(html).unwrap()
    }

    #[test]
    fn test_strips_event_handler() {
        assert_eq!(sanitize("<img src=x onerror=alert(1)//>"), r#"<img src="x">"#);
    }

    #[test]
    fn test_mixed_case_names() {
        assert_eq!(sanitize("<DIV ID=a OnClick=x()><B>t</B></DIV>"), r#"<div id="a"><b>t</b></div>"#);
        assert_eq!(sanitize("<SVG><SCRIPT>1</SCRIPT></SVG>"), "");
    }

    #[test]
    fn test_keeps_safe_markup() {
        assert_eq!(sanitize("<p>test</p>"), "<p>test</p>");
        assert_eq!(sanitize(r#"<a href="/docs" class="x">docs</a>"#), r#"<a href="/docs" class="x">docs</a>"#);
    }

    #[test]
    fn test_drops_script_with_content() {
        assert_eq!(sanitize("<script>alert(1)</script><b>hi</b>"), "<b>hi</b>");
    }

    #[test]
    fn test_unwraps_unknown_elements() {
        assert_eq!(sanitize("<section><p>x</p></section>"), "<p>x</p>");
    }

    #[test]
    fn test_neutralizes_javascript_urls() {
        assert_eq!(sanitize(r#"<a href=" JaVa script:alert(1)">x</a>"#), r#"<a href="">x</a>"#);
    }

    #[test]
    fn test_escapes_text() {
        assert_eq!(sanitize("a &lt;b&gt; c"), "a &lt;b&gt; c");
    }

    #[test]
    fn test_async_round_trip() {
        let out = smol::block_on(AllowlistSanitizer::default().sanitize("<p onclick=x()>t</p>")).unwrap();
        assert_eq!(out, "<p>t</p>");
    }
}
