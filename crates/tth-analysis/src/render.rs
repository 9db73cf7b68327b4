//! Default policy rendering
//!
//! Turns an [`AllowlistPolicy`] into the script an engineer pastes into their
//! page to install a matching Trusted Types default policy.

use serde::{Deserialize, Serialize};

use crate::policy::AllowlistPolicy;

/// Indentation for the rendered script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indent {
    Tab,
    Spaces(usize),
}

impl Default for Indent {
    fn default() -> Self {
        Self::Spaces(2)
    }
}

/// `'a', 'b'` with JS single-quote escaping. Tabs are escaped so the
/// indentation pass never rewrites a payload.
fn js_list<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    items
        .into_iter()
        .map(|item| {
            let escaped = item
                .replace('\\', "\\\\")
                .replace('\'', "\\'")
                .replace('\n', "\\n")
                .replace('\t', "\\t")
                .replace('\r', "\\r");
            format!("'{}'", escaped)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

impl AllowlistPolicy {
    /// Render the default policy script.
    pub fn render_script(&self, indent: Indent) -> String {
        let markup = &self.markup;
        let lines = [
            format!("const urlAllowlist = [{}];", js_list(&self.url_origins)),
            format!("const scriptAllowlist = [{}];", js_list(&self.scripts)),
            format!("const htmlAllowlist = [{}];", js_list(&markup.unparsable_fragments)),
            "window.trustedTypes.createPolicy('default', {".to_string(),
            "\tcreateScriptURL: (input) => {".to_string(),
            "\t\tif (urlAllowlist.some(allowlist => input.startsWith(allowlist))) {".to_string(),
            "\t\t\treturn input;".to_string(),
            "\t\t} else {".to_string(),
            "\t\t\treturn null;".to_string(),
            "\t\t}".to_string(),
            "\t},\n".to_string(),
            "\tcreateScript: (input) => {".to_string(),
            "\t\tif (scriptAllowlist.includes(input)) {".to_string(),
            "\t\t\treturn input;".to_string(),
            "\t\t} else {".to_string(),
            "\t\t\treturn null;".to_string(),
            "\t\t}".to_string(),
            "\t},\n".to_string(),
            "\tcreateHTML: (input) => {".to_string(),
            "\t\tif (htmlAllowlist.includes(input)) {".to_string(),
            "\t\t\treturn input;".to_string(),
            "\t\t} else {".to_string(),
            format!(
                "\t\t\treturn DOMPurify.sanitize(input, {{ADD_TAGS: [{}], ADD_ATTR: [{}]}});",
                js_list(&markup.tags),
                js_list(&markup.attributes)
            ),
            "\t\t}".to_string(),
            "\t},\n});".to_string(),
        ];

        let script = lines.join("\n");
        match indent {
            Indent::Tab => script,
            Indent::Spaces(n) => script.replace('\t', &" ".repeat(n)),
        }
    }
}
