//! Content Security Policy
//!
//! CSP parsing and the report-only Trusted Types header check.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// CSP header names
pub const CSP_HEADER: &str = "content-security-policy";
pub const CSP_REPORT_ONLY_HEADER: &str = "Content-Security-Policy-Report-Only";

/// CSP directive names
pub const REQUIRE_TRUSTED_TYPES_FOR: &str = "require-trusted-types-for";
pub const TRUSTED_TYPES: &str = "trusted-types";

/// Sink group keyword for `require-trusted-types-for`
pub const SCRIPT_KEYWORD: &str = "'script'";

/// Parsed CSP header
#[derive(Debug, Clone, Default)]
pub struct ContentSecurityPolicy {
    pub directives: HashMap<String, Vec<String>>,
}

impl ContentSecurityPolicy {
    pub fn new() -> Self { Self::default() }

    /// Parse CSP header. Later duplicates of a directive are ignored, as
    /// browsers do.
    pub fn parse(header: &str) -> Self {
        let mut policy = Self::new();

        for directive_str in header.split(';') {
            let mut parts = directive_str.split_whitespace();
            let Some(name) = parts.next() else {
                continue;
            };

            let values: Vec<String> = parts.map(str::to_string).collect();
            policy.directives.entry(name.to_ascii_lowercase()).or_insert(values);
        }

        policy
    }

    /// Get directive values
    pub fn get(&self, directive: &str) -> Option<&Vec<String>> {
        self.directives.get(directive)
    }

    /// True when script sinks must receive trusted objects.
    pub fn requires_trusted_types_for_script(&self) -> bool {
        self.get(REQUIRE_TRUSTED_TYPES_FOR)
            .map(|v| v.iter().any(|s| s == SCRIPT_KEYWORD))
            .unwrap_or(false)
    }
}

/// A header modification to apply to a top-level document response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderRule {
    pub header: String,
    pub value: String,
    pub append: bool,
}

/// Decide whether a response needs the report-only Trusted Types header.
///
/// Returns `None` when an enforced CSP header already requires Trusted Types
/// for scripts; otherwise returns the rule that appends the report-only
/// directive so violations reach the default policy.
pub fn trusted_types_header_rule<'a, I>(headers: I) -> Option<HeaderRule>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let enforced = headers.into_iter().any(|(name, value)| {
        name.eq_ignore_ascii_case(CSP_HEADER)
            && ContentSecurityPolicy::parse(value).requires_trusted_types_for_script()
    });
    if enforced {
        return None;
    }

    Some(HeaderRule {
        header: CSP_REPORT_ONLY_HEADER.to_string(),
        value: format!("{} {};", REQUIRE_TRUSTED_TYPES_FOR, SCRIPT_KEYWORD),
        append: true,
    })
}
