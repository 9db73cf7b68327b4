//! Stack trace parsing
//!
//! Turns the free-text `Error.stack` captured by the in-page hook into an
//! ordered list of call sites. Lines that do not look like a call site are
//! kept verbatim, so every input line yields exactly one element.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// `at fn.name (script.js:12:34)`
static NAMED_CALL_SITE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"at\s+(\S+)\s+\((\S+):([0-9]+):([0-9]+)\)").expect("valid named call site pattern")
});

/// `at https://host/path.js:12:34`
static ANONYMOUS_CALL_SITE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"at https://(.+):([0-9]+):([0-9]+)$").expect("valid anonymous call site pattern")
});

/// One parseable call site
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    pub script_url: String,
    pub line_number: u32,
    pub column_number: u32,
}

impl StackFrame {
    /// `script.js:12:34`
    pub fn location(&self) -> String {
        format!("{}:{}:{}", self.script_url, self.line_number, self.column_number)
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.function_name {
            Some(name) => write!(f, "{} ({})", name, self.location()),
            None => f.write_str(&self.location()),
        }
    }
}

/// A stack line: either a structured frame or the raw text it came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TraceLine {
    Frame(StackFrame),
    Opaque(String),
}

impl TraceLine {
    pub fn as_frame(&self) -> Option<&StackFrame> {
        match self {
            Self::Frame(frame) => Some(frame),
            Self::Opaque(_) => None,
        }
    }
}

/// Ordered call sites, outermost (the interception point) first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackTrace {
    pub frames: Vec<TraceLine>,
}

impl StackTrace {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TraceLine> {
        self.frames.get(index)
    }
}

impl From<Vec<TraceLine>> for StackTrace {
    fn from(frames: Vec<TraceLine>) -> Self {
        Self { frames }
    }
}

/// Parse a raw stack string. Never fails; the empty string is one opaque line.
pub fn parse(raw: &str) -> StackTrace {
    raw.split('\n').map(parse_line).collect::<Vec<_>>().into()
}

fn parse_line(line: &str) -> TraceLine {
    if let Some(frame) = named_call_site(line).or_else(|| anonymous_call_site(line)) {
        return TraceLine::Frame(frame);
    }
    TraceLine::Opaque(line.to_string())
}

fn named_call_site(line: &str) -> Option<StackFrame> {
    let caps = NAMED_CALL_SITE.captures(line)?;
    let function_name = caps[1].strip_prefix("at ").unwrap_or(&caps[1]).trim();

    Some(StackFrame {
        function_name: Some(function_name.to_string()),
        script_url: caps[2].to_string(),
        line_number: caps[3].parse().ok()?,
        column_number: caps[4].parse().ok()?,
    })
}

fn anonymous_call_site(line: &str) -> Option<StackFrame> {
    let caps = ANONYMOUS_CALL_SITE.captures(line)?;

    Some(StackFrame {
        function_name: None,
        script_url: caps[1].to_string(),
        line_number: caps[2].parse().ok()?,
        column_number: caps[3].parse().ok()?,
    })
}
