//! Trusted Types
//!
//! Violation categories and the DOM sinks that raise them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of value a guarded sink expected a trusted object for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ViolationCategory {
    #[serde(alias = "HTML")]
    Markup,
    Script,
    #[serde(alias = "URL")]
    ScriptUrl,
}

impl ViolationCategory {
    pub const ALL: [ViolationCategory; 3] = [Self::Markup, Self::Script, Self::ScriptUrl];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markup => "Markup",
            Self::Script => "Script",
            Self::ScriptUrl => "ScriptUrl",
        }
    }
}

impl fmt::Display for ViolationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViolationCategory {
    type Err = CategoryError;

    /// Accepts both the canonical names and the `HTML`/`URL` labels the
    /// in-page hook reports.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Markup" | "HTML" => Ok(Self::Markup),
            "Script" => Ok(Self::Script),
            "ScriptUrl" | "URL" => Ok(Self::ScriptUrl),
            other => Err(CategoryError::Unknown(other.to_string())),
        }
    }
}

/// Category parse error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CategoryError {
    #[error("unknown violation category '{0}'")]
    Unknown(String),
}

/// DOM sink types that require trusted types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomSink {
    InnerHtml, OuterHtml, InsertAdjacentHtml,
    ScriptText, ScriptSrc,
    IframeSrc, IframeSrcdoc,
    EvalScript, SetTimeout, SetInterval,
    DocumentWrite, DocumentWriteLn,
}

impl DomSink {
    pub fn category(&self) -> ViolationCategory {
        match self {
            Self::InnerHtml | Self::OuterHtml | Self::InsertAdjacentHtml |
            Self::IframeSrcdoc | Self::DocumentWrite | Self::DocumentWriteLn => ViolationCategory::Markup,
            Self::ScriptText | Self::EvalScript | Self::SetTimeout | Self::SetInterval => ViolationCategory::Script,
            Self::ScriptSrc | Self::IframeSrc => ViolationCategory::ScriptUrl,
        }
    }

    /// DOM-facing name of the sink, as shown in browser violation reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::InnerHtml => "Element innerHTML",
            Self::OuterHtml => "Element outerHTML",
            Self::InsertAdjacentHtml => "Element insertAdjacentHTML",
            Self::ScriptText => "HTMLScriptElement text",
            Self::ScriptSrc => "HTMLScriptElement src",
            Self::IframeSrc => "HTMLIFrameElement src",
            Self::IframeSrcdoc => "HTMLIFrameElement srcdoc",
            Self::EvalScript => "eval",
            Self::SetTimeout => "setTimeout",
            Self::SetInterval => "setInterval",
            Self::DocumentWrite => "Document write",
            Self::DocumentWriteLn => "Document writeln",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_category() {
        assert_eq!(DomSink::InnerHtml.category(), ViolationCategory::Markup);
        assert_eq!(DomSink::SetTimeout.category(), ViolationCategory::Script);
        assert_eq!(DomSink::ScriptSrc.category(), ViolationCategory::ScriptUrl);
    }

    #[test]
    fn test_sink_names() {
        assert_eq!(DomSink::InnerHtml.name(), "Element innerHTML");
        assert_eq!(DomSink::ScriptSrc.name(), "HTMLScriptElement src");
        assert_eq!(DomSink::EvalScript.name(), "eval");
    }

    #[test]
    fn test_category_aliases() {
        assert_eq!("HTML".parse::<ViolationCategory>().unwrap(), ViolationCategory::Markup);
        assert_eq!("URL".parse::<ViolationCategory>().unwrap(), ViolationCategory::ScriptUrl);
        assert_eq!("Script".parse::<ViolationCategory>().unwrap(), ViolationCategory::Script);
        assert_eq!(
            "Style".parse::<ViolationCategory>(),
            Err(CategoryError::Unknown("Style".into()))
        );
    }

    #[test]
    fn test_category_serde_alias() {
        let parsed: ViolationCategory = serde_json::from_str("\"HTML\"").unwrap();
        assert_eq!(parsed, ViolationCategory::Markup);
        assert_eq!(serde_json::to_string(&ViolationCategory::ScriptUrl).unwrap(), "\"ScriptUrl\"");
    }
}
