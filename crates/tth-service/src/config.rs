//! Service Configuration

use std::path::Path;

use serde::{Deserialize, Serialize};
use tth_analysis::{Indent, SynthesisConfig};
use tth_html::{InspectorConfig, SanitizerConfig};

use crate::ServiceError;

/// Service configuration options
///
/// Every section is optional in the JSON file; missing keys keep their
/// defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Fragment inspection limits
    pub inspector: InspectorConfig,

    /// Local sanitizer allowlists
    pub sanitizer: SanitizerConfig,

    /// Sanitizer timeout and markup merge mode
    pub synthesis: SynthesisConfig,

    /// Indentation of the rendered default policy
    pub indent: Indent,
}

impl ServiceConfig {
    /// Load from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ServiceError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(err) => return Err(ServiceError::ConfigRead(err)),
        };

        let config = serde_json::from_str(&text).map_err(ServiceError::ConfigParse)?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}
