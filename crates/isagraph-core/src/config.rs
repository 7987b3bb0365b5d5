//! # Mapping Configuration
//!
//! Run-level switches of a mapping session, loadable from TOML.

use crate::IsaError;
use crate::primitives::DEFAULT_NAMESPACE;
use serde::{Deserialize, Serialize};

/// Settings of one mapping run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Namespace of accession keys when the study has no accession.
    pub namespace_fallback: String,
    /// Treat advisory constraint violations as errors.
    pub strict: bool,
    /// Record columns that match no grammar field as warnings.
    pub report_unmatched_headers: bool,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            namespace_fallback: DEFAULT_NAMESPACE.to_string(),
            strict: false,
            report_unmatched_headers: true,
        }
    }
}

impl MappingConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, IsaError> {
        let config: Self = toml::from_str(text).map_err(|e| IsaError::Config(e.to_string()))?;
        if config.namespace_fallback.trim().is_empty() {
            return Err(IsaError::Config(
                "namespace_fallback must not be empty".to_string(),
            ));
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}
