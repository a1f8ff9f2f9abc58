//! Codec configuration

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};

/// Default marker prefix
pub const DEFAULT_PREFIX: &str = "#";

/// Prefix used by the scene inspector
pub const INSPECTOR_PREFIX: &str = "$";

/// Configuration for a [`GraphCodec`](crate::GraphCodec)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Prefix every internal key derives from. Must not be used as a field
    /// name by callers.
    pub prefix: String,
    /// Delete (true) or null out (false) identity markers after a walk.
    /// Identity is tracked outside the graph, so both modes leave caller
    /// objects untouched; kept so existing configurations still load.
    pub cleanup: bool,
    /// Attach type tags on encode and restore behaviors on decode
    pub revive_types: bool,
    /// Pretty-print with this many spaces per level
    pub indent: Option<usize>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            cleanup: true,
            revive_types: true,
            indent: None,
        }
    }
}

impl CodecConfig {
    /// Configuration used by the scene inspector
    pub fn inspector() -> Self {
        Self::default().with_prefix(INSPECTOR_PREFIX)
    }

    /// Set the marker prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set cleanup mode
    pub fn with_cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// Enable or disable type revival
    pub fn with_revive_types(mut self, revive: bool) -> Self {
        self.revive_types = revive;
        self
    }

    /// Set pretty-print indentation
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = Some(indent);
        self
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.prefix.is_empty() {
            return Err(CodecError::InvalidConfig("prefix must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CodecConfig::default();
        assert_eq!(config.prefix, "#");
        assert!(config.cleanup);
        assert!(config.revive_types);
        assert_eq!(config.indent, None);
        assert_eq!(CodecConfig::inspector().prefix, "$");
    }

    #[test]
    fn test_partial_json_config() {
        let config: CodecConfig =
            serde_json::from_str(r#"{ "prefix": "$", "revive_types": false }"#).unwrap();
        assert_eq!(config.prefix, "$");
        assert!(!config.revive_types);
        assert!(config.cleanup);
    }

    #[test]
    fn test_empty_prefix_rejected() {
        let config = CodecConfig::default().with_prefix("");
        assert!(matches!(config.validate(), Err(CodecError::InvalidConfig(_))));
    }
}
