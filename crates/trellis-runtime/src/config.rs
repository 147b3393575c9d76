#![forbid(unsafe_code)]

//! Configuration for the part service.
//!
//! Every tunable behavior of the activation engine lives in one
//! [`WorkbenchConfig`] that can be loaded from TOML or JSON at startup when
//! the `config-file` feature is enabled.
//!
//! ```toml
//! # trellis.toml
//! history_depth = 32
//! remove_on_hide_tag = "removeOnHide"
//! focus_on_activate = true
//! ```
//!
//! ```rust,ignore
//! let config = WorkbenchConfig::from_toml_file("trellis.toml")?;
//! ```

#[cfg(feature = "config-file")]
use std::path::Path;

#[cfg(feature = "config-file")]
use serde::{Deserialize, Serialize};

/// Tag that marks a part for deep removal when hidden.
pub const DEFAULT_REMOVE_ON_HIDE_TAG: &str = "removeOnHide";

/// Tag given to stacks the service creates when no category stack exists.
pub const DEFAULT_NEW_STACK_TAG: &str = "newtablook";

/// Part service tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config-file", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-file", serde(default))]
pub struct WorkbenchConfig {
    /// Maximum activation history entries kept per window.
    pub history_depth: usize,

    /// Tag that turns a hide into a deep removal.
    pub remove_on_hide_tag: String,

    /// Invoke the presentation focus callback when a part is activated.
    pub focus_on_activate: bool,

    /// Tag applied to stacks created by `show` for uncategorized parts.
    pub new_stack_tag: String,

    /// Reuse an existing shared part instead of creating a new one.
    pub reuse_shared_parts: bool,
}

impl Default for WorkbenchConfig {
    fn default() -> Self {
        Self {
            history_depth: 64,
            remove_on_hide_tag: DEFAULT_REMOVE_ON_HIDE_TAG.to_string(),
            focus_on_activate: true,
            new_stack_tag: DEFAULT_NEW_STACK_TAG.to_string(),
            reuse_shared_parts: true,
        }
    }
}

impl WorkbenchConfig {
    /// Load from a TOML string.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validated()
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config-file")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "config-file")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validated()
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "config-file")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Validate all parameters.
    ///
    /// Returns a list of validation errors. An empty list means the config
    /// is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.history_depth == 0 {
            errors.push("history_depth must be at least 1".to_string());
        }
        if self.remove_on_hide_tag.trim().is_empty() {
            errors.push("remove_on_hide_tag must not be empty".to_string());
        }
        if self.new_stack_tag.trim().is_empty() {
            errors.push("new_stack_tag must not be empty".to_string());
        }
        errors
    }

    /// Return `self` when valid, otherwise the collected validation errors.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Errors from loading or validating a [`WorkbenchConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "config-file")]
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[cfg(feature = "config-file")]
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = WorkbenchConfig::default();
        assert!(config.validate().is_empty());
        assert_eq!(config.remove_on_hide_tag, DEFAULT_REMOVE_ON_HIDE_TAG);
        assert_eq!(config.history_depth, 64);
    }

    #[test]
    fn validation_collects_every_problem() {
        let config = WorkbenchConfig {
            history_depth: 0,
            remove_on_hide_tag: "  ".into(),
            ..WorkbenchConfig::default()
        };
        let errors = config.validate();
        assert_eq!(errors.len(), 2);
        let err = config.validated().expect_err("invalid");
        assert!(err.to_string().contains("history_depth"));
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn toml_overrides_only_named_fields() {
        let config = WorkbenchConfig::from_toml_str("history_depth = 8\nfocus_on_activate = false\n")
            .expect("parse");
        assert_eq!(config.history_depth, 8);
        assert!(!config.focus_on_activate);
        assert_eq!(config.new_stack_tag, DEFAULT_NEW_STACK_TAG);
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn json_rejects_invalid_values() {
        let err = WorkbenchConfig::from_json_str(r#"{"history_depth": 0}"#).expect_err("invalid");
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn toml_file_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("trellis.toml");
        std::fs::write(&path, "remove_on_hide_tag = \"transient\"\n").expect("write");
        let config = WorkbenchConfig::from_toml_file(&path).expect("load");
        assert_eq!(config.remove_on_hide_tag, "transient");
        assert!(matches!(
            WorkbenchConfig::from_toml_file(dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
