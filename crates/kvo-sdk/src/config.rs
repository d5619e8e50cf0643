use std::path::Path;

use kvo_unit::CommitFailurePolicy;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SdkError, SdkResult};

/// Behavior switches for an [`EntityManager`](crate::EntityManager).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManagerConfig {
    /// What stays scheduled after a commit fails part-way.
    pub commit_failure_policy: CommitFailurePolicy,
    /// Fail hydration on stored fields the target type cannot hold,
    /// instead of dropping them with a warning.
    pub strict_unmapped_fields: bool,
    /// Register mapped types on first use. When `false`, every type must be
    /// registered up front.
    pub auto_register: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            commit_failure_policy: CommitFailurePolicy::Retain,
            strict_unmapped_fields: false,
            auto_register: true,
        }
    }
}

impl ManagerConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(contents: &str) -> SdkResult<Self> {
        toml::from_str(contents).map_err(|e| SdkError::Config(format!("failed to parse TOML: {e}")))
    }

    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> SdkResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SdkError::Config(format!("failed to read {}: {e}", path.display())))?;
        debug!(path = %path.display(), "loading manager configuration");
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> SdkResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| SdkError::Config(format!("failed to serialize config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.commit_failure_policy, CommitFailurePolicy::Retain);
        assert!(!config.strict_unmapped_fields);
        assert!(config.auto_register);
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(ManagerConfig::from_toml_str("").unwrap(), ManagerConfig::default());
    }

    #[test]
    fn parses_all_keys() {
        let config = ManagerConfig::from_toml_str(
            r#"
            commit_failure_policy = "discard"
            strict_unmapped_fields = true
            auto_register = false
            "#,
        )
        .unwrap();
        assert_eq!(config.commit_failure_policy, CommitFailurePolicy::Discard);
        assert!(config.strict_unmapped_fields);
        assert!(!config.auto_register);
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = ManagerConfig::from_toml_str("retries = 3").unwrap_err();
        assert!(matches!(err, SdkError::Config(_)));
    }

    #[test]
    fn rejects_unknown_policy() {
        assert!(ManagerConfig::from_toml_str(r#"commit_failure_policy = "maybe""#).is_err());
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kvo.toml");
        let config = ManagerConfig {
            commit_failure_policy: CommitFailurePolicy::Discard,
            ..ManagerConfig::default()
        };
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();
        assert_eq!(ManagerConfig::from_toml_file(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ManagerConfig::from_toml_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, SdkError::Config(msg) if msg.contains("absent.toml")));
    }
}
