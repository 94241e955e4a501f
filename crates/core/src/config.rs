//! TOML-based configuration for resynthesis runs.
//!
//! Every section except `[package]` is optional and falls back to defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bundle::{BundleLayout, DEFAULT_SOURCE_PREFIX};
use crate::errors::ConfigError;
use crate::ownership::{PackageIdentity, DEFAULT_OWNERSHIP_FILE_NAME};
use crate::pull_request::PullRequestOptions;
use crate::strategy::ShellMergeDriver;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResynthConfig {
    /// General settings.
    #[serde(default)]
    pub resynth: GeneralConfig,

    /// The package performing the resynthesis.
    pub package: PackageConfig,

    /// Ownership file discovery.
    #[serde(default)]
    pub ownership: OwnershipConfig,

    /// External merge command settings.
    #[serde(default)]
    pub local_strategy: LocalStrategyConfig,

    /// Change descriptor written after a run. Absent disables it.
    #[serde(default)]
    pub pull_request: Option<PullRequestConfig>,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// `[resynth]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// `[package]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageConfig {
    /// Package name matched against strategy owners.
    pub name: String,

    /// Package version, matched as `name@version`.
    #[serde(default)]
    pub version: Option<String>,
}

/// `[ownership]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnershipConfig {
    /// Name of the per-directory ownership file.
    #[serde(default = "default_ownership_file_name")]
    pub file_name: String,

    /// Directory inside each bundle holding the repositories.
    #[serde(default = "default_source_prefix")]
    pub source_prefix: String,
}

fn default_ownership_file_name() -> String {
    DEFAULT_OWNERSHIP_FILE_NAME.into()
}
fn default_source_prefix() -> String {
    DEFAULT_SOURCE_PREFIX.into()
}

impl Default for OwnershipConfig {
    fn default() -> Self {
        Self {
            file_name: default_ownership_file_name(),
            source_prefix: default_source_prefix(),
        }
    }
}

/// `[local_strategy]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalStrategyConfig {
    /// Parent directory for per-merge temp directories (default: system temp).
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

/// `[pull_request]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestConfig {
    /// Branch the changes are proposed from.
    #[serde(default = "default_origin_branch")]
    pub origin_branch: String,

    /// Branch the changes are proposed into.
    #[serde(default)]
    pub target_branch: Option<String>,

    /// Descriptor file name (without `.yaml`). Defaults to the origin branch.
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

fn default_origin_branch() -> String {
    "resynthesis".into()
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl ResynthConfig {
    /// Load a [`ResynthConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: ResynthConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.package.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "package.name".into(),
                detail: "package name must not be empty".into(),
            });
        }
        if matches!(&self.package.version, Some(v) if v.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "package.version".into(),
                detail: "package version must not be empty when set".into(),
            });
        }
        if self.ownership.file_name.is_empty() || self.ownership.file_name.contains('/') {
            return Err(ConfigError::InvalidValue {
                field: "ownership.file_name".into(),
                detail: "must be a plain file name".into(),
            });
        }
        let prefix = &self.ownership.source_prefix;
        if prefix.is_empty() || prefix.starts_with('/') || prefix.ends_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "ownership.source_prefix".into(),
                detail: "must be a non-empty relative path without leading or trailing '/'".into(),
            });
        }
        if !matches!(
            self.resynth.log_level.as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(ConfigError::InvalidValue {
                field: "resynth.log_level".into(),
                detail: format!("unknown level '{}'", self.resynth.log_level),
            });
        }
        if let Some(pr) = &self.pull_request {
            if pr.origin_branch.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "pull_request.origin_branch".into(),
                    detail: "origin branch must not be empty".into(),
                });
            }
        }

        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn bundle_layout(&self) -> BundleLayout {
        BundleLayout {
            source_prefix: self.ownership.source_prefix.clone(),
            ownership_file_name: self.ownership.file_name.clone(),
        }
    }

    pub fn package_identity(&self) -> PackageIdentity {
        PackageIdentity::new(self.package.name.clone(), self.package.version.clone())
    }

    pub fn merge_driver(&self) -> ShellMergeDriver {
        ShellMergeDriver::new(self.local_strategy.temp_dir.clone())
    }

    /// Options for the change descriptor, if one is configured.
    pub fn pull_request_options(&self) -> Option<PullRequestOptions> {
        self.pull_request.as_ref().map(|pr| PullRequestOptions {
            origin_branch: pr.origin_branch.clone(),
            target_branch: pr.target_branch.clone(),
            id: pr.id.clone(),
            title: pr.title.clone(),
            description: pr.description.clone(),
        })
    }

    /// Generate a default TOML config template string.
    pub fn default_template() -> &'static str {
        r#"# Resynthesis configuration

[resynth]
log_level = "info"

[package]
name = "@scope/my-package"
# version = "1.0.0"

[ownership]
file_name = ".ownership-file"
source_prefix = "src"

[local_strategy]
# temp_dir = "/tmp/resynth"  # defaults to the system temp dir

# [pull_request]
# origin_branch = "resynthesis"
# target_branch = "main"
# title = "Resynthesis update"
# description = "Regenerated files merged with local changes."
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[resynth]
log_level = "debug"

[package]
name = "@scope/pkg"
version = "1.2.3"

[ownership]
file_name = ".blueprint-ownership"
source_prefix = "sources"

[local_strategy]
temp_dir = "/tmp/resynth"

[pull_request]
origin_branch = "update"
target_branch = "main"
title = "Update"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: ResynthConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.resynth.log_level, "debug");
        assert_eq!(config.package.version.as_deref(), Some("1.2.3"));
        assert_eq!(config.ownership.file_name, ".blueprint-ownership");
        assert_eq!(
            config.local_strategy.temp_dir.as_deref(),
            Some(Path::new("/tmp/resynth"))
        );

        let pr = config.pull_request_options().unwrap();
        assert_eq!(pr.origin_branch, "update");
        assert_eq!(pr.target_branch.as_deref(), Some("main"));
        assert!(pr.description.is_none());

        let layout = config.bundle_layout();
        assert_eq!(layout.source_prefix, "sources");
        assert_eq!(config.package_identity().versioned_name(), "@scope/pkg@1.2.3");
    }

    #[test]
    fn test_defaults() {
        let config: ResynthConfig = toml::from_str("[package]\nname = \"pkg\"\n").unwrap();
        assert_eq!(config.resynth.log_level, "info");
        assert_eq!(config.ownership.file_name, ".ownership-file");
        assert_eq!(config.ownership.source_prefix, "src");
        assert!(config.local_strategy.temp_dir.is_none());
        assert!(config.pull_request.is_none());
        assert!(config.pull_request_options().is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_pull_request_defaults() {
        let config: ResynthConfig =
            toml::from_str("[package]\nname = \"pkg\"\n[pull_request]\n").unwrap();
        assert_eq!(config.pull_request.unwrap().origin_branch, "resynthesis");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resynth.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = ResynthConfig::load_and_validate(&path).expect("load failed");
        assert_eq!(config.package.name, "@scope/pkg");
    }

    #[test]
    fn test_file_not_found() {
        let result = ResynthConfig::load_from_file("/nonexistent/resynth.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_missing_package_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resynth.toml");
        std::fs::write(&path, "[resynth]\n").unwrap();
        let result = ResynthConfig::load_from_file(&path);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let mut config: ResynthConfig = toml::from_str(sample_toml()).unwrap();
        config.package.name = "  ".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "package.name"
        ));
    }

    #[test]
    fn test_validate_rejects_nested_file_name() {
        let mut config: ResynthConfig = toml::from_str(sample_toml()).unwrap();
        config.ownership.file_name = "dir/.ownership-file".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "ownership.file_name"
        ));
    }

    #[test]
    fn test_validate_rejects_bad_log_level() {
        let mut config: ResynthConfig = toml::from_str(sample_toml()).unwrap();
        config.resynth.log_level = "loud".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "resynth.log_level"
        ));
    }

    #[test]
    fn test_default_template_parses() {
        let config: ResynthConfig = toml::from_str(ResynthConfig::default_template()).unwrap();
        config.validate().unwrap();
        assert!(config.pull_request.is_none());
    }
}
