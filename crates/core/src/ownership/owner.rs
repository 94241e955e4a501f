//! Owner patterns: which package a strategy belongs to.
//!
//! An owner is a package name optionally followed by `@version`, where `*`
//! matches any run of characters (including `/` and `@`). Every other
//! character matches literally.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Name and optional version of the package running a resynthesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageIdentity {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl PackageIdentity {
    pub fn new(name: impl Into<String>, version: Option<String>) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// `name@version`, or just `name` when no version is known.
    pub fn versioned_name(&self) -> String {
        match &self.version {
            Some(version) => format!("{}@{}", self.name, version),
            None => self.name.clone(),
        }
    }
}

/// A compiled owner pattern.
#[derive(Debug, Clone)]
pub struct OwnerPattern {
    pattern: String,
    regex: Option<Regex>,
}

impl OwnerPattern {
    pub fn new(pattern: &str) -> Self {
        let source = format!(
            "^{}$",
            pattern
                .split('*')
                .map(regex_lite::escape)
                .collect::<Vec<_>>()
                .join(".*")
        );
        let regex = match Regex::new(&source) {
            Ok(regex) => Some(regex),
            Err(e) => {
                warn!(pattern, error = %e, "owner pattern failed to compile; it matches nothing");
                None
            }
        };
        Self {
            pattern: pattern.to_string(),
            regex,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn is_match(&self, candidate: &str) -> bool {
        self.regex.as_ref().is_some_and(|r| r.is_match(candidate))
    }

    /// True when the pattern matches the package name or `name@version`.
    pub fn matches_package(&self, package: &PackageIdentity) -> bool {
        self.is_match(&package.name)
            || (package.version.is_some() && self.is_match(&package.versioned_name()))
    }
}

/// Shorthand for [`OwnerPattern::matches_package`].
pub fn owner_matches(pattern: &str, package: &PackageIdentity) -> bool {
    OwnerPattern::new(pattern).matches_package(package)
}
