//! Pull-request change descriptors.
//!
//! After a resynthesis the resolved bundle is compared with the existing
//! bundle. Per-file patches go under `src-diffs/<repository>-<origin>/`, and
//! a YAML descriptor listing one change per repository is written to
//! `pull-request/<id>.yaml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::bundle::{source_path_set, write_bundle_file, BundleLayout};
use crate::differences::{difference_patch, write_difference_patch, SRC_DIFFS_DIR};
use crate::errors::BundleError;

/// Directory inside a bundle holding change descriptors.
pub const PULL_REQUEST_DIR: &str = "pull-request";

/// One repository's share of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestChange {
    pub repository: String,
    /// Bundle-relative directory holding this repository's patches.
    pub diffs: String,
    pub origin_branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_branch: Option<String>,
}

/// The YAML document written to `pull-request/<id>.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestDescriptor {
    pub title: String,
    pub description: String,
    pub changes: Vec<PullRequestChange>,
}

/// Options for [`create_lifecycle_pull_request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestOptions {
    pub origin_branch: String,
    pub target_branch: Option<String>,
    /// Descriptor file name without extension; defaults to the origin branch.
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl PullRequestOptions {
    pub fn new(origin_branch: impl Into<String>) -> Self {
        Self {
            origin_branch: origin_branch.into(),
            target_branch: None,
            id: None,
            title: None,
            description: None,
        }
    }

    fn id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.origin_branch)
    }
}

/// Serialize `descriptor` to `<bundle>/pull-request/<identifier>.yaml`.
pub fn write_pull_request(
    bundle: &Path,
    identifier: &str,
    descriptor: &PullRequestDescriptor,
) -> Result<PathBuf, BundleError> {
    let yaml = serde_yaml::to_string(descriptor)?;
    write_bundle_file(
        bundle,
        &format!("{PULL_REQUEST_DIR}/{identifier}.yaml"),
        yaml.as_bytes(),
    )
}

/// Diff every source file between `existing` and `resolved`, write the
/// patches into `resolved`, and describe them as a pull request.
///
/// Returns the descriptor path, or `None` when nothing changed.
#[instrument(skip_all, fields(resolved = %resolved.display(), origin = %options.origin_branch))]
pub fn create_lifecycle_pull_request(
    resolved: &Path,
    existing: &Path,
    layout: &BundleLayout,
    options: &PullRequestOptions,
) -> Result<Option<PathBuf>, BundleError> {
    // difference identifier -> repository
    let mut differences: BTreeMap<String, String> = BTreeMap::new();

    for source_path in source_path_set(&[resolved, existing], layout)? {
        let Some((repository, file_path)) = layout.split_source_path(&source_path) else {
            continue;
        };

        let old = read_optional(&existing.join(&source_path))?;
        let new = read_optional(&resolved.join(&source_path))?;
        let Some(patch) = difference_patch(old.as_deref(), new.as_deref(), file_path) else {
            continue;
        };

        let identifier = format!("{repository}-{}", options.origin_branch);
        write_difference_patch(resolved, &identifier, file_path, &patch)?;
        debug!(path = %source_path, "recorded difference");
        differences.insert(identifier, repository.to_string());
    }

    if differences.is_empty() {
        info!("no differences, skipping pull request");
        return Ok(None);
    }

    let descriptor = PullRequestDescriptor {
        title: options
            .title
            .clone()
            .unwrap_or_else(|| format!("Resynthesis update ({})", options.origin_branch)),
        description: options.description.clone().unwrap_or_default(),
        changes: differences
            .into_iter()
            .map(|(identifier, repository)| PullRequestChange {
                repository,
                diffs: format!("{SRC_DIFFS_DIR}/{identifier}"),
                origin_branch: options.origin_branch.clone(),
                target_branch: options.target_branch.clone(),
            })
            .collect(),
    };

    let path = write_pull_request(resolved, options.id(), &descriptor)?;
    info!(
        path = %path.display(),
        repositories = descriptor.changes.len(),
        "wrote pull request descriptor"
    );
    Ok(Some(path))
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, BundleError> {
    match fs::read(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(BundleError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_yaml_shape() {
        let descriptor = PullRequestDescriptor {
            title: "t".into(),
            description: "d".into(),
            changes: vec![PullRequestChange {
                repository: "repo".into(),
                diffs: "src-diffs/repo-main".into(),
                origin_branch: "main".into(),
                target_branch: None,
            }],
        };
        let yaml = serde_yaml::to_string(&descriptor).unwrap();
        assert!(yaml.contains("originBranch: main"));
        assert!(!yaml.contains("targetBranch"));

        let back: PullRequestDescriptor = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, descriptor);
    }

    #[test]
    fn test_no_differences_writes_nothing() {
        let existing = tempfile::tempdir().unwrap();
        let resolved = tempfile::tempdir().unwrap();
        write_bundle_file(existing.path(), "src/repo/a.txt", b"same\n").unwrap();
        write_bundle_file(resolved.path(), "src/repo/a.txt", b"same\n").unwrap();

        let result = create_lifecycle_pull_request(
            resolved.path(),
            existing.path(),
            &BundleLayout::default(),
            &PullRequestOptions::new("update"),
        )
        .unwrap();
        assert!(result.is_none());
        assert!(!resolved.path().join(PULL_REQUEST_DIR).exists());
    }

    #[test]
    fn test_lifecycle_pull_request() {
        let existing = tempfile::tempdir().unwrap();
        let resolved = tempfile::tempdir().unwrap();
        write_bundle_file(existing.path(), "src/repo/a.txt", b"old\n").unwrap();
        write_bundle_file(resolved.path(), "src/repo/a.txt", b"new\n").unwrap();
        write_bundle_file(resolved.path(), "src/other/added.txt", b"x\n").unwrap();
        write_bundle_file(existing.path(), "src/third/same.txt", b"s\n").unwrap();
        write_bundle_file(resolved.path(), "src/third/same.txt", b"s\n").unwrap();

        let mut options = PullRequestOptions::new("update");
        options.target_branch = Some("main".into());
        options.id = Some("pr-1".into());
        options.title = Some("Regenerate".into());

        let path = create_lifecycle_pull_request(
            resolved.path(),
            existing.path(),
            &BundleLayout::default(),
            &options,
        )
        .unwrap()
        .unwrap();
        assert_eq!(path, resolved.path().join("pull-request/pr-1.yaml"));

        let descriptor: PullRequestDescriptor =
            serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(descriptor.title, "Regenerate");
        let repos: Vec<&str> = descriptor.changes.iter().map(|c| c.repository.as_str()).collect();
        assert_eq!(repos, vec!["other", "repo"]);
        assert_eq!(descriptor.changes[1].diffs, "src-diffs/repo-update");
        assert_eq!(descriptor.changes[1].target_branch.as_deref(), Some("main"));

        let patch =
            std::fs::read_to_string(resolved.path().join("src-diffs/repo-update/a.txt")).unwrap();
        assert!(patch.contains("-old\n+new\n"));
        assert!(!resolved.path().join("src-diffs/third-update").exists());
    }
}
