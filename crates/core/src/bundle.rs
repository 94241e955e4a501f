//! Bundle directories.
//!
//! A bundle is a directory holding one revision of every generated
//! repository under `<bundle>/<source_prefix>/<repository>/<path>`.
//! Resynthesis reads three bundles (ancestor, existing, proposed) and writes a
//! fourth.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::context_file::ContextFile;
use crate::errors::BundleError;
use crate::ownership::DEFAULT_OWNERSHIP_FILE_NAME;

/// Default directory holding repositories inside a bundle.
pub const DEFAULT_SOURCE_PREFIX: &str = "src";

/// Where things live inside a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleLayout {
    /// Directory under the bundle root holding one directory per repository.
    pub source_prefix: String,
    /// Name of the per-directory ownership file.
    pub ownership_file_name: String,
}

impl Default for BundleLayout {
    fn default() -> Self {
        Self {
            source_prefix: DEFAULT_SOURCE_PREFIX.to_string(),
            ownership_file_name: DEFAULT_OWNERSHIP_FILE_NAME.to_string(),
        }
    }
}

impl BundleLayout {
    pub fn source_dir(&self, bundle: &Path) -> PathBuf {
        bundle.join(&self.source_prefix)
    }

    /// Split `<prefix>/<repository>/<path>` into repository and path.
    pub fn split_source_path<'p>(&self, source_path: &'p str) -> Option<(&'p str, &'p str)> {
        let rest = source_path
            .strip_prefix(self.source_prefix.as_str())?
            .strip_prefix('/')?;
        let (repository, path) = rest.split_once('/')?;
        (!repository.is_empty() && !path.is_empty()).then_some((repository, path))
    }

    /// `<prefix>/<repository>/<path>`.
    pub fn source_path(&self, repository: &str, path: &str) -> String {
        format!("{}/{}/{}", self.source_prefix, repository, path)
    }
}

/// Load the file at `source_path` (bundle-relative, POSIX) as a
/// [`ContextFile`].
///
/// Returns `None` when the file is missing, is not a regular file, or the
/// path has no repository component.
pub fn create_context_file(
    bundle: &Path,
    source_path: &str,
    layout: &BundleLayout,
) -> Result<Option<ContextFile>, BundleError> {
    let Some((repository, path)) = layout.split_source_path(source_path) else {
        debug!(source_path, "path has no repository component");
        return Ok(None);
    };

    let full_path = bundle.join(source_path);
    match fs::symlink_metadata(&full_path) {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(BundleError::Io {
                path: full_path,
                source,
            })
        }
    }

    let content = fs::read(&full_path).map_err(|source| BundleError::Io {
        path: full_path.clone(),
        source,
    })?;
    Ok(Some(ContextFile::new(repository, path, content)))
}

/// Sorted union of every regular file under `<bundle>/<source_prefix>`
/// across `bundles`, as bundle-relative POSIX paths.
pub fn source_path_set(
    bundles: &[&Path],
    layout: &BundleLayout,
) -> Result<BTreeSet<String>, BundleError> {
    let mut paths = BTreeSet::new();
    for bundle in bundles {
        paths.extend(walk_source_files(bundle, layout)?);
    }
    Ok(paths)
}

/// Write `content` to `<bundle>/<relative>`, creating parent directories.
pub fn write_bundle_file(bundle: &Path, relative: &str, content: &[u8]) -> Result<PathBuf, BundleError> {
    let target = bundle.join(relative);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|source| BundleError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(&target, content).map_err(|source| BundleError::Io {
        path: target.clone(),
        source,
    })?;
    Ok(target)
}

/// Regular files under `<bundle>/<source_prefix>`, bundle-relative. A
/// missing source directory yields nothing.
pub(crate) fn walk_source_files(
    bundle: &Path,
    layout: &BundleLayout,
) -> Result<Vec<String>, walkdir::Error> {
    let root = layout.source_dir(bundle);
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(bundle) {
            files.push(to_posix(relative));
        }
    }
    Ok(files)
}

/// Join the normal components of `path` with `/`.
pub(crate) fn to_posix(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
