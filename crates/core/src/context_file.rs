//! One revision of one file, as seen by a merge strategy.

use serde::{Deserialize, Serialize};

use crate::errors::MergeError;

/// Immutable snapshot of a single file at a single revision.
///
/// `path` is POSIX-relative to the repository root. Any of the three
/// revisions handed to a strategy may be absent (`None`), which means the file
/// does not exist at that revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextFile {
    pub repository_name: String,
    pub path: String,
    pub content: Vec<u8>,
}

impl ContextFile {
    pub fn new(
        repository_name: impl Into<String>,
        path: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            repository_name: repository_name.into(),
            path: path.into(),
            content: content.into(),
        }
    }

    /// Content decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }

    /// A copy of this file's identity carrying new content.
    pub fn with_content(&self, content: impl Into<Vec<u8>>) -> Self {
        Self {
            repository_name: self.repository_name.clone(),
            path: self.path.clone(),
            content: content.into(),
        }
    }
}

/// Repository name and path shared by a set of revisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIdentity {
    pub repository_name: String,
    pub path: String,
}

impl FileIdentity {
    /// Derive the identity from the first revision that carries it, preferring
    /// existing, then proposed, then ancestor.
    pub fn resolve(
        ancestor: Option<&ContextFile>,
        existing: Option<&ContextFile>,
        proposed: Option<&ContextFile>,
    ) -> Result<Self, MergeError> {
        let candidates = [existing, proposed, ancestor];

        let repository_name = candidates
            .iter()
            .flatten()
            .map(|f| f.repository_name.as_str())
            .find(|name| !name.is_empty())
            .ok_or(MergeError::UnresolvedIdentity {
                field: "repository name",
            })?;

        let path = candidates
            .iter()
            .flatten()
            .map(|f| f.path.as_str())
            .find(|path| !path.is_empty())
            .ok_or(MergeError::UnresolvedIdentity { field: "path" })?;

        Ok(Self {
            repository_name: repository_name.to_string(),
            path: path.to_string(),
        })
    }

    pub fn into_file(self, content: impl Into<Vec<u8>>) -> ContextFile {
        ContextFile {
            repository_name: self.repository_name,
            path: self.path,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_prefers_existing() {
        let ancestor = ContextFile::new("repo-o", "o.txt", "o");
        let existing = ContextFile::new("repo-a", "a.txt", "a");
        let proposed = ContextFile::new("repo-b", "b.txt", "b");

        let identity =
            FileIdentity::resolve(Some(&ancestor), Some(&existing), Some(&proposed)).unwrap();
        assert_eq!(identity.repository_name, "repo-a");
        assert_eq!(identity.path, "a.txt");

        let identity = FileIdentity::resolve(Some(&ancestor), None, Some(&proposed)).unwrap();
        assert_eq!(identity.repository_name, "repo-b");

        let identity = FileIdentity::resolve(Some(&ancestor), None, None).unwrap();
        assert_eq!(identity.path, "o.txt");
    }

    #[test]
    fn test_identity_missing() {
        let result = FileIdentity::resolve(None, None, None);
        assert!(matches!(
            result,
            Err(MergeError::UnresolvedIdentity {
                field: "repository name"
            })
        ));

        let nameless = ContextFile::new("", "file", "x");
        let result = FileIdentity::resolve(None, Some(&nameless), None);
        assert!(matches!(result, Err(MergeError::UnresolvedIdentity { .. })));
    }

    #[test]
    fn test_with_content_keeps_identity() {
        let file = ContextFile::new("repo", "src/lib.rs", "old");
        let updated = file.with_content("new");
        assert_eq!(updated.repository_name, "repo");
        assert_eq!(updated.path, "src/lib.rs");
        assert_eq!(updated.text(), "new");
    }
}
