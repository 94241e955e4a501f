//! Unified-diff patches between two revisions of one file.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::bundle::write_bundle_file;
use crate::errors::BundleError;
use crate::strategy::is_binary;

/// Directory inside a bundle holding generated patches.
pub const SRC_DIFFS_DIR: &str = "src-diffs";

/// Render a git-style patch turning `old` into `new`, labelled with
/// `destination` on both sides. `None` for a side means the file does not
/// exist there.
///
/// Returns `None` when both sides are identical.
pub fn difference_patch(old: Option<&[u8]>, new: Option<&[u8]>, destination: &str) -> Option<String> {
    if old == new {
        return None;
    }

    let old_label = old.map_or_else(|| "/dev/null".to_string(), |_| format!("a/{destination}"));
    let new_label = new.map_or_else(|| "/dev/null".to_string(), |_| format!("b/{destination}"));

    let mut out = format!("diff --git a/{destination} b/{destination}\n");
    match (old, new) {
        (None, Some(_)) => out.push_str("new file mode 100644\n"),
        (Some(_), None) => out.push_str("deleted file mode 100644\n"),
        _ => {}
    }

    if old.is_some_and(is_binary) || new.is_some_and(is_binary) {
        out.push_str(&format!("Binary files {old_label} and {new_label} differ\n"));
        return Some(out);
    }

    let old_text = String::from_utf8_lossy(old.unwrap_or_default());
    let new_text = String::from_utf8_lossy(new.unwrap_or_default());
    let patch = diffy::create_patch(&old_text, &new_text);
    if patch.hunks().is_empty() {
        return None;
    }

    out.push_str(&format!("--- {old_label}\n+++ {new_label}\n"));
    // diffy writes its own `---`/`+++` header first
    let rendered = patch.to_string();
    let body = rendered
        .splitn(3, '\n')
        .nth(2)
        .unwrap_or_default();
    out.push_str(body);

    debug!(destination, hunks = patch.hunks().len(), "generated difference patch");
    Some(out)
}

/// Write `patch` to `<bundle>/src-diffs/<identifier>/<file_path>`.
pub fn write_difference_patch(
    bundle: &Path,
    identifier: &str,
    file_path: &str,
    patch: &str,
) -> Result<PathBuf, BundleError> {
    let relative = format!("{SRC_DIFFS_DIR}/{identifier}/{file_path}");
    write_bundle_file(bundle, &relative, patch.as_bytes())
}
