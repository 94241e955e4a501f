//! Built-in merge strategies.
//!
//! Every strategy has the shape `(ancestor?, existing?, proposed?) ->
//! resolved?`. An absent input means the file does not exist at that
//! revision; an absent result means the file must not exist after the merge.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::conflict::{ConflictLabels, ConflictStyle, MergeOptions, Merger};
use crate::context_file::{ContextFile, FileIdentity};
use crate::errors::MergeError;

/// Only the first bytes of a buffer are scanned for null bytes.
pub const BINARY_SCAN_LENGTH: usize = 8000;

/// Label used for the existing side of conflict markers.
pub const EXISTING_LABEL: &str = "existing";
/// Label used for the proposed side of conflict markers.
pub const PROPOSED_LABEL: &str = "proposed";
/// Label used for the ancestor section of `diff3` conflict markers.
pub const ANCESTOR_LABEL: &str = "ancestor";

/// The merge strategies shipped with the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinStrategy {
    /// Always resolve to the proposed file.
    AlwaysUpdate,
    /// Always resolve to the existing file.
    NeverUpdate,
    /// Keep the existing file if there is one, otherwise add the proposed one.
    OnlyAdd,
    /// Three-way merge; unresolved conflicts are left as markers.
    ThreeWayMerge,
    /// Three-way merge; conflicts resolve to the proposed side.
    PreferProposed,
    /// Three-way merge; conflicts resolve to the existing side.
    PreferExisting,
}

impl BuiltinStrategy {
    pub const ALL: [BuiltinStrategy; 6] = [
        Self::AlwaysUpdate,
        Self::NeverUpdate,
        Self::OnlyAdd,
        Self::ThreeWayMerge,
        Self::PreferProposed,
        Self::PreferExisting,
    ];

    /// Stable identifier used in ownership files and logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::AlwaysUpdate => "always_update",
            Self::NeverUpdate => "never_update",
            Self::OnlyAdd => "only_add",
            Self::ThreeWayMerge => "three_way_merge",
            Self::PreferProposed => "prefer_proposed",
            Self::PreferExisting => "prefer_existing",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    pub fn apply(
        self,
        ancestor: Option<&ContextFile>,
        existing: Option<&ContextFile>,
        proposed: Option<&ContextFile>,
    ) -> Result<Option<ContextFile>, MergeError> {
        match self {
            Self::AlwaysUpdate => Ok(always_update(ancestor, existing, proposed)),
            Self::NeverUpdate => Ok(never_update(ancestor, existing, proposed)),
            Self::OnlyAdd => Ok(only_add(ancestor, existing, proposed)),
            Self::ThreeWayMerge => three_way_merge(ancestor, existing, proposed),
            Self::PreferProposed => prefer_proposed(ancestor, existing, proposed),
            Self::PreferExisting => prefer_existing(ancestor, existing, proposed),
        }
    }
}

impl std::fmt::Display for BuiltinStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Strategy functions
// ---------------------------------------------------------------------------

/// Resolve to the proposed file.
pub fn always_update(
    _ancestor: Option<&ContextFile>,
    _existing: Option<&ContextFile>,
    proposed: Option<&ContextFile>,
) -> Option<ContextFile> {
    proposed.cloned()
}

/// Resolve to the existing file.
pub fn never_update(
    _ancestor: Option<&ContextFile>,
    existing: Option<&ContextFile>,
    _proposed: Option<&ContextFile>,
) -> Option<ContextFile> {
    existing.cloned()
}

/// Resolve to the existing file when present, otherwise the proposed file.
pub fn only_add(
    _ancestor: Option<&ContextFile>,
    existing: Option<&ContextFile>,
    proposed: Option<&ContextFile>,
) -> Option<ContextFile> {
    existing.or(proposed).cloned()
}

/// Three-way merge of the existing and proposed files against the ancestor.
///
/// If any input looks binary the proposed file wins outright. Input that is
/// not valid UTF-8 is reconciled byte-wise without looking inside it. The
/// result may contain conflict markers.
pub fn three_way_merge(
    ancestor: Option<&ContextFile>,
    existing: Option<&ContextFile>,
    proposed: Option<&ContextFile>,
) -> Result<Option<ContextFile>, MergeError> {
    if any_binary(ancestor, existing, proposed) {
        debug!("binary content detected, taking proposed file");
        return Ok(proposed.cloned());
    }
    if !all_utf8(ancestor, existing, proposed) {
        debug!("non UTF-8 content, reconciling bytes");
        return Ok(merge_binary(ancestor, existing, proposed, Side::Proposed));
    }
    merge_text(ancestor, existing, proposed, ConflictStyle::TrimEnds)
}

/// Three-way merge whose conflicts resolve to the proposed side.
pub fn prefer_proposed(
    ancestor: Option<&ContextFile>,
    existing: Option<&ContextFile>,
    proposed: Option<&ContextFile>,
) -> Result<Option<ContextFile>, MergeError> {
    if any_binary(ancestor, existing, proposed) || !all_utf8(ancestor, existing, proposed) {
        return Ok(merge_binary(ancestor, existing, proposed, Side::Proposed));
    }
    merge_text(ancestor, existing, proposed, ConflictStyle::PreferProposed)
}

/// Three-way merge whose conflicts resolve to the existing side.
pub fn prefer_existing(
    ancestor: Option<&ContextFile>,
    existing: Option<&ContextFile>,
    proposed: Option<&ContextFile>,
) -> Result<Option<ContextFile>, MergeError> {
    if any_binary(ancestor, existing, proposed) || !all_utf8(ancestor, existing, proposed) {
        return Ok(merge_binary(ancestor, existing, proposed, Side::Existing));
    }
    merge_text(ancestor, existing, proposed, ConflictStyle::PreferExisting)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Side {
    Existing,
    Proposed,
}

fn merge_text(
    ancestor: Option<&ContextFile>,
    existing: Option<&ContextFile>,
    proposed: Option<&ContextFile>,
    style: ConflictStyle,
) -> Result<Option<ContextFile>, MergeError> {
    if existing.is_none() && proposed.is_none() {
        return Ok(None);
    }
    let identity = FileIdentity::resolve(ancestor, existing, proposed)?;

    // one side unchanged, or both sides agree: no text merge needed
    if bytes_of(existing) == bytes_of(proposed) {
        return Ok(existing.cloned());
    }
    if bytes_of(existing) == bytes_of(ancestor) {
        return Ok(proposed.cloned());
    }
    if bytes_of(proposed) == bytes_of(ancestor) {
        return Ok(existing.cloned());
    }

    let text = |f: Option<&ContextFile>| f.map(|f| f.text().into_owned()).unwrap_or_default();
    let options = MergeOptions {
        labels: ConflictLabels {
            existing: Some(EXISTING_LABEL.to_string()),
            ancestor: Some(ANCESTOR_LABEL.to_string()),
            proposed: Some(PROPOSED_LABEL.to_string()),
        },
        style,
    };
    let result = Merger::three_way_merge(
        &text(existing),
        &text(ancestor),
        &text(proposed),
        &options,
    );

    if result.has_conflicts {
        debug!(
            path = %identity.path,
            conflicts = result.conflict_markers.len(),
            style = style.name(),
            "merge left conflicts"
        );
    }

    Ok(Some(identity.into_file(result.merged_content)))
}

/// Reconcile binary files without looking inside them.
fn merge_binary(
    ancestor: Option<&ContextFile>,
    existing: Option<&ContextFile>,
    proposed: Option<&ContextFile>,
    preference: Side,
) -> Option<ContextFile> {
    let existing_unchanged = bytes_of(ancestor) == bytes_of(existing);
    let proposed_unchanged = bytes_of(ancestor) == bytes_of(proposed);

    let chosen = match (existing_unchanged, proposed_unchanged) {
        (true, true) => ancestor,
        (true, false) => proposed,
        (false, true) => existing,
        // false conflicts (existing == proposed) land here too
        (false, false) => match preference {
            Side::Existing => existing,
            Side::Proposed => proposed,
        },
    };
    chosen.cloned()
}

fn bytes_of(file: Option<&ContextFile>) -> Option<&[u8]> {
    file.map(|f| f.content.as_slice())
}

fn all_utf8(
    ancestor: Option<&ContextFile>,
    existing: Option<&ContextFile>,
    proposed: Option<&ContextFile>,
) -> bool {
    [ancestor, existing, proposed]
        .into_iter()
        .flatten()
        .all(|f| std::str::from_utf8(&f.content).is_ok())
}

fn any_binary(
    ancestor: Option<&ContextFile>,
    existing: Option<&ContextFile>,
    proposed: Option<&ContextFile>,
) -> bool {
    [ancestor, existing, proposed]
        .into_iter()
        .flatten()
        .any(|f| is_binary(&f.content))
}

/// Heuristic binary detection: a null byte within the first
/// [`BINARY_SCAN_LENGTH`] bytes.
pub fn is_binary(content: &[u8]) -> bool {
    let head = &content[..content.len().min(BINARY_SCAN_LENGTH)];
    head.contains(&0)
}
