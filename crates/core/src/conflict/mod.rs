//! Line diffing, three-way merging, and conflict rendering.
//!
//! The conflict subsystem is responsible for:
//! 1. **Diffing** -- reducing two texts to equal/insert/delete line runs.
//! 2. **Merging** -- the diff3 walk over ancestor, existing and proposed text.
//! 3. **Formatting** -- rendering conflicting chunks with marker lines.

pub mod diff;
pub mod formatter;
pub mod merger;

pub use diff::{diff_lines, split_lines, DiffKind, DiffRun};
pub use formatter::{
    contains_conflict_markers, count_conflict_markers, ConflictLabels, ConflictStyle,
    CONFLICT_MARKER_LENGTH,
};
pub use merger::{ConflictMarker, MergeChunk, MergeOptions, MergeResult, Merger};
