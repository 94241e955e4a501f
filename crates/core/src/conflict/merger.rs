//! Three-way merge engine.
//!
//! Merges an ancestor (`O`), an existing (`A`) and a proposed (`B`) text
//! line by line. `O` is diffed against `A` and against `B`, and the equal
//! runs of each diff become alignment maps from `O` line numbers to `A`/`B`
//! line numbers. The engine then walks all three documents, cutting a chunk
//! wherever the alignment breaks, and classifies each chunk as clean or
//! conflicting. See Khanna, Kuber & Pierce, "A Formal Investigation of
//! Diff3".

use std::collections::HashMap;

use tracing::debug;

use super::diff::{diff_lines, split_lines, DiffKind, DiffRun};
use super::formatter::{ConflictLabels, ConflictStyle};

/// One span of the merged document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeChunk {
    /// Text every side agrees on, or that only one side changed.
    Clean(String),
    /// Both sides changed the span differently.
    Conflict {
        existing: String,
        ancestor: String,
        proposed: String,
    },
}

impl MergeChunk {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Options controlling how conflicting chunks are rendered.
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    pub labels: ConflictLabels,
    pub style: ConflictStyle,
}

/// The result of a three-way merge.
#[derive(Debug, Clone)]
pub struct MergeResult {
    /// The merged content (may contain conflict markers if `has_conflicts` is true).
    pub merged_content: String,
    /// Whether any chunk conflicted.
    pub has_conflicts: bool,
    /// Where each conflicting chunk landed in `merged_content`.
    pub conflict_markers: Vec<ConflictMarker>,
}

/// A single conflict region within merged output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictMarker {
    /// Starting line number (1-indexed) of the rendered conflict.
    pub start_line: usize,
    /// Ending line number (1-indexed) of the rendered conflict.
    pub end_line: usize,
}

/// Stateless three-way merge engine.
pub struct Merger;

impl Merger {
    /// Merge `existing` and `proposed` against their common `ancestor`.
    pub fn three_way_merge(
        existing: &str,
        ancestor: &str,
        proposed: &str,
        options: &MergeOptions,
    ) -> MergeResult {
        let chunks = Diff3::new(existing, ancestor, proposed).into_chunks();
        render(&chunks, options)
    }

    /// Merge and return the structured chunks for programmatic inspection.
    pub fn chunks(existing: &str, ancestor: &str, proposed: &str) -> Vec<MergeChunk> {
        Diff3::new(existing, ancestor, proposed).into_chunks()
    }

    /// Quick check: can these three versions be merged without conflicts?
    pub fn can_auto_merge(existing: &str, ancestor: &str, proposed: &str) -> bool {
        if existing == ancestor || proposed == ancestor || existing == proposed {
            return true;
        }
        !Self::chunks(existing, ancestor, proposed)
            .iter()
            .any(MergeChunk::is_conflict)
    }
}

/// Concatenate chunks in order, rendering conflicts with `options.style`.
pub fn render(chunks: &[MergeChunk], options: &MergeOptions) -> MergeResult {
    let mut merged = String::new();
    let mut markers = Vec::new();

    for chunk in chunks {
        match chunk {
            MergeChunk::Clean(text) => merged.push_str(text),
            MergeChunk::Conflict {
                existing,
                ancestor,
                proposed,
            } => {
                let start_line = merged.matches('\n').count() + 1;
                let rendered = options
                    .style
                    .format(existing, ancestor, proposed, &options.labels);
                let span = rendered.matches('\n').count().max(1);
                merged.push_str(&rendered);
                markers.push(ConflictMarker {
                    start_line,
                    end_line: start_line + span - 1,
                });
            }
        }
    }

    if !markers.is_empty() {
        debug!(
            conflicts = markers.len(),
            style = options.style.name(),
            "three-way merge produced conflicts"
        );
    }

    MergeResult {
        merged_content: merged,
        has_conflicts: !markers.is_empty(),
        conflict_markers: markers,
    }
}

// ---------------------------------------------------------------------------
// Diff3 walk
// ---------------------------------------------------------------------------

/// Line counts consumed so far in each document.
#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    a: usize,
    o: usize,
    b: usize,
}

struct Diff3<'t> {
    a: Vec<&'t str>,
    o: Vec<&'t str>,
    b: Vec<&'t str>,
    /// 1-indexed `O` line -> 1-indexed `A` line.
    matches_a: HashMap<usize, usize>,
    /// 1-indexed `O` line -> 1-indexed `B` line.
    matches_b: HashMap<usize, usize>,
    cursor: Cursor,
    chunks: Vec<MergeChunk>,
}

impl<'t> Diff3<'t> {
    fn new(a: &'t str, o: &'t str, b: &'t str) -> Self {
        Self {
            matches_a: alignment(&diff_lines(o, a)),
            matches_b: alignment(&diff_lines(o, b)),
            a: split_lines(a),
            o: split_lines(o),
            b: split_lines(b),
            cursor: Cursor::default(),
            chunks: Vec::new(),
        }
    }

    fn into_chunks(mut self) -> Vec<MergeChunk> {
        self.merge();
        self.chunks
    }

    fn merge(&mut self) {
        loop {
            match self.find_mismatch() {
                Some(1) => match self.find_match() {
                    (o, Some(a), Some(b)) => self.push_chunk(a, o, b),
                    _ => {
                        self.push_remaining_chunk();
                        return;
                    }
                },
                Some(i) => {
                    let Cursor { a, o, b } = self.cursor;
                    self.push_chunk(a + i, o + i, b + i);
                }
                None => {
                    self.push_remaining_chunk();
                    return;
                }
            }
        }
    }

    /// Offset from the cursor to the first line where the three documents
    /// stop being aligned, or `None` if they stay aligned to the end.
    fn find_mismatch(&self) -> Option<usize> {
        let Cursor { a, o, b } = self.cursor;
        let mut i = 1;
        while a + i <= self.a.len() || b + i <= self.b.len() || o + i <= self.o.len() {
            if self.matches_a.get(&(o + i)) != Some(&(a + i))
                || self.matches_b.get(&(o + i)) != Some(&(b + i))
            {
                return Some(i);
            }
            i += 1;
        }
        None
    }

    /// The next `O` line after the cursor that both sides still contain.
    fn find_match(&self) -> (usize, Option<usize>, Option<usize>) {
        let mut o = self.cursor.o + 1;
        while o <= self.o.len()
            && !(self.matches_a.contains_key(&o) && self.matches_b.contains_key(&o))
        {
            o += 1;
        }
        (o, self.matches_a.get(&o).copied(), self.matches_b.get(&o).copied())
    }

    fn push_remaining_chunk(&mut self) {
        self.push_chunk(self.a.len() + 1, self.o.len() + 1, self.b.len() + 1);
    }

    /// Emit the chunk ending just before 1-indexed lines `a`, `o`, `b`.
    fn push_chunk(&mut self, a: usize, o: usize, b: usize) {
        let o_text = join_range(&self.o, self.cursor.o, o - 1);
        let a_text = join_range(&self.a, self.cursor.a, a - 1);
        let b_text = join_range(&self.b, self.cursor.b, b - 1);

        let chunk = if o_text == a_text && o_text == b_text {
            MergeChunk::Clean(o_text)
        } else if o_text == a_text {
            MergeChunk::Clean(b_text)
        } else if o_text == b_text {
            MergeChunk::Clean(a_text)
        } else if a_text == b_text {
            // both sides made the same change
            MergeChunk::Clean(a_text)
        } else {
            MergeChunk::Conflict {
                existing: a_text,
                ancestor: o_text,
                proposed: b_text,
            }
        };

        if !matches!(&chunk, MergeChunk::Clean(text) if text.is_empty()) {
            self.chunks.push(chunk);
        }

        self.cursor = Cursor {
            a: a - 1,
            o: o - 1,
            b: b - 1,
        };
    }
}

/// Build the 1-indexed line alignment implied by the equal runs of `runs`.
fn alignment(runs: &[DiffRun]) -> HashMap<usize, usize> {
    let mut matches = HashMap::new();
    let mut old_line = 1;
    let mut new_line = 1;

    for run in runs {
        let n = run.line_count();
        match run.kind {
            DiffKind::Equal => {
                for i in 0..n {
                    matches.insert(old_line + i, new_line + i);
                }
                old_line += n;
                new_line += n;
            }
            DiffKind::Delete => old_line += n,
            DiffKind::Insert => new_line += n,
        }
    }
    matches
}

fn join_range(lines: &[&str], start: usize, end: usize) -> String {
    let end = end.min(lines.len());
    let start = start.min(end);
    lines[start..end].concat()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merge(a: &str, o: &str, b: &str) -> MergeResult {
        Merger::three_way_merge(
            a,
            o,
            b,
            &MergeOptions {
                labels: ConflictLabels::new("existing", "ancestor", "proposed"),
                style: ConflictStyle::Diff3NoAncestor,
            },
        )
    }

    #[test]
    fn test_identical_files() {
        let base = "line1\nline2\nline3\n";
        let result = merge(base, base, base);
        assert!(!result.has_conflicts);
        assert!(result.conflict_markers.is_empty());
        assert_eq!(result.merged_content, base);
    }

    #[test]
    fn test_only_proposed_changed() {
        let result = merge("line1\nline2\n", "line1\nline2\n", "line1\nCHANGED\n");
        assert!(!result.has_conflicts);
        assert_eq!(result.merged_content, "line1\nCHANGED\n");
    }

    #[test]
    fn test_only_existing_changed() {
        let base = "line1\nline2\nline3\n";
        let result = merge("line1\nmodified\nline3\n", base, base);
        assert!(!result.has_conflicts);
        assert_eq!(result.merged_content, "line1\nmodified\nline3\n");
    }

    #[test]
    fn test_non_overlapping_changes() {
        let base = "aaa\nbbb\nccc\nddd\neee\n";
        let existing = "AAA\nbbb\nccc\nddd\neee\n";
        let proposed = "aaa\nbbb\nccc\nddd\nEEE\n";
        let result = merge(existing, base, proposed);
        assert!(!result.has_conflicts);
        assert_eq!(result.merged_content, "AAA\nbbb\nccc\nddd\nEEE\n");
    }

    #[test]
    fn test_true_conflict() {
        let result = merge("a\n", "x\n", "b\n");
        assert!(result.has_conflicts);
        assert!(result
            .merged_content
            .contains("<<<<<<< existing\na\n=======\nb\n>>>>>>> proposed\n"));
        assert_eq!(
            result.conflict_markers,
            vec![ConflictMarker {
                start_line: 1,
                end_line: 5
            }]
        );
    }

    #[test]
    fn test_conflict_in_middle_keeps_context() {
        let base = "line1\noriginal\nline3\n";
        let result = merge("line1\nours\nline3\n", base, "line1\ntheirs\nline3\n");
        assert!(result.has_conflicts);
        assert_eq!(
            result.merged_content,
            "line1\n<<<<<<< existing\nours\n=======\ntheirs\n>>>>>>> proposed\nline3\n"
        );
        assert_eq!(result.conflict_markers[0].start_line, 2);
        assert_eq!(result.conflict_markers[0].end_line, 6);
    }

    #[test]
    fn test_same_change_both_sides_is_clean() {
        let chunks = Merger::chunks("new\nkeep\n", "old\nkeep\n", "new\nkeep\n");
        assert!(!chunks.iter().any(MergeChunk::is_conflict));
        let result = merge("new\nkeep\n", "old\nkeep\n", "new\nkeep\n");
        assert_eq!(result.merged_content, "new\nkeep\n");
    }

    #[test]
    fn test_structured_conflict_chunk() {
        let chunks = Merger::chunks("top\na\nbottom\n", "top\nx\nbottom\n", "top\nb\nbottom\n");
        assert_eq!(
            chunks,
            vec![
                MergeChunk::Clean("top\n".into()),
                MergeChunk::Conflict {
                    existing: "a\n".into(),
                    ancestor: "x\n".into(),
                    proposed: "b\n".into(),
                },
                MergeChunk::Clean("bottom\n".into()),
            ]
        );
    }

    #[test]
    fn test_insertions_on_both_sides_at_different_places() {
        let base = "a\nb\nc\n";
        let existing = "a\nINSERTED-A\nb\nc\n";
        let proposed = "a\nb\nc\nINSERTED-B\n";
        let result = merge(existing, base, proposed);
        assert!(!result.has_conflicts);
        assert_eq!(result.merged_content, "a\nINSERTED-A\nb\nc\nINSERTED-B\n");
    }

    #[test]
    fn test_deletion_against_unchanged_side() {
        let base = "a\nb\nc\n";
        let result = merge("a\nc\n", base, base);
        assert!(!result.has_conflicts);
        assert_eq!(result.merged_content, "a\nc\n");
    }

    #[test]
    fn test_deletion_and_distant_edit_merge_cleanly() {
        let base = "a\nb\nc\nd\n";
        let existing = "a\nc\nd\n";
        let proposed = "a\nb\nc\nD\n";
        let result = merge(existing, base, proposed);
        assert!(!result.has_conflicts);
        assert_eq!(result.merged_content, "a\nc\nD\n");
    }

    #[test]
    fn test_missing_trailing_newline() {
        let result = merge("a\nb", "a\nb", "a\nc");
        assert!(!result.has_conflicts);
        assert_eq!(result.merged_content, "a\nc");
    }

    #[test]
    fn test_empty_ancestor_with_both_sides_added() {
        let result = merge("from existing\n", "", "from proposed\n");
        assert!(result.has_conflicts);
        assert!(result.merged_content.contains("from existing\n"));
        assert!(result.merged_content.contains("from proposed\n"));
    }

    #[test]
    fn test_deterministic_output() {
        let base = "1\n2\n3\n4\n5\n";
        let a = "1\nA\n3\n4\n5\n";
        let b = "1\nB\n3\n4\nFIVE\n";
        let first = merge(a, base, b);
        let second = merge(a, base, b);
        assert_eq!(first.merged_content, second.merged_content);
        assert!(first.merged_content.ends_with("FIVE\n"));
    }

    #[test]
    fn test_can_auto_merge() {
        let base = "aaa\nbbb\nccc\n";
        assert!(Merger::can_auto_merge(base, base, base));
        assert!(Merger::can_auto_merge("AAA\nbbb\nccc\n", base, base));
        assert!(Merger::can_auto_merge(base, base, "aaa\nbbb\nCCC\n"));
        assert!(Merger::can_auto_merge(
            "XXX\nbbb\nccc\n",
            base,
            "XXX\nbbb\nccc\n"
        ));
        assert!(Merger::can_auto_merge(
            "AAA\nbbb\nccc\n",
            base,
            "aaa\nbbb\nCCC\n"
        ));
    }

    #[test]
    fn test_cannot_auto_merge() {
        let base = "line1\noriginal\nline3\n";
        assert!(!Merger::can_auto_merge(
            "line1\nours\nline3\n",
            base,
            "line1\ntheirs\nline3\n"
        ));
    }

    #[test]
    fn test_alignment_from_runs() {
        let runs = diff_lines("a\nb\nc\n", "a\nX\nc\n");
        let matches = alignment(&runs);
        assert_eq!(matches.get(&1), Some(&1));
        assert_eq!(matches.get(&2), None);
        assert_eq!(matches.get(&3), Some(&3));
    }
}
