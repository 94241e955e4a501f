//! Line-level diff adapter.
//!
//! Wraps the `similar` diff primitive and reduces its output to ordered
//! equal/insert/delete runs over whole lines. Concatenating the `Equal` and
//! `Delete` runs reproduces the old text byte-for-byte; `Equal` and `Insert`
//! reproduce the new text.

use similar::{Algorithm, DiffTag};

/// Kind of a diff run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    Equal,
    Insert,
    Delete,
}

/// A contiguous run of lines sharing one [`DiffKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffRun {
    pub kind: DiffKind,
    pub text: String,
}

impl DiffRun {
    /// Number of complete (newline-terminated) lines in this run.
    pub fn line_count(&self) -> usize {
        count_lines(&self.text)
    }
}

/// Split `s` on `\n`, keeping the newline on every line but the last.
///
/// Joining the result reproduces `s` exactly. A string ending in `\n` yields a
/// trailing empty element, and the empty string yields `[""]`.
pub fn split_lines(s: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = s.split_inclusive('\n').collect();
    if s.is_empty() || s.ends_with('\n') {
        lines.push("");
    }
    lines
}

/// Count `\n` characters in `s`.
pub fn count_lines(s: &str) -> usize {
    s.bytes().filter(|&b| b == b'\n').count()
}

/// Diff `old` against `new` line by line.
///
/// Within each stretch between equal runs, all deleted lines are emitted as a
/// single `Delete` run followed by a single `Insert` run, so adjacent
/// same-kind runs never appear.
pub fn diff_lines(old: &str, new: &str) -> Vec<DiffRun> {
    let old_lines: Vec<&str> = old.split_inclusive('\n').collect();
    let new_lines: Vec<&str> = new.split_inclusive('\n').collect();

    let ops = similar::capture_diff_slices(Algorithm::Myers, &old_lines, &new_lines);

    let mut builder = RunBuilder::default();
    for op in ops {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        match tag {
            DiffTag::Equal => builder.equal(old_lines[old_range].concat()),
            DiffTag::Delete => builder.delete(&old_lines[old_range]),
            DiffTag::Insert => builder.insert(&new_lines[new_range]),
            DiffTag::Replace => {
                builder.delete(&old_lines[old_range]);
                builder.insert(&new_lines[new_range]);
            }
        }
    }
    builder.finish()
}

#[derive(Default)]
struct RunBuilder {
    runs: Vec<DiffRun>,
    deleted: String,
    inserted: String,
}

impl RunBuilder {
    fn equal(&mut self, text: String) {
        self.flush();
        if text.is_empty() {
            return;
        }
        match self.runs.last_mut() {
            Some(last) if last.kind == DiffKind::Equal => last.text.push_str(&text),
            _ => self.runs.push(DiffRun {
                kind: DiffKind::Equal,
                text,
            }),
        }
    }

    fn delete(&mut self, lines: &[&str]) {
        self.deleted.extend(lines.iter().copied());
    }

    fn insert(&mut self, lines: &[&str]) {
        self.inserted.extend(lines.iter().copied());
    }

    fn flush(&mut self) {
        if !self.deleted.is_empty() {
            self.runs.push(DiffRun {
                kind: DiffKind::Delete,
                text: std::mem::take(&mut self.deleted),
            });
        }
        if !self.inserted.is_empty() {
            self.runs.push(DiffRun {
                kind: DiffKind::Insert,
                text: std::mem::take(&mut self.inserted),
            });
        }
    }

    fn finish(mut self) -> Vec<DiffRun> {
        self.flush();
        self.runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn side(runs: &[DiffRun], keep: DiffKind) -> String {
        runs.iter()
            .filter(|r| r.kind == DiffKind::Equal || r.kind == keep)
            .map(|r| r.text.as_str())
            .collect()
    }

    #[test]
    fn test_split_lines_keeps_newlines() {
        assert_eq!(split_lines("a\nb\n"), vec!["a\n", "b\n", ""]);
        assert_eq!(split_lines("a\nb"), vec!["a\n", "b"]);
        assert_eq!(split_lines(""), vec![""]);
        assert_eq!(split_lines("a\nb").concat(), "a\nb");
    }

    #[test]
    fn test_identical_inputs_are_one_equal_run() {
        let runs = diff_lines("one\ntwo\n", "one\ntwo\n");
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].kind, DiffKind::Equal);
        assert_eq!(runs[0].line_count(), 2);
    }

    #[test]
    fn test_runs_reproduce_both_sides() {
        let old = "a\nb\nc\nd\ne";
        let new = "a\nB\nc\nd\nx\ny";
        let runs = diff_lines(old, new);
        assert_eq!(side(&runs, DiffKind::Delete), old);
        assert_eq!(side(&runs, DiffKind::Insert), new);
    }

    #[test]
    fn test_changes_between_equal_runs_are_coalesced() {
        let runs = diff_lines("keep\nx1\nx2\nkeep2\n", "keep\ny1\ny2\ny3\nkeep2\n");
        let kinds: Vec<DiffKind> = runs.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiffKind::Equal,
                DiffKind::Delete,
                DiffKind::Insert,
                DiffKind::Equal
            ]
        );
        assert_eq!(runs[1].text, "x1\nx2\n");
        assert_eq!(runs[2].text, "y1\ny2\ny3\n");
    }

    #[test]
    fn test_empty_sides() {
        let runs = diff_lines("", "new\n");
        assert_eq!(
            runs,
            vec![DiffRun {
                kind: DiffKind::Insert,
                text: "new\n".into()
            }]
        );

        let runs = diff_lines("old\n", "");
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].kind, DiffKind::Delete);

        assert!(diff_lines("", "").is_empty());
    }

    #[test]
    fn test_missing_final_newline_differs() {
        let runs = diff_lines("a\nb", "a\nb\n");
        assert_eq!(side(&runs, DiffKind::Delete), "a\nb");
        assert_eq!(side(&runs, DiffKind::Insert), "a\nb\n");
        assert_eq!(runs[0].kind, DiffKind::Equal);
        assert_eq!(runs[0].text, "a\n");
    }
}
