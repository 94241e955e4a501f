//! Conflict rendering.
//!
//! A conflicting chunk is rendered as text using one of several
//! [`ConflictStyle`]s. Marker lines are seven characters long (`<<<<<<<`,
//! `|||||||`, `=======`, `>>>>>>>`), optionally followed by a space and a
//! label, matching what git and other VCS tooling emit.

use serde::{Deserialize, Serialize};

use super::diff::split_lines;

/// Length of every conflict marker.
pub const CONFLICT_MARKER_LENGTH: usize = 7;

/// Optional labels appended to the conflict markers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictLabels {
    pub existing: Option<String>,
    pub ancestor: Option<String>,
    pub proposed: Option<String>,
}

impl ConflictLabels {
    pub fn new(existing: &str, ancestor: &str, proposed: &str) -> Self {
        Self {
            existing: Some(existing.to_string()),
            ancestor: Some(ancestor.to_string()),
            proposed: Some(proposed.to_string()),
        }
    }
}

/// How a conflicting chunk is turned into text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStyle {
    /// Three-section block including the ancestor text.
    Diff3,
    /// Two-section block without the ancestor.
    Diff3NoAncestor,
    /// Take the existing side verbatim.
    PreferExisting,
    /// Take the proposed side verbatim.
    PreferProposed,
    /// Keep the common leading and trailing lines of both sides outside a
    /// two-section block around the differing interior.
    #[default]
    TrimEnds,
}

impl ConflictStyle {
    pub fn format(
        self,
        existing: &str,
        ancestor: &str,
        proposed: &str,
        labels: &ConflictLabels,
    ) -> String {
        match self {
            Self::Diff3 => diff3(existing, ancestor, proposed, labels),
            Self::Diff3NoAncestor => diff3_no_ancestor(existing, proposed, labels),
            Self::PreferExisting => existing.to_string(),
            Self::PreferProposed => proposed.to_string(),
            Self::TrimEnds => trim_ends(existing, proposed, labels),
        }
    }

    /// Whether output in this style can contain conflict markers.
    pub fn emits_markers(self) -> bool {
        !matches!(self, Self::PreferExisting | Self::PreferProposed)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Diff3 => "diff3",
            Self::Diff3NoAncestor => "diff3_no_ancestor",
            Self::PreferExisting => "prefer_existing",
            Self::PreferProposed => "prefer_proposed",
            Self::TrimEnds => "trim_ends",
        }
    }
}

impl std::str::FromStr for ConflictStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "diff3" => Ok(Self::Diff3),
            "diff3_no_ancestor" => Ok(Self::Diff3NoAncestor),
            "prefer_existing" => Ok(Self::PreferExisting),
            "prefer_proposed" => Ok(Self::PreferProposed),
            "trim_ends" => Ok(Self::TrimEnds),
            other => Err(format!("unknown conflict style '{other}'")),
        }
    }
}

/// Render a full three-section conflict block.
pub fn diff3(existing: &str, ancestor: &str, proposed: &str, labels: &ConflictLabels) -> String {
    conflict_block(existing, Some(ancestor), proposed, labels)
}

/// Render a two-section conflict block, omitting the ancestor.
pub fn diff3_no_ancestor(existing: &str, proposed: &str, labels: &ConflictLabels) -> String {
    conflict_block(existing, None, proposed, labels)
}

/// Render only the differing interior of `existing` and `proposed` as a
/// conflict, keeping their longest common line prefix and suffix verbatim.
pub fn trim_ends(existing: &str, proposed: &str, labels: &ConflictLabels) -> String {
    let a_lines = split_lines(existing);
    let b_lines = split_lines(proposed);
    let min_len = a_lines.len().min(b_lines.len());

    let prefix = a_lines
        .iter()
        .zip(&b_lines)
        .take_while(|(a, b)| a == b)
        .count();

    let suffix = a_lines
        .iter()
        .rev()
        .zip(b_lines.iter().rev())
        .take(min_len - prefix)
        .take_while(|(a, b)| a == b)
        .count();

    let a_conflict = &a_lines[prefix..a_lines.len() - suffix];
    let b_conflict = &b_lines[prefix..b_lines.len() - suffix];

    let mut out: String = a_lines[..prefix].concat();
    if !a_conflict.is_empty() || !b_conflict.is_empty() {
        out.push_str(&conflict_block(
            &a_conflict.concat(),
            None,
            &b_conflict.concat(),
            labels,
        ));
    }
    out.push_str(&a_lines[a_lines.len() - suffix..].concat());
    out
}

/// True when `text` contains a line starting with an opening conflict marker.
pub fn contains_conflict_markers(text: &str) -> bool {
    count_conflict_markers(text) > 0
}

/// Number of lines starting with an opening conflict marker.
pub fn count_conflict_markers(text: &str) -> usize {
    let open = "<".repeat(CONFLICT_MARKER_LENGTH);
    text.lines().filter(|line| line.starts_with(&open)).count()
}

fn conflict_block(
    existing: &str,
    ancestor: Option<&str>,
    proposed: &str,
    labels: &ConflictLabels,
) -> String {
    let mut out = String::new();

    out.push_str(&marker('<', labels.existing.as_deref()));
    push_section(&mut out, existing);

    if let Some(ancestor) = ancestor {
        out.push_str(&marker('|', labels.ancestor.as_deref()));
        push_section(&mut out, ancestor);
    }

    out.push_str(&marker('=', None));
    push_section(&mut out, proposed);
    out.push_str(&marker('>', labels.proposed.as_deref()));
    out
}

/// Append `text`, terminating it with a newline so the next marker starts a
/// fresh line. An empty section adds nothing.
fn push_section(out: &mut String, text: &str) {
    out.push_str(text);
    if !text.is_empty() && !text.ends_with('\n') {
        out.push('\n');
    }
}

fn marker(kind: char, label: Option<&str>) -> String {
    let mut line: String = std::iter::repeat(kind).take(CONFLICT_MARKER_LENGTH).collect();
    if let Some(label) = label.filter(|l| !l.is_empty()) {
        line.push(' ');
        line.push_str(label);
    }
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> ConflictLabels {
        ConflictLabels::new("existing", "ancestor", "proposed")
    }

    #[test]
    fn test_diff3_includes_ancestor() {
        let out = diff3("line 1 a\nline 2", "line 1 o\nline 2", "line 1 b\nline 2", &labels());
        assert_eq!(
            out,
            "<<<<<<< existing\nline 1 a\nline 2\n\
             ||||||| ancestor\nline 1 o\nline 2\n\
             =======\nline 1 b\nline 2\n\
             >>>>>>> proposed\n"
        );
    }

    #[test]
    fn test_diff3_no_ancestor() {
        let out = diff3_no_ancestor("a\n", "b\n", &labels());
        assert_eq!(out, "<<<<<<< existing\na\n=======\nb\n>>>>>>> proposed\n");
    }

    #[test]
    fn test_markers_without_labels() {
        let out = diff3_no_ancestor("a\n", "b\n", &ConflictLabels::default());
        assert_eq!(out, "<<<<<<<\na\n=======\nb\n>>>>>>>\n");
    }

    #[test]
    fn test_prefer_sides() {
        let labels = labels();
        assert_eq!(
            ConflictStyle::PreferExisting.format("a", "o", "b", &labels),
            "a"
        );
        assert_eq!(
            ConflictStyle::PreferProposed.format("a", "o", "b", &labels),
            "b"
        );
        assert!(!ConflictStyle::PreferProposed.emits_markers());
        assert!(ConflictStyle::TrimEnds.emits_markers());
    }

    #[test]
    fn test_trim_ends_keeps_common_prefix_and_suffix() {
        let prefix = "common prefix line\n".repeat(3);
        let suffix = "common suffix line\n".repeat(3);
        let a = format!("{prefix}some contents from a\n{suffix}");
        let b = format!("{prefix}some contents from b\n{suffix}");

        let out = trim_ends(&a, &b, &labels());
        assert_eq!(
            out,
            format!(
                "{prefix}<<<<<<< existing\nsome contents from a\n=======\nsome contents from b\n>>>>>>> proposed\n{suffix}"
            )
        );
    }

    #[test]
    fn test_trim_ends_without_trailing_newline() {
        let out = trim_ends("line 1 a\nline 2", "line 1 b\nline 2", &labels());
        assert_eq!(
            out,
            "<<<<<<< existing\nline 1 a\n=======\nline 1 b\n>>>>>>> proposed\nline 2"
        );
    }

    #[test]
    fn test_trim_ends_identical_sides_is_verbatim() {
        let out = trim_ends("same\ntext\n", "same\ntext\n", &labels());
        assert_eq!(out, "same\ntext\n");
    }

    #[test]
    fn test_trim_ends_one_side_empty() {
        let out = trim_ends("", "added\n", &labels());
        assert_eq!(out, "<<<<<<< existing\n=======\nadded\n>>>>>>> proposed\n");
    }

    #[test]
    fn test_contains_conflict_markers() {
        assert!(contains_conflict_markers("x\n<<<<<<< existing\na\n"));
        assert!(!contains_conflict_markers("x << y\n"));
    }

    #[test]
    fn test_count_conflict_markers() {
        let text = "<<<<<<< a\n1\n=======\n2\n>>>>>>> b\nmid\n<<<<<<< a\n>>>>>>> b\n";
        assert_eq!(count_conflict_markers(text), 2);
        assert_eq!(count_conflict_markers("no markers\n"), 0);
    }

    #[test]
    fn test_style_names_round_trip() {
        for style in [
            ConflictStyle::Diff3,
            ConflictStyle::Diff3NoAncestor,
            ConflictStyle::PreferExisting,
            ConflictStyle::PreferProposed,
            ConflictStyle::TrimEnds,
        ] {
            assert_eq!(style.name().parse::<ConflictStyle>().unwrap(), style);
        }
        assert!("bogus".parse::<ConflictStyle>().is_err());
    }
}
