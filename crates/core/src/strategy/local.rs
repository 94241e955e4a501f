//! External merge commands declared as `local` strategies.
//!
//! The command follows git's custom merge driver convention: `%O`, `%A` and
//! `%B` are replaced with paths to temp files holding the ancestor, existing
//! and proposed contents, `%P` with the file's repository path and `%L` with
//! the conflict marker length. The command writes its result over the `%A`
//! file; deleting that file means the merged file must not exist.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info, instrument, warn};

use crate::conflict::CONFLICT_MARKER_LENGTH;
use crate::context_file::{ContextFile, FileIdentity};
use crate::errors::{ExternalCommandError, MergeError};

/// A `local` strategy: a command template and the directory it runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCommand {
    /// Command template with `%O %A %B %P %L` placeholders.
    pub command: String,
    /// Working directory for the command, normally the directory holding
    /// the ownership file that declared it.
    pub working_dir: PathBuf,
}

impl LocalCommand {
    pub fn new(command: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            working_dir: working_dir.into(),
        }
    }

    /// Resolve one file with the default shell driver.
    pub fn apply(
        &self,
        ancestor: Option<&ContextFile>,
        existing: Option<&ContextFile>,
        proposed: Option<&ContextFile>,
    ) -> Result<Option<ContextFile>, MergeError> {
        self.apply_with(&ShellMergeDriver::default(), ancestor, existing, proposed)
    }

    /// Resolve one file through `driver`.
    pub fn apply_with(
        &self,
        driver: &dyn ExternalMerge,
        ancestor: Option<&ContextFile>,
        existing: Option<&ContextFile>,
        proposed: Option<&ContextFile>,
    ) -> Result<Option<ContextFile>, MergeError> {
        let identity = FileIdentity::resolve(ancestor, existing, proposed)?;

        let inputs = MergeInputs {
            ancestor: content_or_empty(ancestor),
            existing: content_or_empty(existing),
            proposed: content_or_empty(proposed),
            path: &identity.path,
        };
        let resolved = driver.run_external_merge(self, &inputs)?;

        Ok(resolved.map(|content| identity.into_file(content)))
    }
}

/// Contents handed to an external merge. Absent revisions are empty.
#[derive(Debug, Clone, Copy)]
pub struct MergeInputs<'a> {
    pub ancestor: &'a [u8],
    pub existing: &'a [u8],
    pub proposed: &'a [u8],
    /// Repository-relative path of the file being merged.
    pub path: &'a str,
}

/// Runs an external merge and returns the resolved content, or `None` when
/// the command deleted the result file.
pub trait ExternalMerge {
    fn run_external_merge(
        &self,
        command: &LocalCommand,
        inputs: &MergeInputs<'_>,
    ) -> Result<Option<Vec<u8>>, ExternalCommandError>;
}

// ---------------------------------------------------------------------------
// Shell driver
// ---------------------------------------------------------------------------

/// Runs the command through `sh -c` inside a fresh temp directory.
///
/// Each call gets its own directory, removed when the call returns.
#[derive(Debug, Clone, Default)]
pub struct ShellMergeDriver {
    /// Parent for per-merge temp directories. Defaults to the system temp dir.
    pub temp_root: Option<PathBuf>,
}

impl ShellMergeDriver {
    pub fn new(temp_root: Option<PathBuf>) -> Self {
        Self { temp_root }
    }

    fn temp_dir(&self) -> std::io::Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("resynth-merge-");
        match &self.temp_root {
            Some(root) => {
                fs::create_dir_all(root)?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
    }
}

impl ExternalMerge for ShellMergeDriver {
    #[instrument(skip(self, inputs), fields(command = %command.command, path = inputs.path))]
    fn run_external_merge(
        &self,
        command: &LocalCommand,
        inputs: &MergeInputs<'_>,
    ) -> Result<Option<Vec<u8>>, ExternalCommandError> {
        let dir = self.temp_dir()?;

        let ancestor_path = write_temp_file(dir.path(), ".merge_file_ancestor", inputs.ancestor)?;
        let existing_path = write_temp_file(dir.path(), ".merge_file_existing", inputs.existing)?;
        let proposed_path = write_temp_file(dir.path(), ".merge_file_proposed", inputs.proposed)?;

        let rendered = format_local_command(
            &command.command,
            &ancestor_path,
            &existing_path,
            &proposed_path,
            inputs.path,
        );

        debug!(cmd = %rendered, cwd = %command.working_dir.display(), "running local merge command");
        let output = Command::new("sh")
            .arg("-c")
            .arg(&rendered)
            .current_dir(&command.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| ExternalCommandError::Spawn {
                command: rendered.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let exit_code = output.status.code().unwrap_or(-1);
            warn!(exit_code, %stderr, "local merge command failed");
            return Err(ExternalCommandError::NonZeroExit {
                command: rendered,
                exit_code,
                stderr,
            });
        }

        let resolved = match fs::read(&existing_path) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(source) => {
                return Err(ExternalCommandError::ReadResult {
                    path: existing_path,
                    source,
                })
            }
        };

        info!(
            path = inputs.path,
            deleted = resolved.is_none(),
            "local merge command completed"
        );
        Ok(resolved)
    }
}

/// Substitute the merge driver placeholders in a single pass, so text
/// produced by one substitution is never rescanned.
pub fn format_local_command(
    template: &str,
    ancestor: &Path,
    existing: &Path,
    proposed: &Path,
    path: &str,
) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('O') => out.push_str(&shell_quote(&ancestor.to_string_lossy())),
            Some('A') => out.push_str(&shell_quote(&existing.to_string_lossy())),
            Some('B') => out.push_str(&shell_quote(&proposed.to_string_lossy())),
            Some('P') => out.push_str(&shell_quote(path)),
            Some('L') => out.push_str(&CONFLICT_MARKER_LENGTH.to_string()),
            _ => {
                out.push('%');
                continue;
            }
        }
        chars.next();
    }
    out
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

fn write_temp_file(dir: &Path, name: &str, content: &[u8]) -> std::io::Result<PathBuf> {
    let path = dir.join(name);
    let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
    file.write_all(content)?;
    Ok(path)
}

fn content_or_empty(file: Option<&ContextFile>) -> &[u8] {
    file.map(|f| f.content.as_slice()).unwrap_or_default()
}
