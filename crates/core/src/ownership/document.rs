//! Ownership file parsing and serialization.
//!
//! ```text
//! [three_way_merge] @scope/my-package
//! # Files the package keeps merging after the user edits them
//! *.ts
//! !generated.ts
//!
//! [local] ./scripts/merge.sh %O %A %B
//! package.json
//! ```
//!
//! A header line opens a strategy block, `#` lines are comments, and every
//! other non-blank line is a glob belonging to the most recent block.

use std::path::Path;
use std::sync::LazyLock;

use regex_lite::Regex;
use tracing::debug;

use crate::errors::OwnershipError;
use crate::strategy::{BuiltinStrategy, LocalCommand, MergeStrategy, StrategyRegistry, LOCAL_STRATEGY_ID};

/// Default name of an ownership file.
pub const DEFAULT_OWNERSHIP_FILE_NAME: &str = ".ownership-file";

/// Identifier of the strategy used when no ownership glob matches.
pub const FALLBACK_STRATEGY_ID: &str = "FALLBACK_never_update";

const INTERNAL_STRATEGY_COMMENT: &str = "Internal merge strategy:";

/// Strategy header, e.g. `[three_way_merge] @scope/my-package`.
static HEADER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(?P<identifier>.+)\]\s+(?P<owner>.+)$").expect("header pattern is valid")
});

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// A named, owner-scoped, glob-scoped merge function.
#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub identifier: String,
    /// Package pattern owning the strategy, or the command template for
    /// `local` strategies. `None` means the current package.
    pub owner: Option<String>,
    pub description: Option<String>,
    /// Matched last to first; the last matching glob decides.
    pub globs: Vec<String>,
    pub merge: MergeStrategy,
}

impl Strategy {
    pub fn new(identifier: impl Into<String>, merge: impl Into<MergeStrategy>) -> Self {
        Self {
            identifier: identifier.into(),
            owner: None,
            description: None,
            globs: Vec::new(),
            merge: merge.into(),
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_globs<I, S>(mut self, globs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.globs = globs.into_iter().map(Into::into).collect();
        self
    }

    /// The conservative default: keep the existing file, for every path.
    pub fn fallback() -> Self {
        Self::new(FALLBACK_STRATEGY_ID, BuiltinStrategy::NeverUpdate)
            .with_owner("*")
            .with_globs(["*"])
    }

    pub fn is_local(&self) -> bool {
        matches!(self.merge, MergeStrategy::Local(_))
    }

    /// Whether `path` (relative to the strategy's directory) is governed by
    /// this strategy. Globs starting with `!` exclude.
    pub fn matches(&self, path: &str) -> bool {
        self.globs
            .iter()
            .rev()
            .find_map(|glob| match glob.strip_prefix('!') {
                Some(negated) => glob_match::glob_match(negated, path).then_some(false),
                None => glob_match::glob_match(glob, path).then_some(true),
            })
            .unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// OwnershipDocument
// ---------------------------------------------------------------------------

/// The strategies declared by one ownership file, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OwnershipDocument {
    pub strategies: Vec<Strategy>,
}

impl OwnershipDocument {
    pub fn new(strategies: Vec<Strategy>) -> Self {
        Self { strategies }
    }

    /// Parse an ownership file.
    ///
    /// Identifiers are looked up in `registry`; blocks with unknown
    /// identifiers are skipped together with their globs. `local` blocks run
    /// their owner as a command in `working_dir`.
    pub fn parse(
        content: &str,
        registry: &StrategyRegistry,
        working_dir: &Path,
    ) -> Result<Self, OwnershipError> {
        let mut strategies: Vec<Strategy> = Vec::new();
        // None before the first header, Some(false) inside a skipped block.
        let mut in_known_block: Option<bool> = None;

        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(comment) = line.strip_prefix('#') {
                let comment = comment.trim();
                if in_known_block == Some(true) && !comment.starts_with(INTERNAL_STRATEGY_COMMENT) {
                    if let Some(current) = strategies.last_mut() {
                        if current.description.is_none() && !comment.is_empty() {
                            current.description = Some(comment.to_string());
                        }
                    }
                }
                continue;
            }

            if let Some(caps) = HEADER_PATTERN.captures(line) {
                let identifier = caps["identifier"].to_string();
                let owner = caps["owner"].trim().to_string();

                let merge = if identifier == LOCAL_STRATEGY_ID {
                    Some(MergeStrategy::Local(LocalCommand::new(owner.clone(), working_dir)))
                } else {
                    registry.get(&identifier).cloned()
                };

                match merge {
                    Some(merge) => {
                        strategies.push(Strategy {
                            identifier,
                            owner: Some(owner),
                            description: None,
                            globs: Vec::new(),
                            merge,
                        });
                        in_known_block = Some(true);
                    }
                    None => {
                        debug!(identifier = %identifier, line = index + 1, "skipping unknown strategy");
                        in_known_block = Some(false);
                    }
                }
                continue;
            }

            match in_known_block {
                None => {
                    return Err(OwnershipError::Syntax {
                        line: index + 1,
                        message: "encountered unexpected glob outside of a strategy section".into(),
                    })
                }
                Some(false) => {}
                Some(true) => {
                    if let Some(current) = strategies.last_mut() {
                        current.globs.push(line.to_string());
                    }
                }
            }
        }

        Ok(Self { strategies })
    }

    /// Render the document in ownership file syntax.
    ///
    /// Strategies without an owner are attributed to `package_name`.
    pub fn to_ownership_string(&self, package_name: Option<&str>) -> Result<String, OwnershipError> {
        let mut out = String::new();

        for strategy in &self.strategies {
            let owner = strategy
                .owner
                .as_deref()
                .or(package_name)
                .filter(|owner| !owner.is_empty())
                .ok_or_else(|| OwnershipError::MissingOwner {
                    identifier: strategy.identifier.clone(),
                })?;

            out.push_str(&format!("[{}] {}\n", strategy.identifier, owner));
            if let Some(description) = &strategy.description {
                out.push_str(&format!("# {description}\n"));
            }
            out.push_str(&format!(
                "# {} {}\n",
                INTERNAL_STRATEGY_COMMENT,
                strategy.merge.name()
            ));
            for glob in &strategy.globs {
                out.push_str(glob);
                out.push('\n');
            }
            out.push('\n');
        }

        let mut trimmed = out.trim_end().to_string();
        trimmed.push('\n');
        Ok(trimmed)
    }
}
