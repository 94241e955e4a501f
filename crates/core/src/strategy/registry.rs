//! Strategy registry and the callable strategy variant.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::builtin::BuiltinStrategy;
use super::local::{ExternalMerge, LocalCommand, ShellMergeDriver};
use crate::context_file::ContextFile;
use crate::errors::MergeError;

/// Identifier reserved for external-command strategies.
pub const LOCAL_STRATEGY_ID: &str = "local";

/// Signature shared by every merge function.
pub type StrategyFn = dyn Fn(
        Option<&ContextFile>,
        Option<&ContextFile>,
        Option<&ContextFile>,
    ) -> Result<Option<ContextFile>, MergeError>
    + Send
    + Sync;

/// A merge function registered under a caller-chosen name.
#[derive(Clone)]
pub struct CustomStrategy {
    name: String,
    func: Arc<StrategyFn>,
}

impl CustomStrategy {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(
                Option<&ContextFile>,
                Option<&ContextFile>,
                Option<&ContextFile>,
            ) -> Result<Option<ContextFile>, MergeError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for CustomStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomStrategy")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl PartialEq for CustomStrategy {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Arc::ptr_eq(&self.func, &other.func)
    }
}

/// What a strategy does when it is applied to a file.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeStrategy {
    Builtin(BuiltinStrategy),
    Local(LocalCommand),
    Custom(CustomStrategy),
}

impl MergeStrategy {
    /// Name of the underlying merge function, for logs.
    pub fn name(&self) -> &str {
        match self {
            Self::Builtin(builtin) => builtin.name(),
            Self::Local(_) => LOCAL_STRATEGY_ID,
            Self::Custom(custom) => custom.name(),
        }
    }

    /// Apply the strategy, running local commands through the shell driver.
    pub fn apply(
        &self,
        ancestor: Option<&ContextFile>,
        existing: Option<&ContextFile>,
        proposed: Option<&ContextFile>,
    ) -> Result<Option<ContextFile>, MergeError> {
        self.apply_with(&ShellMergeDriver::default(), ancestor, existing, proposed)
    }

    /// Apply the strategy, running local commands through `driver`.
    pub fn apply_with(
        &self,
        driver: &dyn ExternalMerge,
        ancestor: Option<&ContextFile>,
        existing: Option<&ContextFile>,
        proposed: Option<&ContextFile>,
    ) -> Result<Option<ContextFile>, MergeError> {
        match self {
            Self::Builtin(builtin) => builtin.apply(ancestor, existing, proposed),
            Self::Local(command) => command.apply_with(driver, ancestor, existing, proposed),
            Self::Custom(custom) => (custom.func)(ancestor, existing, proposed),
        }
    }
}

impl From<BuiltinStrategy> for MergeStrategy {
    fn from(builtin: BuiltinStrategy) -> Self {
        Self::Builtin(builtin)
    }
}

impl From<CustomStrategy> for MergeStrategy {
    fn from(custom: CustomStrategy) -> Self {
        Self::Custom(custom)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Immutable mapping from strategy identifiers to merge functions.
///
/// Built once and passed by reference to the ownership parser. The `local`
/// identifier is never looked up here; it is bound at parse time.
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    entries: HashMap<String, MergeStrategy>,
}

impl StrategyRegistry {
    /// An empty registry. Every identifier other than `local` is dropped.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry holding every [`BuiltinStrategy`] under its own name.
    pub fn builtin() -> Self {
        BuiltinStrategy::ALL
            .into_iter()
            .map(|s| (s.name().to_string(), MergeStrategy::Builtin(s)))
            .collect()
    }

    /// Add or replace an entry, builder style.
    pub fn with(mut self, identifier: impl Into<String>, strategy: impl Into<MergeStrategy>) -> Self {
        self.entries.insert(identifier.into(), strategy.into());
        self
    }

    pub fn get(&self, identifier: &str) -> Option<&MergeStrategy> {
        self.entries.get(identifier)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    /// Registered identifiers, sorted.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, MergeStrategy)> for StrategyRegistry {
    fn from_iter<I: IntoIterator<Item = (String, MergeStrategy)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
