//! Strategy resolution: which strategy governs a bundle path.
//!
//! Strategies are keyed by where they were declared: either an ownership file
//! path (`src/repo/.ownership-file`) or, for in-memory declarations, the
//! directory itself (`src/repo`). To resolve `src/repo/lib/a.ts` the resolver
//! visits `src/repo/lib`, `src/repo`, `src` and the bundle root in that order.
//! At each level holding strategies, the path is re-rooted to that directory
//! and the strategies are scanned last to first; the first whose globs match
//! wins. When nothing matches anywhere the fallback keeps the existing file.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::{debug, info, instrument};

use super::document::{OwnershipDocument, Strategy};
use super::owner::{OwnerPattern, PackageIdentity};
use crate::bundle::{walk_source_files, BundleLayout};
use crate::errors::OwnershipError;
use crate::strategy::StrategyRegistry;

/// Strategies indexed by declaration location.
#[derive(Debug, Clone)]
pub struct StrategyLocations {
    file_name: String,
    locations: BTreeMap<String, Vec<Strategy>>,
}

impl Default for StrategyLocations {
    fn default() -> Self {
        Self::new(super::DEFAULT_OWNERSHIP_FILE_NAME)
    }
}

impl StrategyLocations {
    /// Empty locations for ownership files named `file_name`.
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            locations: BTreeMap::new(),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Register the strategies of the ownership file at `ownership_path`
    /// (bundle-relative, POSIX).
    pub fn insert(&mut self, ownership_path: impl Into<String>, document: OwnershipDocument) {
        self.locations
            .entry(ownership_path.into())
            .or_default()
            .extend(document.strategies);
    }

    /// Declare a strategy in memory for the directory `dir` (bundle-relative,
    /// POSIX, `""` for the bundle root).
    pub fn declare(&mut self, dir: impl Into<String>, strategy: Strategy) {
        let dir = dir.into();
        let dir = dir.trim_matches('/').to_string();
        self.locations.entry(dir).or_default().push(strategy);
    }

    /// Declaration locations and their strategies, sorted by location.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Strategy])> {
        self.locations
            .iter()
            .map(|(location, strategies)| (location.as_str(), strategies.as_slice()))
    }

    pub fn strategy_count(&self) -> usize {
        self.locations.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.strategy_count() == 0
    }

    /// Find the strategy governing `path` (bundle-relative, POSIX).
    pub fn resolve(&self, path: &str) -> Cow<'_, Strategy> {
        let mut directories: Vec<&str> = path.split('/').collect();

        while directories.pop().is_some() {
            let dir = directories.join("/");
            let ownership_path = if dir.is_empty() {
                self.file_name.clone()
            } else {
                format!("{dir}/{}", self.file_name)
            };

            let declared = self.locations.get(&dir).map(Vec::as_slice).unwrap_or_default();
            let from_file = self
                .locations
                .get(&ownership_path)
                .map(Vec::as_slice)
                .unwrap_or_default();
            if declared.is_empty() && from_file.is_empty() {
                continue;
            }

            let relative = if dir.is_empty() {
                path
            } else {
                path.strip_prefix(dir.as_str())
                    .and_then(|rest| rest.strip_prefix('/'))
                    .unwrap_or(path)
            };

            if let Some(strategy) = declared
                .iter()
                .chain(from_file)
                .rev()
                .find(|strategy| strategy.matches(relative))
            {
                debug!(path, level = %dir, strategy = %strategy.identifier, "matched strategy");
                return Cow::Borrowed(strategy);
            }
        }

        debug!(path, "no strategy matched, using fallback");
        Cow::Owned(Strategy::fallback())
    }

    /// Keep only strategies owned by `package`. Strategies without an owner
    /// and `local` strategies are always kept.
    pub fn filter_strategies(mut self, package: &PackageIdentity) -> Self {
        for (location, strategies) in self.locations.iter_mut() {
            strategies.retain(|strategy| {
                let keep = match &strategy.owner {
                    _ if strategy.is_local() => true,
                    None => true,
                    Some(owner) => OwnerPattern::new(owner).matches_package(package),
                };
                if !keep {
                    debug!(
                        location = %location,
                        strategy = %strategy.identifier,
                        owner = strategy.owner.as_deref().unwrap_or_default(),
                        "dropping strategy owned by another package"
                    );
                }
                keep
            });
        }
        self
    }
}

/// Parse every ownership file under `<bundle>/<source_prefix>`.
///
/// Files are read fresh on every call. `local` strategies run in the
/// directory of the ownership file that declares them. When `package` is
/// given, strategies owned by other packages are dropped.
#[instrument(skip_all, fields(bundle = %bundle.display()))]
pub fn load_strategy_locations(
    bundle: &Path,
    layout: &BundleLayout,
    registry: &StrategyRegistry,
    package: Option<&PackageIdentity>,
) -> Result<StrategyLocations, OwnershipError> {
    let mut locations = StrategyLocations::new(layout.ownership_file_name.as_str());

    for relative in walk_source_files(bundle, layout)? {
        let is_ownership_file = relative
            .rsplit('/')
            .next()
            .is_some_and(|name| name == layout.ownership_file_name);
        if !is_ownership_file {
            continue;
        }

        let full_path = bundle.join(&relative);
        let content = fs::read_to_string(&full_path).map_err(|source| OwnershipError::Io {
            path: full_path.clone(),
            source,
        })?;
        let working_dir = full_path.parent().unwrap_or(bundle);

        let document = OwnershipDocument::parse(&content, registry, working_dir).map_err(|e| {
            match e {
                OwnershipError::Syntax { line, message } => OwnershipError::Syntax {
                    line,
                    message: format!("{message} ({relative})"),
                },
                other => other,
            }
        })?;
        debug!(file = %relative, strategies = document.strategies.len(), "parsed ownership file");
        locations.insert(relative, document);
    }

    let locations = match package {
        Some(package) => locations.filter_strategies(package),
        None => locations,
    };

    info!(strategies = locations.strategy_count(), "loaded ownership strategies");
    Ok(locations)
}
