//! The resynthesis driver.
//!
//! Reconciles a freshly generated (proposed) bundle with the user's
//! (existing) bundle, given the bundle both were generated from (ancestor):
//!
//! 1. Load the ownership strategies declared in the existing bundle.
//! 2. Collect every source path present in any of the three bundles.
//! 3. Resolve one strategy per path and apply it.
//! 4. Write each resolved file to the output bundle; absent results are
//!    removals.
//!
//! A failure on one file is recorded in the [`ResynthReport`] and never stops
//! the others.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::bundle::{create_context_file, source_path_set, write_bundle_file, BundleLayout};
use crate::config::ResynthConfig;
use crate::context_file::ContextFile;
use crate::conflict::count_conflict_markers;
use crate::errors::CoreError;
use crate::ownership::{
    load_strategy_locations, PackageIdentity, Strategy, StrategyLocations, FALLBACK_STRATEGY_ID,
};
use crate::strategy::{is_binary, ExternalMerge, ShellMergeDriver, StrategyRegistry};

/// The four bundle directories taking part in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResynthBundles {
    pub ancestor: PathBuf,
    pub existing: PathBuf,
    pub proposed: PathBuf,
    /// Where resolved files are written.
    pub output: PathBuf,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    /// The resolved file was written. `conflicted` is true when it still
    /// carries conflict markers.
    Written { conflicted: bool },
    /// The strategy resolved to no file.
    Removed,
    /// Resolving or writing the file failed.
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    /// Bundle-relative source path.
    pub source_path: String,
    /// Identifier of the strategy that governed the file.
    pub strategy: String,
    pub outcome: FileOutcome,
}

/// Per-file results of a run, in source path order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResynthReport {
    pub files: Vec<FileReport>,
}

impl ResynthReport {
    pub fn written(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Written { .. }))
    }

    pub fn conflicted(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Written { conflicted: true }))
    }

    pub fn removed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Removed))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Failed { .. }))
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    pub fn get(&self, source_path: &str) -> Option<&FileReport> {
        self.files.iter().find(|f| f.source_path == source_path)
    }

    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.outcome)).count()
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Runs resynthesis over a set of bundles.
pub struct Resynthesizer {
    layout: BundleLayout,
    registry: StrategyRegistry,
    package: Option<PackageIdentity>,
    declarations: Vec<(String, Strategy)>,
    driver: Box<dyn ExternalMerge>,
}

impl Default for Resynthesizer {
    fn default() -> Self {
        Self::new(BundleLayout::default())
    }
}

impl Resynthesizer {
    /// A driver using the built-in registry and the shell merge driver.
    pub fn new(layout: BundleLayout) -> Self {
        Self {
            layout,
            registry: StrategyRegistry::builtin(),
            package: None,
            declarations: Vec::new(),
            driver: Box::new(ShellMergeDriver::default()),
        }
    }

    pub fn from_config(config: &ResynthConfig) -> Self {
        Self::new(config.bundle_layout())
            .with_package(config.package_identity())
            .with_merge_driver(config.merge_driver())
    }

    pub fn with_registry(mut self, registry: StrategyRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Only strategies owned by `package` are honoured.
    pub fn with_package(mut self, package: PackageIdentity) -> Self {
        self.package = Some(package);
        self
    }

    pub fn with_merge_driver(mut self, driver: impl ExternalMerge + 'static) -> Self {
        self.driver = Box::new(driver);
        self
    }

    /// Declare a strategy in memory for `dir` (bundle-relative).
    pub fn declare(mut self, dir: impl Into<String>, strategy: Strategy) -> Self {
        self.declarations.push((dir.into(), strategy));
        self
    }

    pub fn layout(&self) -> &BundleLayout {
        &self.layout
    }

    /// Load the strategies that govern a run against `existing`.
    pub fn load_strategies(&self, existing: &Path) -> Result<StrategyLocations, CoreError> {
        let mut locations =
            load_strategy_locations(existing, &self.layout, &self.registry, self.package.as_ref())?;
        for (dir, strategy) in &self.declarations {
            locations.declare(dir.clone(), strategy.clone());
        }
        Ok(locations)
    }

    /// Resynthesize every source file into `bundles.output`.
    ///
    /// Errors loading strategies or listing files abort the run; errors on a
    /// single file are recorded in the report.
    #[instrument(skip_all, fields(existing = %bundles.existing.display(), output = %bundles.output.display()))]
    pub fn run(&self, bundles: &ResynthBundles) -> Result<ResynthReport, CoreError> {
        let locations = self.load_strategies(&bundles.existing)?;
        for line in strategy_table(&locations) {
            info!("<<STRATEGY>> {line}");
        }

        let source_paths = source_path_set(
            &[
                bundles.ancestor.as_path(),
                bundles.existing.as_path(),
                bundles.proposed.as_path(),
            ],
            &self.layout,
        )?;
        info!(files = source_paths.len(), "resolving source files");

        let mut report = ResynthReport::default();
        for source_path in source_paths {
            let strategy = locations.resolve(&source_path);
            let outcome = match self.resynth_file(bundles, &source_path, &strategy) {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(path = %source_path, strategy = %strategy.identifier, error = %e, "failed to resolve file");
                    FileOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            report.files.push(FileReport {
                source_path,
                strategy: strategy.identifier.clone(),
                outcome,
            });
        }

        info!(
            written = report.written(),
            conflicted = report.conflicted(),
            removed = report.removed(),
            failed = report.failed(),
            "resynthesis complete"
        );
        Ok(report)
    }

    fn resynth_file(
        &self,
        bundles: &ResynthBundles,
        source_path: &str,
        strategy: &Strategy,
    ) -> Result<FileOutcome, CoreError> {
        let ancestor = create_context_file(&bundles.ancestor, source_path, &self.layout)?;
        let existing = create_context_file(&bundles.existing, source_path, &self.layout)?;
        let proposed = create_context_file(&bundles.proposed, source_path, &self.layout)?;

        let resolved = strategy.merge.apply_with(
            &*self.driver,
            ancestor.as_ref(),
            existing.as_ref(),
            proposed.as_ref(),
        )?;

        let Some(resolved) = resolved else {
            info!(path = %source_path, strategy = %strategy.identifier, "removed");
            return Ok(FileOutcome::Removed);
        };

        let conflicted = !is_binary(&resolved.content)
            && introduces_conflicts(&resolved, [&ancestor, &existing, &proposed]);
        let output_path = self
            .layout
            .source_path(&resolved.repository_name, &resolved.path);
        write_bundle_file(&bundles.output, &output_path, &resolved.content)?;

        info!(path = %source_path, strategy = %strategy.identifier, conflicted, "resolved");
        Ok(FileOutcome::Written { conflicted })
    }
}

/// Whether `resolved` carries more conflict markers than any input revision,
/// so markers already present in a user's file are not reported again.
fn introduces_conflicts(resolved: &ContextFile, inputs: [&Option<ContextFile>; 3]) -> bool {
    let inherited = inputs
        .into_iter()
        .flatten()
        .map(|f| count_conflict_markers(&f.text()))
        .max()
        .unwrap_or(0);
    count_conflict_markers(&resolved.text()) > inherited
}

/// One line per loaded strategy, then the system fallback:
/// `[<location>] [<identifier>] matches [<globs>]`.
pub fn strategy_table(locations: &StrategyLocations) -> Vec<String> {
    let mut lines: Vec<String> = locations
        .iter()
        .flat_map(|(location, strategies)| {
            strategies.iter().map(move |strategy| {
                format!(
                    "[{}] [{}] matches [{}]",
                    location,
                    strategy.identifier,
                    strategy.globs.join(",")
                )
            })
        })
        .collect();
    lines.push(format!("[SYS-FALLBACK] [{FALLBACK_STRATEGY_ID}] matches [*]"));
    lines
}
