//! Resynthesis command-line tool.
//!
//! Provides subcommands for resynthesizing a bundle, merging a single file
//! three ways, inspecting ownership files, and generating / validating
//! configuration files.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use resynth_core::config::ResynthConfig;
use resynth_core::conflict::{ConflictLabels, ConflictStyle, MergeOptions, Merger};
use resynth_core::ownership::{OwnershipDocument, StrategyLocations};
use resynth_core::pull_request::create_lifecycle_pull_request;
use resynth_core::resynth::{strategy_table, FileOutcome, ResynthBundles, Resynthesizer};
use resynth_core::strategy::StrategyRegistry;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Resynthesis command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "resynth",
    version,
    about = "Merge regenerated project files with local changes"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resynthesize a bundle from its ancestor, existing and proposed revisions.
    Run {
        /// Bundle the existing and proposed bundles were generated from.
        #[arg(long)]
        ancestor: PathBuf,

        /// The user's current bundle.
        #[arg(long)]
        existing: PathBuf,

        /// The freshly generated bundle.
        #[arg(long)]
        proposed: PathBuf,

        /// Output bundle directory.
        #[arg(short, long)]
        outdir: PathBuf,

        /// Print the per-file report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Three-way merge a single file and print the result.
    MergeFile {
        existing: PathBuf,
        ancestor: PathBuf,
        proposed: PathBuf,

        /// Conflict style: diff3, diff3_no_ancestor, prefer_existing,
        /// prefer_proposed, trim_ends.
        #[arg(long, default_value = "trim_ends")]
        style: ConflictStyle,

        /// Write the result here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse an ownership file and print its strategies.
    Ownership {
        /// Path to the ownership file.
        file: PathBuf,
    },

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./resynth.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    // validate reports on the config itself
    let preload = !matches!(cli.command, Commands::Validate);
    let config = match cli
        .config
        .as_deref()
        .filter(|_| preload)
        .map(load_config)
        .transpose()
    {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let level = config
        .as_ref()
        .map_or("info", |config| config.resynth.log_level.as_str());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match run(cli, config.as_ref()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, config: Option<&ResynthConfig>) -> Result<ExitCode> {
    match cli.command {
        Commands::Run {
            ancestor,
            existing,
            proposed,
            outdir,
            json,
        } => cmd_run(
            config,
            ResynthBundles {
                ancestor,
                existing,
                proposed,
                output: outdir,
            },
            json,
        ),
        Commands::MergeFile {
            existing,
            ancestor,
            proposed,
            style,
            output,
        } => cmd_merge_file(&existing, &ancestor, &proposed, style, output.as_deref()),
        Commands::Ownership { file } => {
            cmd_ownership(config, &file)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Init { output } => {
            cmd_init(&output)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate => {
            let path = cli
                .config
                .context("validate requires --config <path>")?;
            cmd_validate(&path)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn load_config(path: &Path) -> Result<ResynthConfig> {
    ResynthConfig::load_and_validate(path).context("failed to load configuration file")
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_run(config: Option<&ResynthConfig>, bundles: ResynthBundles, json: bool) -> Result<ExitCode> {
    let resynth = config.map_or_else(Resynthesizer::default, Resynthesizer::from_config);
    let report = resynth.run(&bundles).context("resynthesis failed")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to serialize report")?
        );
    } else {
        for file in &report.files {
            let status = match &file.outcome {
                FileOutcome::Written { conflicted: true } => "CONFLICT".to_string(),
                FileOutcome::Written { conflicted: false } => "ok".to_string(),
                FileOutcome::Removed => "removed".to_string(),
                FileOutcome::Failed { reason } => format!("FAILED: {reason}"),
            };
            println!("  [{}] {} ({})", file.strategy, file.source_path, status);
        }
        println!();
        println!(
            "{} written, {} conflicted, {} removed, {} failed",
            report.written(),
            report.conflicted(),
            report.removed(),
            report.failed()
        );
    }

    if let Some(options) = config.and_then(ResynthConfig::pull_request_options) {
        let descriptor = create_lifecycle_pull_request(
            &bundles.output,
            &bundles.existing,
            resynth.layout(),
            &options,
        )
        .context("failed to create pull request descriptor")?;
        if let Some(path) = descriptor {
            if !json {
                println!("Pull request descriptor written to {}", path.display());
            }
        }
    }

    Ok(if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn cmd_merge_file(
    existing: &Path,
    ancestor: &Path,
    proposed: &Path,
    style: ConflictStyle,
    output: Option<&Path>,
) -> Result<ExitCode> {
    let read = |path: &Path| {
        std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
    };
    let options = MergeOptions {
        labels: ConflictLabels::new(
            &existing.display().to_string(),
            &ancestor.display().to_string(),
            &proposed.display().to_string(),
        ),
        style,
    };
    let result = Merger::three_way_merge(&read(existing)?, &read(ancestor)?, &read(proposed)?, &options);

    match output {
        Some(path) => std::fs::write(path, &result.merged_content)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => print!("{}", result.merged_content),
    }

    if result.has_conflicts {
        eprintln!("{} conflict(s)", result.conflict_markers.len());
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_ownership(config: Option<&ResynthConfig>, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let working_dir = file.parent().unwrap_or(Path::new("."));
    let document = OwnershipDocument::parse(&content, &StrategyRegistry::builtin(), working_dir)
        .context("failed to parse ownership file")?;

    let mut locations = StrategyLocations::default();
    locations.insert(file.display().to_string(), document.clone());
    for line in strategy_table(&locations) {
        println!("{line}");
    }

    let package = config.map(|config| config.package.name.as_str());
    println!();
    print!("{}", document.to_ownership_string(package)?);
    Ok(())
}

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, ResynthConfig::default_template())
        .context("failed to write config file")?;

    println!("Default configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Set [package] name to the package performing the resynthesis");
    println!(
        "  2. Validate with: resynth validate --config {}",
        output.display()
    );
    println!(
        "  3. Run: resynth run --config {} --ancestor <dir> --existing <dir> --proposed <dir> --outdir <dir>",
        output.display()
    );

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let config =
        ResynthConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    match config.validate() {
        Ok(()) => {
            println!("  [OK] All required fields are valid");
        }
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    println!();
    println!("Configuration summary:");
    println!("  Package        : {}", config.package_identity().versioned_name());
    println!("  Ownership file : {}", config.ownership.file_name);
    println!("  Source prefix  : {}", config.ownership.source_prefix);
    println!(
        "  Merge temp dir : {}",
        config
            .local_strategy
            .temp_dir
            .as_ref()
            .map_or_else(|| "system default".to_string(), |p| p.display().to_string())
    );
    println!(
        "  Pull request   : {}",
        config
            .pull_request
            .as_ref()
            .map_or_else(|| "disabled".to_string(), |pr| pr.origin_branch.clone())
    );
    println!();
    println!("Configuration is valid.");

    Ok(())
}
