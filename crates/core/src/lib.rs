//! Resynthesis core library.
//!
//! This crate reconciles regenerated project files with locally modified
//! ones: per-directory ownership files select a merge strategy for every
//! file, and the strategies (including a diff3 three-way merge and external
//! merge commands) produce the resolved bundle.

pub mod bundle;
pub mod config;
pub mod conflict;
pub mod context_file;
pub mod differences;
pub mod errors;
pub mod ownership;
pub mod pull_request;
pub mod resynth;
pub mod strategy;

// Re-exports for convenience.
pub use config::ResynthConfig;
pub use context_file::ContextFile;
pub use errors::CoreError;
pub use ownership::{OwnershipDocument, Strategy, StrategyLocations};
pub use resynth::{ResynthBundles, ResynthReport, Resynthesizer};
pub use strategy::{BuiltinStrategy, MergeStrategy, StrategyRegistry};
