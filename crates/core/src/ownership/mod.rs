//! Ownership policy: which strategy governs which file.
//!
//! - [`document`] parses and serializes ownership files.
//! - [`owner`] matches owner patterns against the current package.
//! - [`resolver`] indexes strategies by directory and resolves paths.

pub mod document;
pub mod owner;
pub mod resolver;

pub use document::{
    OwnershipDocument, Strategy, DEFAULT_OWNERSHIP_FILE_NAME, FALLBACK_STRATEGY_ID,
};
pub use owner::{owner_matches, OwnerPattern, PackageIdentity};
pub use resolver::{load_strategy_locations, StrategyLocations};
