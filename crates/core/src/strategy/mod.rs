//! Merge strategies.
//!
//! A strategy maps `(ancestor?, existing?, proposed?)` to a resolved file or
//! to `None` (the file must not exist). Built-in strategies live in
//! [`builtin`], external commands in [`local`], and [`registry`] holds the
//! identifier lookup used by the ownership parser.

pub mod builtin;
pub mod local;
pub mod registry;

pub use builtin::{is_binary, BuiltinStrategy, BINARY_SCAN_LENGTH};
pub use local::{format_local_command, ExternalMerge, LocalCommand, MergeInputs, ShellMergeDriver};
pub use registry::{CustomStrategy, MergeStrategy, StrategyFn, StrategyRegistry, LOCAL_STRATEGY_ID};
