//! Utility modules shared across the crate.
//!
//! # Modules
//!
//! - [`debounce`]: Single-slot debouncer for coalescing bursts of file events
//! - [`path`]: `~` and environment-variable expansion for configured paths

pub mod debounce;
pub mod path;

pub use debounce::{Debouncer, DebouncerError, DEFAULT_DEBOUNCE_MS};
pub use path::{expand_env, resolve_path, split_target};
