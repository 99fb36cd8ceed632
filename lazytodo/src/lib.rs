//! lazytodo - a terminal UI for todo.txt files.
//!
//! The list is edited in place while other programs (editors, sync clients,
//! the `todo.sh` CLI) may change the same file. The sync core keeps the two
//! sides consistent:
//!
//! - [`store::TodoStore`] owns the in-memory list, saves atomically and
//!   reloads only when the file content actually changed.
//! - [`watcher::FileWatcher`] reports external changes, debounced, using
//!   native file system events with a polling fallback.
//! - [`self_write::SelfWriteGuard`] keeps the watcher quiet while the store
//!   is writing.
//! - [`fingerprint::Fingerprint`] is the content hash both sides compare.
//!
//! # Modules
//!
//! - [`config`]: todo.txt config file and `LAZYTODO_*` environment overrides
//! - [`error`]: error types
//! - [`todo`]: todo.txt line model
//! - [`tui`]: terminal user interface
//! - [`utils`]: debouncing and path expansion

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod self_write;
pub mod store;
pub mod todo;
pub mod tui;
pub mod utils;
pub mod watcher;

pub use config::{Config, ConfigError, TodoPaths, WatchSettings};
pub use error::{Result, TodoError, TuiError};
pub use fingerprint::Fingerprint;
pub use self_write::{SelfWriteGuard, DEFAULT_SELF_WRITE_TTL_MS};
pub use store::{ReloadOutcome, TodoStore};
pub use todo::Todo;
pub use utils::{Debouncer, DebouncerError, DEFAULT_DEBOUNCE_MS};
pub use watcher::{
    ChangeReason, FileWatcher, WatchConfig, WatchMode, WatchState, WatchStrategy, WatcherError,
    DEFAULT_POLL_INTERVAL_MS,
};
