//! Error types for lazytodo.
//!
//! This module defines the error types used throughout the crate, providing
//! structured error handling with clear, human-readable messages.

use thiserror::Error;

use crate::config::ConfigError;
use crate::watcher::WatcherError;

/// Errors that can occur during todo list operations.
///
/// This is the primary error type for the crate. Store mutations report
/// [`NotFound`](TodoError::NotFound) and validation failures without touching
/// the file; I/O failures carry the underlying error.
///
/// # Examples
///
/// ```ignore
/// use lazytodo::error::TodoError;
///
/// match store.toggle(42) {
///     Err(TodoError::NotFound(id)) => println!("no todo {id}"),
///     Err(e) => return Err(e),
///     Ok(()) => {}
/// }
/// ```
#[derive(Error, Debug)]
pub enum TodoError {
    /// Configuration-related error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No todo with this ID exists in the current load generation.
    #[error("todo with ID {0} not found")]
    NotFound(usize),

    /// Priority outside `A`..=`Z`.
    #[error("invalid priority '{0}': expected a letter A-Z")]
    InvalidPriority(char),

    /// Todo text is empty after sanitization.
    #[error("todo text cannot be empty")]
    EmptyText,

    /// File watching error.
    #[error("file watch error: {0}")]
    Watch(#[from] WatcherError),

    /// TUI-related error.
    #[error("TUI error: {0}")]
    Tui(#[from] TuiError),
}

/// Errors that can occur during TUI operation.
#[derive(Error, Debug)]
pub enum TuiError {
    /// Terminal initialization failed.
    #[error("failed to initialize terminal: {0}")]
    TerminalInit(#[source] std::io::Error),

    /// Terminal rendering failed.
    #[error("render error: {0}")]
    Render(#[source] std::io::Error),

    /// Event handling error.
    #[error("event error: {0}")]
    Event(String),
}

/// A specialized `Result` type for todo operations.
pub type Result<T> = std::result::Result<T, TodoError>;
