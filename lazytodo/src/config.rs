//! Configuration module for lazytodo.
//!
//! Todo file locations come from the todo.txt config file shared with
//! todo.sh; watcher and UI timings come from environment variables.
//!
//! # todo.txt config file
//!
//! Read from `$TODOTXT_CFG_FILE` or `~/.todo/config`. A missing file yields
//! the defaults. Lines look like shell assignments:
//!
//! ```text
//! # comments and blank lines are skipped
//! export TODO_DIR="$HOME/Dropbox/todo"
//! TODO_FILE=todo.txt            # relative to TODO_DIR
//! DONE_FILE='${TODO_DIR}/done.txt'
//! ```
//!
//! | Key | Default |
//! |-----|---------|
//! | `TODO_DIR` | home directory |
//! | `TODO_FILE` | `$TODO_DIR/todo.txt` |
//! | `DONE_FILE` | `$TODO_DIR/done.txt` |
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `LAZYTODO_DEBOUNCE_MS` | No | 300 | Quiet period before a change is reported |
//! | `LAZYTODO_SELF_WRITE_TTL_MS` | No | 500 | Self-write suppression window (must be > 0) |
//! | `LAZYTODO_POLL_INTERVAL_MS` | No | 2000 | Polling interval, `0` disables the polling fallback |
//! | `LAZYTODO_WATCH_MODE` | No | `auto` | `auto` or `poll` |
//! | `LAZYTODO_REFRESH_MS` | No | 1000 | UI reload check cadence (must be > 0) |
//! | `LAZYTODO_LOG_FILE` | No | - | Write logs to this file |
//!
//! # Example
//!
//! ```no_run
//! use lazytodo::config::Config;
//!
//! let config = Config::from_env().expect("Failed to load configuration");
//! println!("Todo file: {}", config.todo_file.display());
//! ```

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::BaseDirs;
use thiserror::Error;
use tracing::debug;

use crate::self_write::DEFAULT_SELF_WRITE_TTL_MS;
use crate::utils::debounce::DEFAULT_DEBOUNCE_MS;
use crate::utils::path::{expand_env_with, expand_path_with, expand_tilde};
use crate::watcher::{WatchConfig, WatchStrategy, DEFAULT_POLL_INTERVAL_MS};

/// Default UI refresh cadence in milliseconds.
const DEFAULT_REFRESH_MS: u64 = 1000;

/// Default todo.txt config location relative to home.
const DEFAULT_CONFIG_FILE: &str = ".todo/config";

const DEFAULT_TODO_FILE: &str = "todo.txt";
const DEFAULT_DONE_FILE: &str = "done.txt";

/// Errors that can occur during configuration parsing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment variable has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to determine home directory.
    #[error("failed to determine home directory")]
    NoHomeDirectory,

    /// The config file exists but could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Locations from the todo.txt config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoPaths {
    pub todo_dir: PathBuf,
    pub todo_file: PathBuf,
    /// Not used by lazytodo itself; kept for parity with todo.sh.
    pub done_file: PathBuf,
}

impl TodoPaths {
    /// Defaults: everything in `home`.
    pub fn defaults(home: &Path) -> Self {
        Self {
            todo_dir: home.to_path_buf(),
            todo_file: home.join(DEFAULT_TODO_FILE),
            done_file: home.join(DEFAULT_DONE_FILE),
        }
    }

    /// Parses config file content.
    ///
    /// `lookup` resolves `$VAR` references. `TODO_DIR` assigned earlier in
    /// the file is visible to later lines, the way the shell would see it.
    pub fn parse<F>(content: &str, home: &Path, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut todo_dir: Option<String> = None;
        let mut todo_file: Option<String> = None;
        let mut done_file: Option<String> = None;

        for line in content.lines() {
            let Some((key, value)) = parse_assignment(line) else {
                continue;
            };

            let value = expand_env_with(value, |name| match (name, &todo_dir) {
                ("TODO_DIR", Some(dir)) => Some(dir.clone()),
                _ => lookup(name),
            });

            match key {
                "TODO_DIR" => todo_dir = Some(value),
                "TODO_FILE" => todo_file = Some(value),
                "DONE_FILE" => done_file = Some(value),
                other => debug!(key = other, "Ignoring config key"),
            }
        }

        let todo_dir = todo_dir
            .map(|dir| expand_tilde(&dir, home))
            .unwrap_or_else(|| home.to_path_buf());
        let resolve = |value: Option<String>, default: &str| {
            let path = value.map_or_else(|| PathBuf::from(default), |v| expand_tilde(&v, home));
            if path.is_absolute() {
                path
            } else {
                todo_dir.join(path)
            }
        };

        Self {
            todo_file: resolve(todo_file, DEFAULT_TODO_FILE),
            done_file: resolve(done_file, DEFAULT_DONE_FILE),
            todo_dir,
        }
    }

    /// Reads the config file at `path`; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file exists but cannot be read.
    pub fn load(path: &Path, home: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(content) => {
                debug!(path = %path.display(), "Read todo.txt config");
                Ok(Self::parse(&content, home, |name| env::var(name).ok()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::defaults(home)),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// Watcher timings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSettings {
    pub debounce: Duration,
    pub self_write_ttl: Duration,
    /// Zero disables the polling fallback.
    pub poll_interval: Duration,
    pub strategy: WatchStrategy,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            self_write_ttl: Duration::from_millis(DEFAULT_SELF_WRITE_TTL_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            strategy: WatchStrategy::Auto,
        }
    }
}

/// Configuration for lazytodo.
#[derive(Debug, Clone)]
pub struct Config {
    pub todo_dir: PathBuf,

    /// The todo.txt file to edit and watch.
    pub todo_file: PathBuf,

    pub done_file: PathBuf,

    pub watch: WatchSettings,

    /// How often the UI asks the store whether the file changed.
    pub refresh_interval: Duration,

    /// Log destination; logging is off when `None`.
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Creates a new `Config` from the todo.txt config file and environment
    /// variables.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if:
    /// - The home directory cannot be determined
    /// - The config file exists but cannot be read
    /// - A `LAZYTODO_*` variable holds an invalid value
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_dirs = BaseDirs::new().ok_or(ConfigError::NoHomeDirectory)?;
        let home_dir = base_dirs.home_dir();

        // Optional: TODOTXT_CFG_FILE (default: ~/.todo/config)
        let config_file = match env::var("TODOTXT_CFG_FILE") {
            Ok(val) => expand_path_with(&val, Some(home_dir)).map_err(|e| {
                ConfigError::InvalidValue {
                    key: "TODOTXT_CFG_FILE".to_string(),
                    message: e.to_string(),
                }
            })?,
            Err(_) => home_dir.join(DEFAULT_CONFIG_FILE),
        };
        let paths = TodoPaths::load(&config_file, home_dir)?;

        let watch = WatchSettings {
            debounce: parse_millis("LAZYTODO_DEBOUNCE_MS", DEFAULT_DEBOUNCE_MS, true)?,
            self_write_ttl: parse_millis(
                "LAZYTODO_SELF_WRITE_TTL_MS",
                DEFAULT_SELF_WRITE_TTL_MS,
                false,
            )?,
            poll_interval: parse_millis(
                "LAZYTODO_POLL_INTERVAL_MS",
                DEFAULT_POLL_INTERVAL_MS,
                true,
            )?,
            strategy: parse_strategy()?,
        };

        let refresh_interval = parse_millis("LAZYTODO_REFRESH_MS", DEFAULT_REFRESH_MS, false)?;

        // Optional: LAZYTODO_LOG_FILE (default: logging disabled)
        let log_file = env::var("LAZYTODO_LOG_FILE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            todo_dir: paths.todo_dir,
            todo_file: paths.todo_file,
            done_file: paths.done_file,
            watch,
            refresh_interval,
            log_file,
        })
    }

    /// Watcher configuration for the todo file.
    pub fn watch_config(&self) -> WatchConfig {
        WatchConfig::new(&self.todo_file)
            .with_debounce(self.watch.debounce)
            .with_poll_interval(self.watch.poll_interval)
            .with_strategy(self.watch.strategy)
    }
}

/// Splits `[export ]KEY=VALUE`, stripping matching surrounding quotes.
fn parse_assignment(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    Some((key.trim(), strip_quotes(value.trim())))
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn parse_millis(key: &str, default: u64, allow_zero: bool) -> Result<Duration, ConfigError> {
    match env::var(key) {
        Ok(val) => {
            let ms = val.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected milliseconds, got '{val}'"),
            })?;
            if ms == 0 && !allow_zero {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "must be greater than 0".to_string(),
                });
            }
            Ok(Duration::from_millis(ms))
        }
        Err(_) => Ok(Duration::from_millis(default)),
    }
}

fn parse_strategy() -> Result<WatchStrategy, ConfigError> {
    match env::var("LAZYTODO_WATCH_MODE") {
        Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(WatchStrategy::Auto),
            "poll" | "polling" => Ok(WatchStrategy::Polling),
            _ => Err(ConfigError::InvalidValue {
                key: "LAZYTODO_WATCH_MODE".to_string(),
                message: format!("expected 'auto' or 'poll', got '{val}'"),
            }),
        },
        Err(_) => Ok(WatchStrategy::Auto),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    /// Helper to run tests with isolated environment variables.
    /// Clears all LAZYTODO_* vars and TODOTXT_CFG_FILE before the test and
    /// restores them after.
    fn with_clean_env<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let saved_vars: Vec<(String, String)> = env::vars()
            .filter(|(k, _)| k.starts_with("LAZYTODO_") || k == "TODOTXT_CFG_FILE")
            .collect();

        for (key, _) in &saved_vars {
            env::remove_var(key);
        }

        let result = f();

        for (key, _) in env::vars().filter(|(k, _)| {
            k.starts_with("LAZYTODO_") || k == "TODOTXT_CFG_FILE"
        }) {
            env::remove_var(key);
        }
        for (key, value) in saved_vars {
            env::set_var(key, value);
        }

        result
    }

    fn lookup(name: &str) -> Option<String> {
        match name {
            "HOME" => Some("/home/ada".to_string()),
            _ => None,
        }
    }

    fn home() -> &'static Path {
        Path::new("/home/ada")
    }

    fn missing_config(dir: &tempfile::TempDir) -> String {
        dir.path().join("no-config").to_string_lossy().into_owned()
    }

    #[test]
    fn test_defaults_live_in_home() {
        let paths = TodoPaths::parse("", home(), lookup);
        assert_eq!(paths, TodoPaths::defaults(home()));
        assert_eq!(paths.todo_file, PathBuf::from("/home/ada/todo.txt"));
        assert_eq!(paths.done_file, PathBuf::from("/home/ada/done.txt"));
    }

    #[test]
    fn test_parse_export_quotes_and_expansion() {
        let content = r#"
# todo.sh config
export TODO_DIR="$HOME/Dropbox/todo"
export TODO_FILE='${TODO_DIR}/tasks.txt'
DONE_FILE = archive.txt
export TODOTXT_VERBOSE=1
not an assignment
"#;
        let paths = TodoPaths::parse(content, home(), lookup);

        assert_eq!(paths.todo_dir, PathBuf::from("/home/ada/Dropbox/todo"));
        assert_eq!(
            paths.todo_file,
            PathBuf::from("/home/ada/Dropbox/todo/tasks.txt")
        );
        assert_eq!(
            paths.done_file,
            PathBuf::from("/home/ada/Dropbox/todo/archive.txt")
        );
    }

    #[test]
    fn test_todo_file_defaults_to_todo_dir() {
        let paths = TodoPaths::parse("TODO_DIR=/srv/todo", home(), lookup);
        assert_eq!(paths.todo_file, PathBuf::from("/srv/todo/todo.txt"));
        assert_eq!(paths.done_file, PathBuf::from("/srv/todo/done.txt"));
    }

    #[test]
    fn test_tilde_and_absolute_values() {
        let content = "TODO_DIR=~/notes\nTODO_FILE=/abs/todo.txt\n";
        let paths = TodoPaths::parse(content, home(), lookup);
        assert_eq!(paths.todo_dir, PathBuf::from("/home/ada/notes"));
        assert_eq!(paths.todo_file, PathBuf::from("/abs/todo.txt"));
    }

    #[test]
    fn test_unset_variable_expands_to_empty() {
        let paths = TodoPaths::parse("TODO_DIR=/srv$NOPE/todo", home(), lookup);
        assert_eq!(paths.todo_dir, PathBuf::from("/srv/todo"));
    }

    #[test]
    #[serial]
    fn test_values_are_expanded_once() {
        env::set_var("LAZYTODO_TEST_INNER", "/leaked");
        let lookup = |name: &str| match name {
            "OUTER" => Some("/srv/$LAZYTODO_TEST_INNER".to_string()),
            _ => None,
        };
        let content = "TODO_DIR=$OUTER\nTODO_FILE=~/$OUTER.txt\n";
        let paths = TodoPaths::parse(content, home(), lookup);
        env::remove_var("LAZYTODO_TEST_INNER");

        assert_eq!(paths.todo_dir, PathBuf::from("/srv/$LAZYTODO_TEST_INNER"));
        assert_eq!(
            paths.todo_file,
            PathBuf::from("/home/ada/srv/$LAZYTODO_TEST_INNER.txt")
        );
    }

    #[test]
    fn test_strip_quotes_requires_matching_pair() {
        assert_eq!(strip_quotes("\"a b\""), "a b");
        assert_eq!(strip_quotes("'a'"), "a");
        assert_eq!(strip_quotes("\"a'"), "\"a'");
        assert_eq!(strip_quotes("\""), "\"");
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let paths = TodoPaths::load(&dir.path().join("config"), home()).unwrap();
        assert_eq!(paths, TodoPaths::defaults(home()));
    }

    #[test]
    fn test_load_unreadable_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = TodoPaths::load(dir.path(), home());
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    #[serial]
    fn test_env_defaults() {
        with_clean_env(|| {
            let dir = tempfile::tempdir().unwrap();
            env::set_var("TODOTXT_CFG_FILE", missing_config(&dir));

            let config = Config::from_env().unwrap();
            assert_eq!(config.watch, WatchSettings::default());
            assert_eq!(config.refresh_interval, Duration::from_secs(1));
            assert!(config.log_file.is_none());
            assert!(config.todo_file.ends_with("todo.txt"));
        });
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        with_clean_env(|| {
            let dir = tempfile::tempdir().unwrap();
            let cfg = dir.path().join("config");
            fs::write(&cfg, format!("TODO_DIR={}\n", dir.path().display())).unwrap();

            env::set_var("TODOTXT_CFG_FILE", &cfg);
            env::set_var("LAZYTODO_DEBOUNCE_MS", "50");
            env::set_var("LAZYTODO_SELF_WRITE_TTL_MS", "750");
            env::set_var("LAZYTODO_POLL_INTERVAL_MS", "0");
            env::set_var("LAZYTODO_WATCH_MODE", "poll");
            env::set_var("LAZYTODO_REFRESH_MS", "250");
            env::set_var("LAZYTODO_LOG_FILE", "/tmp/lazytodo.log");

            let config = Config::from_env().unwrap();
            assert_eq!(config.todo_file, dir.path().join("todo.txt"));
            assert_eq!(config.watch.debounce, Duration::from_millis(50));
            assert_eq!(config.watch.self_write_ttl, Duration::from_millis(750));
            assert!(config.watch.poll_interval.is_zero());
            assert_eq!(config.watch.strategy, WatchStrategy::Polling);
            assert_eq!(config.refresh_interval, Duration::from_millis(250));
            assert_eq!(config.log_file, Some(PathBuf::from("/tmp/lazytodo.log")));

            let watch = config.watch_config();
            assert_eq!(watch.path, dir.path().join("todo.txt"));
            assert_eq!(watch.debounce, Duration::from_millis(50));
            assert_eq!(watch.strategy, WatchStrategy::Polling);
        });
    }

    #[test]
    #[serial]
    fn test_invalid_debounce_rejected() {
        with_clean_env(|| {
            let dir = tempfile::tempdir().unwrap();
            env::set_var("TODOTXT_CFG_FILE", missing_config(&dir));
            env::set_var("LAZYTODO_DEBOUNCE_MS", "soon");

            let err = Config::from_env().unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "LAZYTODO_DEBOUNCE_MS")
            );
        });
    }

    #[test]
    #[serial]
    fn test_zero_ttl_rejected() {
        with_clean_env(|| {
            let dir = tempfile::tempdir().unwrap();
            env::set_var("TODOTXT_CFG_FILE", missing_config(&dir));
            env::set_var("LAZYTODO_SELF_WRITE_TTL_MS", "0");

            let err = Config::from_env().unwrap_err();
            assert_eq!(
                err.to_string(),
                "invalid value for LAZYTODO_SELF_WRITE_TTL_MS: must be greater than 0"
            );
        });
    }

    #[test]
    #[serial]
    fn test_unknown_watch_mode_rejected() {
        with_clean_env(|| {
            let dir = tempfile::tempdir().unwrap();
            env::set_var("TODOTXT_CFG_FILE", missing_config(&dir));
            env::set_var("LAZYTODO_WATCH_MODE", "inotify");

            let err = Config::from_env().unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "LAZYTODO_WATCH_MODE")
            );
        });
    }

    #[test]
    #[serial]
    fn test_blank_log_file_disables_logging() {
        with_clean_env(|| {
            let dir = tempfile::tempdir().unwrap();
            env::set_var("TODOTXT_CFG_FILE", missing_config(&dir));
            env::set_var("LAZYTODO_LOG_FILE", "  ");

            assert!(Config::from_env().unwrap().log_file.is_none());
        });
    }
}
