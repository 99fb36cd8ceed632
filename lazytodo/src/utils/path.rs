//! Path expansion helpers.
//!
//! Configured paths may start with `~/` and may reference environment
//! variables as `$NAME` or `${NAME}`. Unset variables expand to the empty
//! string, the way shell-style config files behave. Each value is expanded
//! once: [`resolve_path`] only handles `~` and makes the path absolute.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use directories::BaseDirs;

/// Expands `$NAME` and `${NAME}` references using the process environment.
pub fn expand_env(input: &str) -> String {
    expand_env_with(input, |name| env::var(name).ok())
}

/// Expands variable references using `lookup` to resolve names.
///
/// A `$` that is not followed by a valid name (letter or underscore first) or
/// a closed `${...}` is kept literally.
pub fn expand_env_with<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(braced) = after.strip_prefix('{') {
            if let Some(end) = braced.find('}') {
                let name = &braced[..end];
                out.push_str(&lookup(name).unwrap_or_default());
                rest = &braced[end + 1..];
                continue;
            }
        }

        let name_len = if after.starts_with(|c: char| c.is_ascii_digit()) {
            0
        } else {
            after
                .char_indices()
                .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
                .map_or(after.len(), |(i, _)| i)
        };

        if name_len == 0 {
            out.push('$');
            rest = after;
        } else {
            out.push_str(&lookup(&after[..name_len]).unwrap_or_default());
            rest = &after[name_len..];
        }
    }

    out.push_str(rest);
    out
}

/// Returns the current user's home directory.
pub fn home_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf())
}

fn has_leading_tilde(raw: &str) -> bool {
    raw == "~" || raw.starts_with("~/")
}

/// Replaces a leading `~` with `home`. Environment variables are left as-is.
pub fn expand_tilde(raw: &str, home: &Path) -> PathBuf {
    if has_leading_tilde(raw) {
        let tail = raw.trim_start_matches('~').trim_start_matches('/');
        home.join(tail)
    } else {
        PathBuf::from(raw)
    }
}

/// Expands a leading `~` against `home`, then environment variables.
pub fn expand_path_with(raw: &str, home: Option<&Path>) -> io::Result<PathBuf> {
    let expanded = if has_leading_tilde(raw) {
        expand_tilde(raw, home.ok_or_else(no_home)?)
    } else {
        PathBuf::from(raw)
    };

    Ok(PathBuf::from(expand_env(&expanded.to_string_lossy())))
}

/// Expands a leading `~`, then makes the path absolute. A `$` in the path is
/// kept literally.
pub fn resolve_path(raw: &Path) -> io::Result<PathBuf> {
    let text = raw.to_string_lossy();
    let expanded = if has_leading_tilde(&text) {
        expand_tilde(&text, &home_dir().ok_or_else(no_home)?)
    } else {
        raw.to_path_buf()
    };
    std::path::absolute(expanded)
}

fn no_home() -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, "cannot determine home directory")
}

/// Splits an absolute file path into its parent directory and file name.
pub fn split_target(path: &Path) -> io::Result<(PathBuf, String)> {
    let dir = path.parent().map(Path::to_path_buf).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no parent directory", path.display()),
        )
    })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} has no file name", path.display()),
            )
        })?;
    Ok((dir, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "HOME" => Some("/home/ada".to_string()),
            "DIR" => Some("todo".to_string()),
            _ => None,
        }
    }

    #[test]
    fn expands_plain_and_braced_names() {
        assert_eq!(
            expand_env_with("$HOME/${DIR}/todo.txt", lookup),
            "/home/ada/todo/todo.txt"
        );
    }

    #[test]
    fn unset_variables_expand_to_empty() {
        assert_eq!(expand_env_with("$MISSING/x", lookup), "/x");
        assert_eq!(expand_env_with("${MISSING}x", lookup), "x");
    }

    #[test]
    fn lone_dollar_is_literal() {
        assert_eq!(expand_env_with("cost $5 and $", lookup), "cost $5 and $");
        assert_eq!(expand_env_with("${unclosed", lookup), "${unclosed");
    }

    #[test]
    fn name_stops_at_non_identifier() {
        assert_eq!(expand_env_with("$HOME.bak", lookup), "/home/ada.bak");
    }

    #[test]
    fn tilde_expands_against_home() {
        let home = Path::new("/home/ada");
        assert_eq!(
            expand_path_with("~/todo.txt", Some(home)).unwrap(),
            PathBuf::from("/home/ada/todo.txt")
        );
        assert_eq!(
            expand_path_with("~", Some(home)).unwrap(),
            PathBuf::from("/home/ada")
        );
    }

    #[test]
    fn expand_tilde_keeps_variables() {
        let home = Path::new("/home/ada");
        assert_eq!(
            expand_tilde("~/$DIR/todo.txt", home),
            PathBuf::from("/home/ada/$DIR/todo.txt")
        );
        assert_eq!(expand_tilde("$HOME/x", home), PathBuf::from("$HOME/x"));
    }

    #[test]
    fn tilde_without_home_is_error() {
        assert!(expand_path_with("~/todo.txt", None).is_err());
    }

    #[test]
    fn tilde_in_middle_is_literal() {
        let home = Path::new("/home/ada");
        assert_eq!(
            expand_path_with("/tmp/~/x", Some(home)).unwrap(),
            PathBuf::from("/tmp/~/x")
        );
    }

    #[test]
    fn resolve_path_is_absolute() {
        let resolved = resolve_path(Path::new("relative/todo.txt")).unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("relative/todo.txt"));
    }

    #[test]
    fn resolve_path_keeps_dollar_literal() {
        let resolved = resolve_path(Path::new("/srv/$HOME/todo.txt")).unwrap();
        assert_eq!(resolved, PathBuf::from("/srv/$HOME/todo.txt"));
    }

    #[test]
    fn split_target_returns_dir_and_name() {
        let (dir, name) = split_target(Path::new("/home/ada/todo.txt")).unwrap();
        assert_eq!(dir, PathBuf::from("/home/ada"));
        assert_eq!(name, "todo.txt");
    }

    #[test]
    fn split_target_rejects_root() {
        assert!(split_target(Path::new("/")).is_err());
    }
}
