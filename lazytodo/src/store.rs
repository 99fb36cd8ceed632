//! Authoritative owner of the on-disk todo.txt state.
//!
//! [`TodoStore`] holds the in-memory collection, the file path and the
//! fingerprint of the bytes last loaded or saved. Every read and write of the
//! file goes through it.
//!
//! # Persistence
//!
//! - [`load`](TodoStore::load) replaces the collection wholesale; IDs are
//!   reassigned `1..=N` in file order. A missing file is an empty list. The
//!   new collection is only installed once the read succeeded.
//! - [`save`](TodoStore::save) opens a self-write window, writes every entry's
//!   `raw` line to a temporary file in the same directory and renames it over
//!   the target, records the fingerprint, then releases the window.
//! - [`reload_if_changed`](TodoStore::reload_if_changed) re-reads the file and
//!   only reloads when the fingerprint differs, which keeps the UI's cursor
//!   stable across metadata-only notifications.
//!
//! # Mutations
//!
//! `add`, `toggle`, `delete`, `update` and `set_priority` mutate in memory and
//! then save once. An unknown ID reports [`TodoError::NotFound`] without
//! writing. If the save fails the collection is rolled back.

use std::cmp::Ordering;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tracing::{debug, info, warn};

use crate::error::{Result, TodoError};
use crate::fingerprint::Fingerprint;
use crate::self_write::SelfWriteGuard;
use crate::todo::{normalize_priority, sanitize, Todo};

/// Result of [`TodoStore::reload_if_changed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// Content matches the last load or save; nothing was touched.
    Unchanged,
    /// Content differed and the collection was reloaded.
    Changed,
}

/// In-memory todo list bound to one todo.txt file.
#[derive(Debug)]
pub struct TodoStore {
    path: PathBuf,
    todos: Vec<Todo>,
    next_id: usize,
    fingerprint: Fingerprint,
    guard: Arc<SelfWriteGuard>,
}

impl TodoStore {
    /// Creates an empty store for `path` without reading it.
    pub fn new(path: impl Into<PathBuf>, guard: Arc<SelfWriteGuard>) -> Self {
        Self {
            path: path.into(),
            todos: Vec::new(),
            next_id: 1,
            fingerprint: Fingerprint::EMPTY,
            guard,
        }
    }

    /// Creates a store and loads `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn open(path: impl Into<PathBuf>, guard: Arc<SelfWriteGuard>) -> Result<Self> {
        let mut store = Self::new(path, guard);
        store.load()?;
        Ok(store)
    }

    /// Reads the file and replaces the collection.
    ///
    /// # Errors
    ///
    /// Returns an I/O error for anything but a missing file. The previous
    /// collection is kept in that case.
    pub fn load(&mut self) -> Result<()> {
        let snapshot = read_snapshot(&self.path)?;
        self.install(snapshot.as_deref());
        info!(
            path = %self.path.display(),
            count = self.todos.len(),
            "Loaded todos"
        );
        Ok(())
    }

    /// Writes the collection to disk in storage order.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the temporary file cannot be written or renamed
    /// over the target. The target is left untouched in that case.
    pub fn save(&mut self) -> Result<()> {
        let content = self.serialize();

        let release = self.guard.begin();
        let written = write_atomic(&self.path, content.as_bytes());
        if written.is_ok() {
            self.fingerprint = Fingerprint::of(content.as_bytes());
        }
        release.release();

        match written {
            Ok(()) => {
                debug!(
                    path = %self.path.display(),
                    count = self.todos.len(),
                    "Saved todos"
                );
                Ok(())
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to save todos");
                Err(e.into())
            }
        }
    }

    /// Reloads only if the file's content differs from the last load or save.
    ///
    /// Safe to call at any time, including after the watcher was stopped.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file exists but cannot be read; the
    /// collection is left as it was.
    pub fn reload_if_changed(&mut self) -> Result<ReloadOutcome> {
        let snapshot = read_snapshot(&self.path)?;
        let current = snapshot.as_deref().map_or(Fingerprint::EMPTY, Fingerprint::of);

        let vanished = current.is_empty() && !self.todos.is_empty();
        if current.same_content(&self.fingerprint) && !vanished {
            return Ok(ReloadOutcome::Unchanged);
        }

        self.install(snapshot.as_deref());
        info!(
            path = %self.path.display(),
            count = self.todos.len(),
            "Reloaded todos after external change"
        );
        Ok(ReloadOutcome::Changed)
    }

    /// Adds a todo dated today and returns its ID.
    ///
    /// # Errors
    ///
    /// [`TodoError::EmptyText`] for blank input; I/O errors from saving.
    pub fn add(&mut self, text: &str) -> Result<usize> {
        self.add_on(text, Local::now().date_naive())
    }

    /// Adds a todo, inserting `today` as its creation date unless the input
    /// already carries one.
    ///
    /// The input is read as a todo.txt line, so `(A) Call mom` keeps its
    /// priority.
    ///
    /// # Errors
    ///
    /// [`TodoError::EmptyText`] for blank input; I/O errors from saving.
    pub fn add_on(&mut self, text: &str, today: NaiveDate) -> Result<usize> {
        let line = sanitize(text);
        if line.is_empty() {
            return Err(TodoError::EmptyText);
        }

        self.transaction(|store| {
            let id = store.next_id;
            let mut todo = Todo::parse(id, &line);
            if todo.created_date.is_none() {
                todo.created_date = Some(today.format("%Y-%m-%d").to_string());
                todo.regenerate();
            }
            store.todos.push(todo);
            store.next_id += 1;
            Ok(id)
        })
    }

    /// Flips the completion marker of `id`.
    ///
    /// # Errors
    ///
    /// [`TodoError::NotFound`] for an unknown ID; I/O errors from saving.
    pub fn toggle(&mut self, id: usize) -> Result<()> {
        self.transaction(|store| {
            let todo = store.get_mut(id)?;
            todo.completed = !todo.completed;
            todo.regenerate();
            Ok(())
        })
    }

    /// Removes `id` from the list.
    ///
    /// # Errors
    ///
    /// [`TodoError::NotFound`] for an unknown ID; I/O errors from saving.
    pub fn delete(&mut self, id: usize) -> Result<()> {
        self.transaction(|store| {
            let index = store.index_of(id)?;
            store.todos.remove(index);
            Ok(())
        })
    }

    /// Replaces the text of `id`, keeping its completion, priority and date.
    ///
    /// # Errors
    ///
    /// [`TodoError::NotFound`] for an unknown ID, [`TodoError::EmptyText`] for
    /// blank input; I/O errors from saving.
    pub fn update(&mut self, id: usize, text: &str) -> Result<()> {
        let clean = sanitize(text);
        if clean.is_empty() {
            return Err(TodoError::EmptyText);
        }

        self.transaction(|store| {
            let todo = store.get_mut(id)?;
            todo.text = clean;
            todo.regenerate();
            Ok(())
        })
    }

    /// Sets (`Some`) or clears (`None`) the priority of `id`.
    ///
    /// Lower-case letters are accepted and upper-cased.
    ///
    /// # Errors
    ///
    /// [`TodoError::InvalidPriority`] for anything but a letter,
    /// [`TodoError::NotFound`] for an unknown ID; I/O errors from saving.
    pub fn set_priority(&mut self, id: usize, priority: Option<char>) -> Result<()> {
        let priority = priority
            .map(|letter| normalize_priority(letter).ok_or(TodoError::InvalidPriority(letter)))
            .transpose()?;

        self.transaction(|store| {
            let todo = store.get_mut(id)?;
            todo.priority = priority;
            todo.regenerate();
            Ok(())
        })
    }

    /// Returns a freshly sorted view of the list.
    ///
    /// Incomplete entries come first; within each group entries with a
    /// priority sort by letter ahead of entries without one, and ties are
    /// broken by ascending ID. Storage order is not affected.
    pub fn list_todos(&self) -> Vec<&Todo> {
        let mut view: Vec<&Todo> = self.todos.iter().collect();
        view.sort_by(|a, b| display_order(a, b));
        view
    }

    /// Entries in storage (file) order.
    pub fn todos(&self) -> &[Todo] {
        &self.todos
    }

    pub fn get(&self, id: usize) -> Option<&Todo> {
        self.todos.iter().find(|t| t.id == id)
    }

    /// Finds the entry whose raw line equals `key`.
    ///
    /// IDs are reassigned on every reload, so callers holding on to a
    /// selection across a reload look it up again by content.
    pub fn find_by_content(&self, key: &str) -> Option<&Todo> {
        self.todos.iter().find(|t| t.content_key() == key)
    }

    pub fn len(&self) -> usize {
        self.todos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.todos.is_empty()
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs `mutate`, then saves; restores the previous collection if either
    /// step fails.
    fn transaction<T, F>(&mut self, mutate: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let saved_todos = self.todos.clone();
        let saved_next_id = self.next_id;

        let outcome = mutate(self).and_then(|value| self.save().map(|()| value));
        if outcome.is_err() {
            self.todos = saved_todos;
            self.next_id = saved_next_id;
        }
        outcome
    }

    fn index_of(&self, id: usize) -> Result<usize> {
        self.todos
            .iter()
            .position(|t| t.id == id)
            .ok_or(TodoError::NotFound(id))
    }

    fn get_mut(&mut self, id: usize) -> Result<&mut Todo> {
        self.todos
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(TodoError::NotFound(id))
    }

    fn serialize(&self) -> String {
        let mut content = String::new();
        for todo in &self.todos {
            content.push_str(&todo.raw);
            content.push('\n');
        }
        content
    }

    /// Replaces the collection with the parsed snapshot (`None` = no file).
    fn install(&mut self, snapshot: Option<&[u8]>) {
        let (todos, fingerprint) = match snapshot {
            Some(bytes) => (
                parse_lines(&String::from_utf8_lossy(bytes)),
                Fingerprint::of(bytes),
            ),
            None => (Vec::new(), Fingerprint::EMPTY),
        };
        self.next_id = todos.len() + 1;
        self.todos = todos;
        self.fingerprint = fingerprint;
    }
}

/// Parses non-blank lines with sequential IDs starting at 1.
fn parse_lines(content: &str) -> Vec<Todo> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(index, line)| Todo::parse(index + 1, line))
        .collect()
}

fn display_order(a: &Todo, b: &Todo) -> Ordering {
    a.completed
        .cmp(&b.completed)
        .then_with(|| match (a.priority, b.priority) {
            (Some(pa), Some(pb)) => pa.cmp(&pb),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.id.cmp(&b.id))
}

/// Reads the whole file; `None` if it does not exist.
fn read_snapshot(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Replaces `path` with `bytes` via a temporary file and a rename.
///
/// A symlinked `path` has its target replaced, keeping the link. The previous
/// file's permissions carry over to the new one.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let target = match fs::canonicalize(path) {
        Ok(real) => real,
        Err(e) if e.kind() == io::ErrorKind::NotFound => path.to_path_buf(),
        Err(e) => return Err(e),
    };
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".lazytodo-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;

    match fs::metadata(&target) {
        Ok(meta) => tmp.as_file().set_permissions(meta.permissions())?,
        Err(_) => set_new_file_permissions(tmp.as_file())?,
    }
    tmp.as_file().sync_all()?;

    tmp.persist(&target).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(unix)]
fn set_new_file_permissions(file: &fs::File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_new_file_permissions(_file: &fs::File) -> io::Result<()> {
    Ok(())
}
