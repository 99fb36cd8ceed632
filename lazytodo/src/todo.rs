//! todo.txt line model.
//!
//! A line in a todo.txt file has the shape
//!
//! ```text
//! [x ][(A) ][YYYY-MM-DD ]free text with +project and @context tags
//! ```
//!
//! [`Todo::parse`] never fails: a line that matches none of the structured
//! prefixes becomes an entry with empty structured fields whose text is the
//! whole (sanitized) line. [`render_raw`] is the inverse used whenever a
//! structured field changes.
//!
//! Text is sanitized once, here, when it enters the model. Terminal escape
//! sequences and control characters never reach `text`, `projects` or
//! `contexts`, so mutation paths can rebuild `raw` from the structured fields
//! without re-cleaning them.

use std::sync::LazyLock;

use regex::Regex;

/// `(A) ` priority prefix.
static PRIORITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(([A-Z])\) ").expect("valid priority regex"));

/// `YYYY-MM-DD ` creation date prefix.
static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4}-\d{2}-\d{2}) ").expect("valid date regex"));

static PROJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+(\S+)").expect("valid project regex"));

static CONTEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(\S+)").expect("valid context regex"));

/// ANSI CSI (`ESC [ ... final`) and OSC (`ESC ] ... BEL|ST`) sequences, plus
/// any other two-byte `ESC x` escape.
static ESCAPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]")
        .expect("valid escape regex")
});

/// Completion marker that starts a finished task.
const COMPLETED_MARKER: &str = "x ";

/// A single todo.txt entry.
///
/// `id` is positional: it is assigned in file order on every load and is only
/// unique within one load generation. `raw` is the exact line written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Todo {
    pub id: usize,
    pub raw: String,
    pub completed: bool,
    pub priority: Option<char>,
    pub created_date: Option<String>,
    pub text: String,
    pub projects: Vec<String>,
    pub contexts: Vec<String>,
}

impl Todo {
    /// Parses one line of a todo.txt file.
    ///
    /// The line is trimmed and kept verbatim as `raw`. Structured prefixes are
    /// recognized in the fixed order completion, priority, date.
    pub fn parse(id: usize, line: &str) -> Self {
        let raw = line.trim().to_string();
        let mut rest = raw.as_str();

        let completed = match rest.strip_prefix(COMPLETED_MARKER) {
            Some(after) => {
                rest = after;
                true
            }
            None => false,
        };

        let mut priority = None;
        if let Some(caps) = PRIORITY_RE.captures(rest) {
            priority = caps[1].chars().next();
            rest = &rest[caps[0].len()..];
        }

        let mut created_date = None;
        if let Some(caps) = DATE_RE.captures(rest) {
            created_date = Some(caps[1].to_string());
            rest = &rest[caps[0].len()..];
        }

        let text = sanitize(rest);
        let (projects, contexts) = extract_tags(&text);

        Self {
            id,
            raw,
            completed,
            priority,
            created_date,
            text,
            projects,
            contexts,
        }
    }

    /// Rebuilds `raw` and the tag lists from the structured fields.
    ///
    /// Every mutation calls this before the entry is persisted.
    pub fn regenerate(&mut self) {
        self.raw = render_raw(
            self.completed,
            self.priority,
            self.created_date.as_deref(),
            &self.text,
        );
        let (projects, contexts) = extract_tags(&self.text);
        self.projects = projects;
        self.contexts = contexts;
    }

    /// Content key used to find the same entry again after a reload.
    pub fn content_key(&self) -> &str {
        &self.raw
    }
}

/// Renders a todo.txt line from structured fields.
///
/// The prefix order is fixed: completion marker, priority, creation date,
/// then the text.
pub fn render_raw(
    completed: bool,
    priority: Option<char>,
    created_date: Option<&str>,
    text: &str,
) -> String {
    let mut line = String::with_capacity(text.len() + 18);
    if completed {
        line.push_str(COMPLETED_MARKER);
    }
    if let Some(p) = priority {
        line.push('(');
        line.push(p);
        line.push_str(") ");
    }
    if let Some(date) = created_date {
        line.push_str(date);
        line.push(' ');
    }
    line.push_str(text);
    line
}

/// Removes terminal escape sequences and control characters, then trims.
pub fn sanitize(input: &str) -> String {
    let without_escapes = ESCAPE_RE.replace_all(input, "");
    without_escapes
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Normalizes a priority letter, accepting lower-case input.
///
/// Returns `None` for anything outside `A..=Z`.
pub fn normalize_priority(letter: char) -> Option<char> {
    let upper = letter.to_ascii_uppercase();
    upper.is_ascii_uppercase().then_some(upper)
}

/// Extracts `+project` and `@context` tags in order of first occurrence.
fn extract_tags(text: &str) -> (Vec<String>, Vec<String>) {
    let projects = PROJECT_RE
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect();
    let contexts = CONTEXT_RE
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect();
    (projects, contexts)
}
