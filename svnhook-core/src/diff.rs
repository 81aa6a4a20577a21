//! Text transforms over the diffs printed by `svn diff`.
//!
//! Everything here is pure: no subprocesses, no logging. The reader feeds raw
//! client output in and gets back text the review service can consume as a
//! unified diff.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Substrings that mark a diff as binary. Matched case-insensitively.
pub const BINARY_MARKERS: &[&str] = &[
    "Cannot display: file marked as a binary type.",
    "svn:mime-type = application/octet-stream",
];

/// How diff text should be shaped before it is placed in a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffStyle {
    /// `--- a/<path>` / `+++ b/<path>` headers, svn preamble removed.
    #[default]
    Unified,
    /// Client output untouched.
    Raw,
}

impl fmt::Display for DiffStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffStyle::Unified => write!(f, "unified"),
            DiffStyle::Raw => write!(f, "raw"),
        }
    }
}

impl FromStr for DiffStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            // "github" is what the review service calls the unified layout
            "unified" | "github" => Ok(DiffStyle::Unified),
            "raw" => Ok(DiffStyle::Raw),
            other => Err(format!(
                "unknown diff style '{}' (expected 'unified' or 'raw')",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiffStats {
    pub added: u32,
    pub deleted: u32,
}

/// Apply `style` to a raw diff.
pub fn format_diff(raw: &str, path: Option<&str>, style: DiffStyle) -> String {
    match style {
        DiffStyle::Unified => normalize_to_standard_diff(raw, path),
        DiffStyle::Raw => raw.to_string(),
    }
}

/// Rewrite svn diff output into a conventional unified diff.
///
/// `Index:` lines and `=====` separators are dropped, and the `---`/`+++`
/// headers become `--- a/<path>` / `+++ b/<path>`. Without an explicit `path`
/// the header's own path is kept, minus its `(revision N)` annotation. Lines
/// before the first header are discarded.
pub fn normalize_to_standard_diff(raw: &str, path: Option<&str>) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }

    let lines: Vec<&str> = raw.split('\n').collect();
    let mut formatted: Vec<String> = Vec::with_capacity(lines.len());
    let mut in_body = false;
    let mut previous_was_old_header = false;

    for (i, line) in lines.iter().enumerate() {
        let next = lines.get(i + 1).copied().unwrap_or("");

        if is_old_header(line, next) {
            formatted.push(rewrite_header(line, "---", "a", path));
            in_body = true;
            previous_was_old_header = true;
            continue;
        }

        if previous_was_old_header && line.starts_with("+++") {
            formatted.push(rewrite_header(line, "+++", "b", path));
            previous_was_old_header = false;
            continue;
        }
        previous_was_old_header = false;

        if !in_body || line.starts_with("Index:") || line.starts_with("=====") {
            continue;
        }

        formatted.push(line.to_string());
    }

    formatted.join("\n")
}

/// A `---` line only counts as a header when a `+++` line follows it; a lone
/// `---` inside a hunk is a removed line that happened to start with `--`.
fn is_old_header(line: &str, next: &str) -> bool {
    line.starts_with("---") && next.starts_with("+++")
}

fn rewrite_header(line: &str, marker: &str, side: &str, path: Option<&str>) -> String {
    if let Some(path) = path {
        return format!("{} {}/{}", marker, side, path.replace('\\', "/"));
    }

    let rest = line[marker.len()..].trim_start();

    // Already canonical, leave alone so normalization is idempotent
    if rest.starts_with(&format!("{}/", side)) && !rest.contains('\t') {
        return line.to_string();
    }

    match strip_revision_annotation(rest) {
        Some(header_path) => format!("{} {}/{}", marker, side, header_path.replace('\\', "/")),
        None => line.to_string(),
    }
}

/// `trunk/src/App.java\t(revision 41)` -> `trunk/src/App.java`
fn strip_revision_annotation(header: &str) -> Option<&str> {
    let header = header.trim_end();
    if !header.ends_with(')') {
        return None;
    }
    let open = header.rfind('(')?;
    let before = &header[..open];
    // The annotation must be separated from the path by whitespace
    if !before.ends_with(char::is_whitespace) {
        return None;
    }
    let path = before.trim_end();
    if path.is_empty() {
        None
    } else {
        Some(path)
    }
}

/// Count added and removed lines, ignoring the `+++`/`---` file headers.
pub fn count_changes(diff: &str) -> DiffStats {
    let mut stats = DiffStats::default();

    for line in diff.split('\n') {
        if line.starts_with('+') && !line.starts_with("+++") {
            stats.added += 1;
        } else if line.starts_with('-') && !line.starts_with("---") {
            stats.deleted += 1;
        }
    }

    stats
}

pub fn is_binary(diff: &str) -> bool {
    if diff.is_empty() {
        return false;
    }

    let lower = diff.to_lowercase();
    BINARY_MARKERS
        .iter()
        .any(|marker| lower.contains(&marker.to_lowercase()))
}
