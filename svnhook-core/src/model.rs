use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::error;

/// Sentinel revision for uncommitted edits.
pub const WORKING_COPY_REVISION: &str = "working copy";

/// What happened to a path, as reported by `svn log -v` or `svn diff --summarize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileAction {
    #[serde(rename = "A")]
    Added,
    #[serde(rename = "D")]
    Deleted,
    #[serde(rename = "M")]
    Modified,
    #[serde(rename = "R")]
    Replaced,
}

impl FileAction {
    /// Parse svn's single-letter action code. Anything else is `None`.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "A" => Some(FileAction::Added),
            "D" => Some(FileAction::Deleted),
            "M" => Some(FileAction::Modified),
            "R" => Some(FileAction::Replaced),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            FileAction::Added => "A",
            FileAction::Deleted => "D",
            FileAction::Modified => "M",
            FileAction::Replaced => "R",
        }
    }
}

impl fmt::Display for FileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One file's change within a change-set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub action: FileAction,
    /// Diff text, `None` when svn could not produce one
    pub diff_content: Option<String>,
    pub old_revision: Option<String>,
    pub new_revision: Option<String>,
    pub lines_added: u32,
    pub lines_deleted: u32,
    pub is_binary: bool,
}

impl fmt::Display for FileChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_binary {
            write!(f, "{} {} (binary)", self.action, self.path)
        } else {
            write!(
                f,
                "{} {} (+{},-{})",
                self.action, self.path, self.lines_added, self.lines_deleted
            )
        }
    }
}

/// Statistics derived from a list of changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ChangeSummary {
    pub total_files: usize,
    pub added_files: usize,
    pub modified_files: usize,
    pub deleted_files: usize,
    pub replaced_files: usize,
    pub total_lines_added: u64,
    pub total_lines_deleted: u64,
    pub binary_files: usize,
}

impl ChangeSummary {
    pub fn from_changes(changes: &[FileChange]) -> Self {
        let mut summary = ChangeSummary {
            total_files: changes.len(),
            ..Default::default()
        };

        for change in changes {
            match change.action {
                FileAction::Added => summary.added_files += 1,
                FileAction::Modified => summary.modified_files += 1,
                FileAction::Deleted => summary.deleted_files += 1,
                FileAction::Replaced => summary.replaced_files += 1,
            }
            summary.total_lines_added += u64::from(change.lines_added);
            summary.total_lines_deleted += u64::from(change.lines_deleted);
            if change.is_binary {
                summary.binary_files += 1;
            }
        }

        summary
    }
}

impl fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files (+{},-{})",
            self.total_files, self.total_lines_added, self.total_lines_deleted
        )
    }
}

/// Identity of the repository a working copy belongs to, as of one `svn info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub uuid: String,
    pub url: String,
    pub relative_url: String,
    pub root_url: String,
    pub revision: String,
    /// Discovered from `wc-info`, since the hook may run from any subdirectory
    pub working_copy_root: PathBuf,
}

impl fmt::Display for RepositoryInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (r{})", self.url, self.revision)
    }
}

/// Uncommitted edits relative to the working copy's base revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingCopyChanges {
    pub changed_files: Vec<FileChange>,
    pub repo_uuid: String,
    pub base_revision: String,
}

impl WorkingCopyChanges {
    pub fn summary(&self) -> ChangeSummary {
        ChangeSummary::from_changes(&self.changed_files)
    }
}

/// A single committed revision and the files it touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub revision: String,
    pub author: String,
    pub date: DateTime<Utc>,
    pub message: String,
    pub changed_files: Vec<FileChange>,
    pub repo_uuid: String,
}

impl CommitInfo {
    pub fn summary(&self) -> ChangeSummary {
        ChangeSummary::from_changes(&self.changed_files)
    }

    pub fn iso_date(&self) -> String {
        self.date.to_rfc3339_opts(SecondsFormat::AutoSi, false)
    }

    /// First line of the message, if there is one.
    pub fn title(&self) -> Option<&str> {
        self.message.lines().next().filter(|line| !line.is_empty())
    }
}

impl fmt::Display for CommitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{} by {}: {}", self.revision, self.author, self.summary())
    }
}

/// Parse the timestamp format used in `svn log --xml`, e.g.
/// `2025-08-18T03:23:30.945026Z`.
///
/// Falls back to the current time (and logs) when the text is unparseable;
/// a missing date must not block the commit event.
pub fn parse_svn_date(raw: &str) -> DateTime<Utc> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix('Z').unwrap_or(trimmed);

    let format = if trimmed.contains('.') {
        "%Y-%m-%dT%H:%M:%S%.f"
    } else {
        "%Y-%m-%dT%H:%M:%S"
    };

    match NaiveDateTime::parse_from_str(trimmed, format) {
        Ok(naive) => naive.and_utc(),
        Err(e) => {
            error!("Failed to parse svn date '{}': {}", raw, e);
            Utc::now()
        }
    }
}
