//! Reading repository identity, per-file diffs and committed revisions out of
//! the svn client.

use anyhow::{anyhow, Context, Result};
use futures_util::stream::{self, StreamExt};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::command::{svn_args, CommandRunner, RepositoryContext};
use crate::diff::{self, DiffStyle};
use crate::model::{parse_svn_date, CommitInfo, FileAction, FileChange, RepositoryInfo};

// `svn info --xml`

#[derive(Debug, Deserialize)]
struct InfoDocument {
    #[serde(default)]
    entry: Vec<InfoEntry>,
}

#[derive(Debug, Deserialize)]
struct InfoEntry {
    url: Option<String>,
    #[serde(rename = "relative-url")]
    relative_url: Option<String>,
    repository: Option<RepositoryElement>,
    #[serde(rename = "wc-info")]
    wc_info: Option<WcInfoElement>,
    commit: Option<CommitElement>,
}

#[derive(Debug, Deserialize)]
struct RepositoryElement {
    root: Option<String>,
    uuid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WcInfoElement {
    #[serde(rename = "wcroot-abspath")]
    wcroot_abspath: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommitElement {
    #[serde(rename = "@revision")]
    revision: Option<String>,
}

// `svn log -v --xml`

#[derive(Debug, Deserialize)]
struct LogDocument {
    #[serde(default)]
    logentry: Vec<LogEntry>,
}

#[derive(Debug, Deserialize)]
struct LogEntry {
    author: Option<String>,
    date: Option<String>,
    msg: Option<String>,
    paths: Option<LogPaths>,
}

#[derive(Debug, Deserialize)]
struct LogPaths {
    #[serde(default)]
    path: Vec<LogPath>,
}

#[derive(Debug, Deserialize)]
struct LogPath {
    #[serde(rename = "@action")]
    action: String,
    #[serde(rename = "$text", default)]
    value: String,
}

/// Parse `svn info --xml` output.
///
/// `fallback_root` stands in for the working-copy root when the output has no
/// `wc-info` block (e.g. when svn was pointed at a URL).
pub fn parse_info_xml(xml: &str, fallback_root: &Path) -> Result<RepositoryInfo> {
    let document: InfoDocument =
        quick_xml::de::from_str(xml).context("Failed to parse svn info XML")?;

    let entry = document
        .entry
        .into_iter()
        .next()
        .context("svn info XML has no entry element")?;

    let repository = entry
        .repository
        .context("svn info XML has no repository element")?;

    let working_copy_root = entry
        .wc_info
        .and_then(|wc| wc.wcroot_abspath)
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| fallback_root.to_path_buf());

    Ok(RepositoryInfo {
        uuid: repository.uuid.context("svn info XML has no repository uuid")?,
        url: entry.url.context("svn info XML has no url")?,
        relative_url: entry
            .relative_url
            .context("svn info XML has no relative-url")?,
        root_url: repository
            .root
            .context("svn info XML has no repository root")?,
        revision: entry
            .commit
            .and_then(|c| c.revision)
            .context("svn info XML has no commit revision")?,
        working_copy_root,
    })
}

/// Run `svn info --xml` and parse it.
///
/// Every other read is addressed relative to this, so callers treat an error
/// as fatal for the operation at hand.
pub async fn repository_info(
    runner: &dyn CommandRunner,
    ctx: &RepositoryContext,
) -> Result<RepositoryInfo> {
    let info = fetch_repository_info(runner, ctx).await;
    if let Err(e) = &info {
        error!("Failed to get repository info: {:#}", e);
    }
    info
}

async fn fetch_repository_info(
    runner: &dyn CommandRunner,
    ctx: &RepositoryContext,
) -> Result<RepositoryInfo> {
    let result = runner
        .run(ctx, &svn_args(&["info", "--xml"]), true)
        .await
        .context("Failed to run svn info")?;

    if !result.success() {
        return Err(anyhow!("svn info failed: {}", result.stderr.trim()));
    }

    parse_info_xml(&result.stdout, &ctx.root)
}

/// Diff text and line counts for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDiff {
    pub content: Option<String>,
    pub lines_added: u32,
    pub lines_deleted: u32,
    pub is_binary: bool,
}

/// Arguments for `svn diff` given the known revision bounds.
///
/// Both bounds give a range diff, only the old one diffs that revision against
/// the working copy, only the new one shows the change made in that revision,
/// and neither diffs BASE against the working copy.
pub fn diff_args(path: &str, old_revision: Option<&str>, new_revision: Option<&str>) -> Vec<String> {
    let mut args = vec!["diff".to_string()];

    match (old_revision, new_revision) {
        (Some(old), Some(new)) => {
            args.push("-r".to_string());
            args.push(format!("{}:{}", old, new));
        }
        (Some(old), None) => {
            args.push("-r".to_string());
            args.push(old.to_string());
        }
        (None, Some(new)) => {
            args.push("-c".to_string());
            args.push(new.to_string());
        }
        (None, None) => {}
    }

    args.push(path.to_string());
    args
}

/// Fetch and shape the diff for a single path.
///
/// Never fails: a diff that cannot be produced comes back empty with zero
/// counts so the remaining files can still be processed.
pub async fn file_diff(
    runner: &dyn CommandRunner,
    ctx: &RepositoryContext,
    path: &str,
    old_revision: Option<&str>,
    new_revision: Option<&str>,
    style: DiffStyle,
) -> FileDiff {
    labelled_file_diff(runner, ctx, path, path, old_revision, new_revision, style).await
}

/// As [`file_diff`], but headers name `label` rather than the diff target.
/// Server-side diffs target a URL while the review wants repository paths.
pub(crate) async fn labelled_file_diff(
    runner: &dyn CommandRunner,
    ctx: &RepositoryContext,
    target: &str,
    label: &str,
    old_revision: Option<&str>,
    new_revision: Option<&str>,
    style: DiffStyle,
) -> FileDiff {
    let args = diff_args(target, old_revision, new_revision);

    let result = match runner.run(ctx, &args, true).await {
        Ok(result) => result,
        Err(e) => {
            warn!("Failed to get diff for {}: {:#}", target, e);
            return FileDiff::default();
        }
    };

    if !result.success() {
        warn!(
            "Failed to get diff for {}: {}",
            target,
            result.stderr.trim()
        );
        return FileDiff::default();
    }

    let raw = result.stdout;

    if diff::is_binary(&raw) {
        return FileDiff {
            content: Some(raw),
            lines_added: 0,
            lines_deleted: 0,
            is_binary: true,
        };
    }

    // Counts come from the client's text, not the reshaped one
    let stats = diff::count_changes(&raw);
    let content = diff::format_diff(&raw, Some(label), style);

    FileDiff {
        content: Some(content),
        lines_added: stats.added,
        lines_deleted: stats.deleted,
        is_binary: false,
    }
}

/// Join a repository root URL and an in-repository path with exactly one `/`.
pub fn join_repo_url(root_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        root_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// `42` -> `41`. `None` for revision 0 or anything non-numeric.
pub fn previous_revision(revision: &str) -> Option<String> {
    revision
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|r| r.checked_sub(1))
        .map(|r| r.to_string())
}

/// Read one committed revision, including a diff for every path it touched.
///
/// `revision` defaults to the working copy's current revision.
pub async fn commit_info(
    runner: &dyn CommandRunner,
    ctx: &RepositoryContext,
    revision: Option<&str>,
    style: DiffStyle,
) -> Result<CommitInfo> {
    let repo = repository_info(runner, ctx).await?;
    read_commit(runner, ctx, &repo, revision, style).await
}

/// [`commit_info`] for callers that already hold the repository info.
pub async fn read_commit(
    runner: &dyn CommandRunner,
    ctx: &RepositoryContext,
    repo: &RepositoryInfo,
    revision: Option<&str>,
    style: DiffStyle,
) -> Result<CommitInfo> {
    let ctx = ctx.rooted_at(&repo.working_copy_root);
    let revision = revision.unwrap_or(&repo.revision);

    let commit = fetch_commit(runner, &ctx, repo, revision, style).await;
    if let Err(e) = &commit {
        error!("Failed to get commit info for r{}: {:#}", revision, e);
    }
    commit
}

struct PendingCommitFile {
    path: String,
    action: FileAction,
    old_revision: Option<String>,
    new_revision: Option<String>,
}

async fn fetch_commit(
    runner: &dyn CommandRunner,
    ctx: &RepositoryContext,
    repo: &RepositoryInfo,
    revision: &str,
    style: DiffStyle,
) -> Result<CommitInfo> {
    let result = runner
        .run(ctx, &svn_args(&["log", "-v", "-r", revision, "--xml"]), true)
        .await
        .context("Failed to run svn log")?;

    if !result.success() {
        return Err(anyhow!("svn log failed: {}", result.stderr.trim()));
    }

    let document: LogDocument =
        quick_xml::de::from_str(&result.stdout).context("Failed to parse svn log XML")?;
    let entry = document
        .logentry
        .into_iter()
        .next()
        .with_context(|| format!("No log entry found for revision {}", revision))?;

    let date = match entry.date.as_deref() {
        Some(raw) => parse_svn_date(raw),
        None => {
            warn!("Log entry for r{} has no date, using now", revision);
            chrono::Utc::now()
        }
    };
    let author = entry
        .author
        .filter(|a| !a.trim().is_empty())
        .unwrap_or_else(|| "unknown".to_string());
    let message = entry.msg.unwrap_or_default();

    let old_revision = previous_revision(revision);
    if old_revision.is_none() {
        warn!(
            "Cannot derive the previous revision of '{}', old revisions left unset",
            revision
        );
    }

    let pending: Vec<PendingCommitFile> = entry
        .paths
        .map(|p| p.path)
        .unwrap_or_default()
        .into_iter()
        .filter(|p| !p.value.trim().is_empty())
        .filter_map(|p| {
            let Some(action) = FileAction::from_code(&p.action) else {
                warn!(
                    "Unknown svn action '{}', skipping file {}",
                    p.action, p.value
                );
                return None;
            };
            Some(PendingCommitFile {
                old_revision: match action {
                    FileAction::Added => None,
                    FileAction::Deleted | FileAction::Modified | FileAction::Replaced => {
                        old_revision.clone()
                    }
                },
                new_revision: match action {
                    FileAction::Deleted => None,
                    FileAction::Added | FileAction::Modified | FileAction::Replaced => {
                        Some(revision.to_string())
                    }
                },
                path: p.value,
                action,
            })
        })
        .collect();

    let changed_files: Vec<FileChange> = stream::iter(pending)
        .map(|file| async move {
            // History lives on the server, so address the file by URL
            let url = join_repo_url(&repo.root_url, &file.path);
            let label = file.path.trim_start_matches('/');
            let diff = labelled_file_diff(
                runner,
                ctx,
                &url,
                label,
                file.old_revision.as_deref(),
                file.new_revision.as_deref(),
                style,
            )
            .await;

            let change = FileChange {
                path: file.path,
                action: file.action,
                diff_content: diff.content,
                old_revision: file.old_revision,
                new_revision: file.new_revision,
                lines_added: diff.lines_added,
                lines_deleted: diff.lines_deleted,
                is_binary: diff.is_binary,
            };
            info!("Processed file change: {}", change);
            change
        })
        .buffered(ctx.concurrency.max(1))
        .collect()
        .await;

    Ok(CommitInfo {
        revision: revision.to_string(),
        author,
        date,
        message,
        changed_files,
        repo_uuid: repo.uuid.clone(),
    })
}
