use anyhow::{anyhow, Context, Result};
use futures_util::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::command::{svn_args, CommandRunner, RepositoryContext};
use crate::diff::DiffStyle;
use crate::model::{FileAction, FileChange, RepositoryInfo, WorkingCopyChanges, WORKING_COPY_REVISION};
use crate::svn::{file_diff, repository_info};

/// Split a `svn diff --summarize` line into its action code and path.
///
/// The path is everything after the whitespace that follows the code, kept
/// verbatim so names with repeated spaces still address the same file.
pub fn parse_summary_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_start().trim_end_matches('\r');
    let (code, rest) = line.split_once(char::is_whitespace)?;
    let path = rest.trim_start();
    if path.is_empty() {
        None
    } else {
        Some((code, path))
    }
}

fn summary_entry(line: &str) -> Option<(FileAction, String)> {
    let (code, path) = parse_summary_line(line)?;
    match FileAction::from_code(code) {
        Some(action) => Some((action, path.to_string())),
        None => {
            warn!("Unknown svn action '{}', skipping file {}", code, path);
            None
        }
    }
}

/// Gather uncommitted edits in the working copy.
///
/// Every svn call runs from the working-copy root, so `explicit_files` are
/// taken relative to it. With `explicit_files`, each path is checked on its
/// own and anything svn cannot summarize is skipped. Without, the whole
/// working copy is summarized and a failure there is an error.
pub async fn working_copy_changes(
    runner: &dyn CommandRunner,
    ctx: &RepositoryContext,
    explicit_files: Option<&[String]>,
    style: DiffStyle,
) -> Result<WorkingCopyChanges> {
    let repo = repository_info(runner, ctx).await?;
    collect_working_copy_changes(runner, ctx, &repo, explicit_files, style).await
}

/// [`working_copy_changes`] for callers that already hold the repository info.
pub async fn collect_working_copy_changes(
    runner: &dyn CommandRunner,
    ctx: &RepositoryContext,
    repo: &RepositoryInfo,
    explicit_files: Option<&[String]>,
    style: DiffStyle,
) -> Result<WorkingCopyChanges> {
    let ctx = &ctx.rooted_at(&repo.working_copy_root);

    let entries = match explicit_files {
        Some(files) => summarize_explicit(runner, ctx, files).await,
        None => summarize_all(runner, ctx).await?,
    };

    let changed_files: Vec<FileChange> = stream::iter(entries)
        .map(|(action, path)| async move {
            let diff = file_diff(runner, ctx, &path, None, None, style).await;
            let change = FileChange {
                path,
                action,
                diff_content: diff.content,
                old_revision: Some(repo.revision.clone()),
                new_revision: Some(WORKING_COPY_REVISION.to_string()),
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

    Ok(WorkingCopyChanges {
        changed_files,
        repo_uuid: repo.uuid.clone(),
        base_revision: repo.revision.clone(),
    })
}

async fn summarize_explicit(
    runner: &dyn CommandRunner,
    ctx: &RepositoryContext,
    files: &[String],
) -> Vec<(FileAction, String)> {
    let mut entries = Vec::with_capacity(files.len());

    for path in files {
        let args = svn_args(&["diff", "--summarize", path.as_str()]);
        let result = match runner.run(ctx, &args, false).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Failed to summarize {}: {:#}", path, e);
                continue;
            }
        };

        if !result.success() {
            if result.stderr.contains("E155010") || result.stderr.contains("was not found") {
                info!("File {} is not under version control, skipped", path);
            } else {
                warn!("Failed to summarize {}: {}", path, result.stderr.trim());
            }
            continue;
        }

        let Some(line) = result.stdout.lines().find(|l| !l.trim().is_empty()) else {
            info!("File {} has no changes", path);
            continue;
        };

        if let Some(entry) = summary_entry(line) {
            entries.push(entry);
        }
    }

    entries
}

async fn summarize_all(
    runner: &dyn CommandRunner,
    ctx: &RepositoryContext,
) -> Result<Vec<(FileAction, String)>> {
    let result = runner
        .run(ctx, &svn_args(&["diff", "--summarize"]), false)
        .await
        .context("Failed to summarize working copy changes")?;

    if !result.success() {
        return Err(anyhow!(
            "svn diff --summarize failed: {}",
            result.stderr.trim()
        ));
    }

    Ok(result
        .stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(summary_entry)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandResult;
    use crate::test_utils::{info_xml, ScriptedRunner};

    const APP_DIFF: &str = "Index: trunk/src/App.java
===================================================================
--- trunk/src/App.java\t(revision 41)
+++ trunk/src/App.java\t(working copy)
@@ -1,2 +1,3 @@
 class App {
+    int y = 3;
 }
";

    fn ctx() -> RepositoryContext {
        RepositoryContext::new("/work/repo1")
    }

    fn repo_runner() -> ScriptedRunner {
        ScriptedRunner::new().on(
            &["info", "--xml"],
            &info_xml(
                "https://svn.example.com/svn/repo1/trunk",
                "https://svn.example.com/svn/repo1",
                "8f3a-uuid",
                "41",
                Some("/work/repo1"),
            ),
        )
    }

    #[test]
    fn test_parse_summary_line() {
        assert_eq!(
            parse_summary_line("M       trunk/src/App.java"),
            Some(("M", "trunk/src/App.java"))
        );
        assert_eq!(
            parse_summary_line(" M      trunk/props.txt\r"),
            Some(("M", "trunk/props.txt"))
        );
        assert_eq!(parse_summary_line("M"), None);
        assert_eq!(parse_summary_line("M   "), None);
        assert_eq!(parse_summary_line("   "), None);
    }

    #[test]
    fn test_parse_summary_line_keeps_repeated_spaces_in_path() {
        assert_eq!(
            parse_summary_line("A       docs/release   notes.txt"),
            Some(("A", "docs/release   notes.txt"))
        );
        assert_eq!(parse_summary_line("D\tdocs/a  b.txt"), Some(("D", "docs/a  b.txt")));
    }

    #[tokio::test]
    async fn test_svn_runs_from_working_copy_root() {
        let runner = ScriptedRunner::new()
            .on(
                &["info", "--xml"],
                &info_xml(
                    "https://svn.example.com/svn/repo1/trunk/src",
                    "https://svn.example.com/svn/repo1",
                    "8f3a-uuid",
                    "41",
                    Some("/work/repo1"),
                ),
            )
            .on(&["diff", "--summarize"], "M       trunk/a.c\n");
        let ctx = RepositoryContext::new("/work/repo1/trunk/src");

        working_copy_changes(&runner, &ctx, None, DiffStyle::Unified)
            .await
            .unwrap();

        let roots = runner.roots();
        assert_eq!(roots.len(), 3);
        assert_eq!(roots[0], std::path::PathBuf::from("/work/repo1/trunk/src"));
        assert!(roots[1..]
            .iter()
            .all(|root| root == std::path::Path::new("/work/repo1")));
        assert_eq!(
            runner.calls()[1..].to_vec(),
            vec![
                svn_args(&["diff", "--summarize"]),
                svn_args(&["diff", "trunk/a.c"])
            ]
        );
    }

    #[tokio::test]
    async fn test_explicit_files_resolve_against_working_copy_root() {
        let runner = ScriptedRunner::new().on(
            &["info", "--xml"],
            &info_xml(
                "https://svn.example.com/svn/repo1/trunk/src",
                "https://svn.example.com/svn/repo1",
                "8f3a-uuid",
                "41",
                Some("/work/repo1"),
            ),
        );
        let ctx = RepositoryContext::new("/work/repo1/trunk/src");
        let files = vec!["trunk/src/App.java".to_string()];

        working_copy_changes(&runner, &ctx, Some(files.as_slice()), DiffStyle::Unified)
            .await
            .unwrap();

        assert_eq!(runner.roots()[1], std::path::PathBuf::from("/work/repo1"));
    }

    #[tokio::test]
    async fn test_discovery_mode_single_modified_file() {
        let runner = repo_runner()
            .on(&["diff", "--summarize"], "M       trunk/src/App.java\n")
            .on(&["diff", "trunk/src/App.java"], APP_DIFF);

        let changes = working_copy_changes(&runner, &ctx(), None, DiffStyle::Unified)
            .await
            .unwrap();

        assert_eq!(changes.repo_uuid, "8f3a-uuid");
        assert_eq!(changes.base_revision, "41");
        assert_eq!(changes.changed_files.len(), 1);

        let file = &changes.changed_files[0];
        assert_eq!(file.action, FileAction::Modified);
        assert_eq!(file.path, "trunk/src/App.java");
        assert_eq!(file.old_revision.as_deref(), Some("41"));
        assert_eq!(file.new_revision.as_deref(), Some("working copy"));
        assert_eq!((file.lines_added, file.lines_deleted), (1, 0));
        assert!(file
            .diff_content
            .as_deref()
            .unwrap()
            .starts_with("--- a/trunk/src/App.java\n+++ b/trunk/src/App.java\n"));
    }

    #[tokio::test]
    async fn test_discovery_mode_path_with_spaces_and_unknown_codes() {
        let runner = repo_runner().on(
            &["diff", "--summarize"],
            "A       docs/release notes.txt\n?       scratch.txt\nM\n\nD       old.c\n",
        );

        let changes = working_copy_changes(&runner, &ctx(), None, DiffStyle::Unified)
            .await
            .unwrap();

        let got: Vec<(FileAction, &str)> = changes
            .changed_files
            .iter()
            .map(|f| (f.action, f.path.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                (FileAction::Added, "docs/release notes.txt"),
                (FileAction::Deleted, "old.c"),
            ]
        );
        assert!(runner
            .calls()
            .contains(&svn_args(&["diff", "docs/release notes.txt"])));
    }

    #[tokio::test]
    async fn test_discovery_mode_failure_is_error() {
        let runner = repo_runner().on_result(
            &["diff", "--summarize"],
            CommandResult::new(1, "", "svn: E155007: not a working copy"),
        );
        assert!(working_copy_changes(&runner, &ctx(), None, DiffStyle::Unified)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_explicit_mode_skips_untracked_and_unchanged() {
        let files = vec![
            "trunk/src/App.java".to_string(),
            "notes.tmp".to_string(),
            "trunk/README".to_string(),
        ];
        let runner = repo_runner()
            .on(
                &["diff", "--summarize", "trunk/src/App.java"],
                "M       trunk/src/App.java\n",
            )
            .on_result(
                &["diff", "--summarize", "notes.tmp"],
                CommandResult::new(1, "", "svn: E155010: The node '/work/repo1/notes.tmp' was not found."),
            )
            .on(&["diff", "--summarize", "trunk/README"], "")
            .on(&["diff", "trunk/src/App.java"], APP_DIFF);

        let changes = working_copy_changes(&runner, &ctx(), Some(files.as_slice()), DiffStyle::Unified)
            .await
            .unwrap();

        assert_eq!(changes.changed_files.len(), 1);
        assert_eq!(changes.changed_files[0].path, "trunk/src/App.java");
        assert_eq!(runner.calls_for("diff").len(), 4);
    }

    #[tokio::test]
    async fn test_explicit_mode_empty_list_has_no_changes() {
        let runner = repo_runner();
        let files: Vec<String> = Vec::new();
        let changes = working_copy_changes(&runner, &ctx(), Some(files.as_slice()), DiffStyle::Unified)
            .await
            .unwrap();
        assert!(changes.changed_files.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_diff_keeps_the_file() {
        let runner = repo_runner().on(&["diff", "--summarize"], "M       a.c\n");

        let changes = working_copy_changes(&runner, &ctx(), None, DiffStyle::Unified)
            .await
            .unwrap();

        let file = &changes.changed_files[0];
        assert_eq!(file.diff_content, None);
        assert_eq!((file.lines_added, file.lines_deleted), (0, 0));
    }

    #[tokio::test]
    async fn test_missing_repository_is_error() {
        let runner = ScriptedRunner::new().on(&["diff", "--summarize"], "M a.c\n");
        assert!(working_copy_changes(&runner, &ctx(), None, DiffStyle::Unified)
            .await
            .is_err());
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_order_is_preserved_with_concurrency() {
        let summary: String = (0..10).map(|i| format!("M       f{}.c\n", i)).collect();
        let runner = repo_runner().on(&["diff", "--summarize"], &summary);

        let ctx = ctx().with_concurrency(3);
        let changes = working_copy_changes(&runner, &ctx, None, DiffStyle::Unified)
            .await
            .unwrap();

        let got: Vec<String> = changes.changed_files.iter().map(|f| f.path.clone()).collect();
        let want: Vec<String> = (0..10).map(|i| format!("f{}.c", i)).collect();
        assert_eq!(got, want);
    }
}
