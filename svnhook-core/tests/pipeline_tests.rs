use svnhook_core::test_utils::{info_xml, log_xml, RecordingDispatcher, ScriptedRunner};
use svnhook_core::{
    filter_changes, parse_extensions, run_post_commit, run_pre_commit, CommitEventHandler,
    DiffStyle, EventType, FileAction, HookOutcome, PreCommitRequest, RepositoryContext,
};

const ROOT_URL: &str = "https://svn.example.com/svn/repo1";

const JAVA_DIFF: &str = "Index: trunk/src/App.java
===================================================================
--- trunk/src/App.java\t(revision 41)
+++ trunk/src/App.java\t(working copy)
@@ -1,3 +1,4 @@
 class App {
-    int x = 1;
+    int x = 2;
+    int y = 3;
 }
";

const LOGO_DIFF: &str = "Index: assets/logo.png
===================================================================
Cannot display: file marked as a binary type.
svn:mime-type = application/octet-stream
";

fn working_copy() -> ScriptedRunner {
    ScriptedRunner::new().on(
        &["info", "--xml"],
        &info_xml(
            &format!("{}/trunk", ROOT_URL),
            ROOT_URL,
            "8f3a-uuid",
            "41",
            Some("/work/repo1"),
        ),
    )
}

#[tokio::test]
async fn test_pre_commit_pipeline_end_to_end() {
    let runner = working_copy()
        .on(
            &["diff", "--summarize"],
            "M       trunk/src/App.java\nA       assets/logo.png\nD       trunk/src/Gone.java\n",
        )
        .on(&["diff", "trunk/src/App.java"], JAVA_DIFF)
        .on(&["diff", "assets/logo.png"], LOGO_DIFF);
    let dispatcher = RecordingDispatcher::accepting();
    let ctx = RepositoryContext::new("/work/repo1").with_concurrency(2);

    let request = PreCommitRequest {
        message: Some("Bump x"),
        author: Some("alice"),
        ..Default::default()
    };
    let outcome = run_pre_commit(&runner, &ctx, &dispatcher, request).await.unwrap();
    assert_eq!(outcome, HookOutcome::Delivered { files: 3 });

    let (_, payload) = dispatcher.sent().remove(0);
    let body = serde_json::to_string(&payload).unwrap();

    // What the review service does with it
    let handler = CommitEventHandler::from_json(&body).unwrap();
    assert!(handler.is_pre_commit());
    assert_eq!(handler.repository().name, "trunk");

    let changes = handler.commit_changes();
    assert_eq!(changes.len(), 3);

    let java = &changes[0];
    assert_eq!(java.action, FileAction::Modified);
    assert_eq!((java.additions, java.deletions), (2, 1));
    assert!(java.diff.starts_with("--- a/trunk/src/App.java\n+++ b/trunk/src/App.java\n"));
    assert_eq!(java.old_revision.as_deref(), Some("41"));
    assert_eq!(java.new_revision.as_deref(), Some("working copy"));

    let logo = &changes[1];
    assert!(logo.is_binary);
    assert_eq!((logo.additions, logo.deletions), (0, 0));
    assert_eq!(logo.diff, LOGO_DIFF);

    let reviewable = filter_changes(changes, &parse_extensions(".java,.py,.php"));
    assert_eq!(reviewable.len(), 1);
    assert_eq!(reviewable[0].new_path, "trunk/src/App.java");
}

#[tokio::test]
async fn test_post_commit_pipeline_end_to_end() {
    let url = format!("{}/trunk/src/App.java", ROOT_URL);
    let runner = working_copy()
        .on(
            &["log", "-v", "-r", "42", "--xml"],
            &log_xml(
                "42",
                Some("alice"),
                Some("2025-08-18T03:23:30.945026Z"),
                Some("Bump x\n\nAlso adds y"),
                &[("M", "/trunk/src/App.java"), ("A", "/trunk/src/New.java")],
            ),
        )
        .on(&["diff", "-r", "41:42", url.as_str()], JAVA_DIFF);
    let dispatcher = RecordingDispatcher::accepting();
    let ctx = RepositoryContext::new("/work/repo1/trunk");

    let outcome = run_post_commit(&runner, &ctx, &dispatcher, Some("42"), DiffStyle::Unified)
        .await
        .unwrap();
    assert_eq!(outcome, HookOutcome::Delivered { files: 2 });

    let (event, payload) = dispatcher.sent().remove(0);
    assert_eq!(event, EventType::PostCommit);
    assert_eq!(payload.object_attributes.title, "Bump x");
    assert_eq!(payload.object_attributes.description, "Bump x\n\nAlso adds y");
    assert_eq!(payload.object_attributes.state, "merged");
    assert_eq!(payload.object_attributes.created_at, "2025-08-18T03:23:30.945026+00:00");

    let handler = CommitEventHandler::from_payload(payload);
    let commit = handler.commit().unwrap();
    assert_eq!(commit.id, "42");
    assert_eq!(commit.author, "alice");

    let changes = handler.commit_changes();
    assert_eq!(changes[0].new_path, "/trunk/src/App.java");
    assert_eq!(changes[0].old_revision.as_deref(), Some("41"));
    assert_eq!(changes[0].new_revision.as_deref(), Some("42"));
    assert_eq!((changes[0].additions, changes[0].deletions), (2, 1));
    assert_eq!(changes[1].action, FileAction::Added);
    assert_eq!(changes[1].old_revision, None);

    // Every server-side read ran from the working-copy root
    let roots = runner.roots();
    assert!(roots[1..].iter().all(|r| r.to_str() == Some("/work/repo1")));
}

#[tokio::test]
async fn test_failed_delivery_fails_the_run() {
    let runner = working_copy().on(&["diff", "--summarize"], "M       trunk/src/App.java\n");
    let dispatcher = RecordingDispatcher::rejecting();
    let ctx = RepositoryContext::new("/work/repo1");

    let result = run_pre_commit(&runner, &ctx, &dispatcher, PreCommitRequest::default()).await;
    assert!(result.is_err());
}
