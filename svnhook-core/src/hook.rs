use anyhow::{anyhow, Result};
use tracing::info;

use crate::command::{CommandRunner, RepositoryContext};
use crate::diff::DiffStyle;
use crate::dispatch::Dispatcher;
use crate::payload::{build_payload, EventType, PayloadInput, WebhookPayload};
use crate::svn::{read_commit, repository_info};
use crate::working_copy::collect_working_copy_changes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    /// The receiver accepted a payload describing `files` changes.
    Delivered { files: usize },
    /// Nothing changed, so nothing was sent.
    NoChanges,
}

/// Inputs to a pre-commit run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreCommitRequest<'a> {
    /// Paths to check; `None` summarizes the whole working copy.
    pub files: Option<&'a [String]>,
    pub message: Option<&'a str>,
    pub author: Option<&'a str>,
    pub style: DiffStyle,
}

/// Build the pre-commit payload without sending it. `Ok(None)` when the
/// working copy has no changes.
pub async fn prepare_pre_commit(
    runner: &dyn CommandRunner,
    ctx: &RepositoryContext,
    request: PreCommitRequest<'_>,
) -> Result<Option<WebhookPayload>> {
    let repo = repository_info(runner, ctx).await?;
    let changes =
        collect_working_copy_changes(runner, ctx, &repo, request.files, request.style).await?;

    if changes.changed_files.is_empty() {
        info!("No working copy changes to send");
        return Ok(None);
    }
    info!("Pre-commit changes: {}", changes.summary());

    let input = PayloadInput::new(EventType::PreCommit, &changes.changed_files)
        .with_repo_info(&repo)
        .with_commit_message(request.message)
        .with_author(request.author);

    build_payload(runner, ctx, input)
        .await
        .map(Some)
        .ok_or_else(|| anyhow!("Failed to build pre-commit payload"))
}

pub async fn run_pre_commit(
    runner: &dyn CommandRunner,
    ctx: &RepositoryContext,
    dispatcher: &dyn Dispatcher,
    request: PreCommitRequest<'_>,
) -> Result<HookOutcome> {
    let payload = prepare_pre_commit(runner, ctx, request).await?;
    deliver(dispatcher, payload).await
}

/// Build the post-commit payload for `revision` (default: the working
/// copy's revision) without sending it. `Ok(None)` when the revision touched
/// no files.
pub async fn prepare_post_commit(
    runner: &dyn CommandRunner,
    ctx: &RepositoryContext,
    revision: Option<&str>,
    style: DiffStyle,
) -> Result<Option<WebhookPayload>> {
    let repo = repository_info(runner, ctx).await?;
    let commit = read_commit(runner, ctx, &repo, revision, style).await?;

    if commit.changed_files.is_empty() {
        info!("r{} changed no files", commit.revision);
        return Ok(None);
    }
    info!("Post-commit {}", commit);

    let input = PayloadInput::new(EventType::PostCommit, &commit.changed_files)
        .with_commit(&commit)
        .with_repo_info(&repo);

    build_payload(runner, ctx, input)
        .await
        .map(Some)
        .ok_or_else(|| anyhow!("Failed to build post-commit payload"))
}

pub async fn run_post_commit(
    runner: &dyn CommandRunner,
    ctx: &RepositoryContext,
    dispatcher: &dyn Dispatcher,
    revision: Option<&str>,
    style: DiffStyle,
) -> Result<HookOutcome> {
    let payload = prepare_post_commit(runner, ctx, revision, style).await?;
    deliver(dispatcher, payload).await
}

async fn deliver(dispatcher: &dyn Dispatcher, payload: Option<WebhookPayload>) -> Result<HookOutcome> {
    let Some(payload) = payload else {
        return Ok(HookOutcome::NoChanges);
    };

    if dispatcher.send(&payload, payload.event_type).await {
        Ok(HookOutcome::Delivered {
            files: payload.changes.len(),
        })
    } else {
        Err(anyhow!("{} webhook dispatch failed", payload.event_type))
    }
}
