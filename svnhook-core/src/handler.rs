//! Consumer-side view of a commit event, as the review service reads it.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::model::FileAction;
use crate::payload::{ChangeEntry, CommitEntry, EventType, RepositoryBlock, WebhookPayload};

pub struct CommitEventHandler {
    payload: WebhookPayload,
}

impl CommitEventHandler {
    pub fn from_payload(payload: WebhookPayload) -> Self {
        info!(
            "Parsed SVN event: type={}, repository={}, changes={}",
            payload.event_type,
            payload.repository.name,
            payload.changes.len()
        );
        Self { payload }
    }

    /// Parse a received body. Unknown event types are rejected here.
    pub fn from_json(body: &str) -> Result<Self> {
        let payload: WebhookPayload =
            serde_json::from_str(body).context("Failed to parse SVN webhook payload")?;
        Ok(Self::from_payload(payload))
    }

    pub fn event_type(&self) -> EventType {
        self.payload.event_type
    }

    pub fn is_pre_commit(&self) -> bool {
        self.payload.event_type == EventType::PreCommit
    }

    pub fn is_post_commit(&self) -> bool {
        self.payload.event_type == EventType::PostCommit
    }

    pub fn commit_changes(&self) -> &[ChangeEntry] {
        if self.payload.changes.is_empty() {
            warn!("No changes found in SVN {} event", self.payload.event_type);
        }
        &self.payload.changes
    }

    /// The event's commit. Pre-commit events have none.
    pub fn commit(&self) -> Option<&CommitEntry> {
        self.payload.commits.first()
    }

    pub fn repository(&self) -> &RepositoryBlock {
        &self.payload.repository
    }

    pub fn payload(&self) -> &WebhookPayload {
        &self.payload
    }
}

/// Changes worth reviewing: not deleted, and with a supported extension.
pub fn filter_changes(changes: &[ChangeEntry], extensions: &[String]) -> Vec<ChangeEntry> {
    let kept: Vec<ChangeEntry> = changes
        .iter()
        .filter(|change| change.action != FileAction::Deleted)
        .filter(|change| is_supported(&change.new_path, extensions))
        .cloned()
        .collect();

    info!(
        "Kept {} of {} changes for review",
        kept.len(),
        changes.len()
    );
    kept
}

pub fn is_supported(path: &str, extensions: &[String]) -> bool {
    extensions.iter().any(|ext| path.ends_with(ext.as_str()))
}

/// `".java, .py,,.php"` -> `[".java", ".py", ".php"]`
pub fn parse_extensions(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Turn a repository URL into something usable as a file name.
pub fn slugify_url(url: &str) -> String {
    let stripped = ["https://", "http://", "file://", "svn://"]
        .iter()
        .find_map(|scheme| url.strip_prefix(scheme))
        .unwrap_or(url);

    stripped
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}
