use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{error, info};
use url::Url;

use crate::command::{CommandRunner, RepositoryContext};
use crate::model::{CommitInfo, FileAction, FileChange, RepositoryInfo};
use crate::svn::repository_info;

pub const EVENT_TYPE_HEADER: &str = "X-Subversion-Event";
pub const TOKEN_HEADER: &str = "X-Subversion-Token";
pub const OBJECT_KIND: &str = "svn_commit";

const DEFAULT_BRANCH: &str = "trunk";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "Pre-Commit")]
    PreCommit,
    #[serde(rename = "Post-Commit")]
    PostCommit,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PreCommit => "Pre-Commit",
            EventType::PostCommit => "Post-Commit",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pre-Commit" => Ok(EventType::PreCommit),
            "Post-Commit" => Ok(EventType::PostCommit),
            other => Err(format!("unknown event type '{}'", other)),
        }
    }
}

/// JSON body posted to the review service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub event_type: EventType,
    pub object_kind: String,
    pub repository: RepositoryBlock,
    pub object_attributes: ObjectAttributes,
    pub changes: Vec<ChangeEntry>,
    pub commits: Vec<CommitEntry>,
    pub svn_info: SvnInfoBlock,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryBlock {
    pub uuid: String,
    pub url: String,
    pub name: String,
    pub description: String,
    pub homepage: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectAttributes {
    pub revision: String,
    pub message: String,
    pub author: String,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub url: String,
    pub action: EventType,
    pub target_branch: String,
    pub source_branch: String,
    pub state: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub diff: String,
    pub new_path: String,
    pub old_path: String,
    pub additions: u32,
    pub deletions: u32,
    pub action: FileAction,
    pub is_binary: bool,
    pub old_revision: Option<String>,
    pub new_revision: Option<String>,
}

impl From<&FileChange> for ChangeEntry {
    fn from(change: &FileChange) -> Self {
        Self {
            diff: change.diff_content.clone().unwrap_or_default(),
            new_path: change.path.clone(),
            old_path: change.path.clone(),
            additions: change.lines_added,
            deletions: change.lines_deleted,
            action: change.action,
            is_binary: change.is_binary,
            old_revision: change.old_revision.clone(),
            new_revision: change.new_revision.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitEntry {
    pub id: String,
    pub message: String,
    pub author: String,
    pub timestamp: String,
    pub created_at: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SvnInfoBlock {
    pub repository_uuid: String,
    pub repository_url: String,
    pub repository_root: String,
    pub revision: Option<String>,
    pub event_type: EventType,
}

/// What a hook knows when it asks for a payload.
#[derive(Debug, Clone, Copy)]
pub struct PayloadInput<'a> {
    pub event: EventType,
    pub changes: &'a [FileChange],
    pub commit: Option<&'a CommitInfo>,
    /// Overrides the commit's own message when set.
    pub commit_message: Option<&'a str>,
    /// Skips the `svn info` lookup when already known.
    pub repo_info: Option<&'a RepositoryInfo>,
    /// Used when there is no commit to take the author from.
    pub author: Option<&'a str>,
}

impl<'a> PayloadInput<'a> {
    pub fn new(event: EventType, changes: &'a [FileChange]) -> Self {
        Self {
            event,
            changes,
            commit: None,
            commit_message: None,
            repo_info: None,
            author: None,
        }
    }

    pub fn with_commit(mut self, commit: &'a CommitInfo) -> Self {
        self.commit = Some(commit);
        self
    }

    pub fn with_commit_message(mut self, message: Option<&'a str>) -> Self {
        self.commit_message = message;
        self
    }

    pub fn with_repo_info(mut self, repo: &'a RepositoryInfo) -> Self {
        self.repo_info = Some(repo);
        self
    }

    pub fn with_author(mut self, author: Option<&'a str>) -> Self {
        self.author = author;
        self
    }
}

/// Human name for a repository URL: its last path segment, else its host
/// with dots turned into underscores.
pub fn extract_repo_name(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return "unknown_repo".to_string();
    };

    if let Some(name) = parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
    {
        return name.to_string();
    }

    match parsed.host_str() {
        Some(host) if !host.is_empty() => host.replace('.', "_"),
        _ => "unknown_repo".to_string(),
    }
}

fn rfc3339(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

/// Build a payload from already-gathered data. `now` stands in for any
/// timestamp the commit cannot provide.
pub fn assemble_payload(
    repo: &RepositoryInfo,
    input: &PayloadInput<'_>,
    now: DateTime<Utc>,
) -> WebhookPayload {
    let name = extract_repo_name(&repo.url);
    let commit = input.commit;

    let revision = commit
        .map(|c| c.revision.clone())
        .unwrap_or_else(|| repo.revision.clone());
    let message = input
        .commit_message
        .or(commit.map(|c| c.message.as_str()))
        .unwrap_or("")
        .to_string();
    let author = commit
        .map(|c| c.author.as_str())
        .or(input.author)
        .filter(|a| !a.trim().is_empty())
        .unwrap_or("unknown")
        .to_string();
    let created_at = commit.map(CommitInfo::iso_date).unwrap_or_else(|| rfc3339(&now));

    let (state, title, description) = match input.event {
        EventType::PreCommit => (
            "opened",
            "Pre-Commit validation".to_string(),
            "SVN pre-commit hook validation".to_string(),
        ),
        EventType::PostCommit => (
            "merged",
            commit
                .and_then(CommitInfo::title)
                .unwrap_or("SVN commit")
                .to_string(),
            commit
                .map(|c| c.message.clone())
                .unwrap_or_else(|| "SVN post-commit notification".to_string()),
        ),
    };

    // Revision-addressed once there is a commit to point at
    let revision_url = commit
        .map(|c| format!("{}?r={}", repo.url, c.revision))
        .unwrap_or_else(|| repo.url.clone());

    let commits = commit
        .map(|c| {
            vec![CommitEntry {
                id: c.revision.clone(),
                message: c.message.clone(),
                author: c.author.clone(),
                timestamp: c.iso_date(),
                created_at: c.iso_date(),
                url: revision_url.clone(),
            }]
        })
        .unwrap_or_default();

    WebhookPayload {
        event_type: input.event,
        object_kind: OBJECT_KIND.to_string(),
        repository: RepositoryBlock {
            uuid: repo.uuid.clone(),
            url: repo.url.clone(),
            description: format!("SVN Repository: {}", name),
            name,
            homepage: repo.url.clone(),
        },
        object_attributes: ObjectAttributes {
            revision,
            message,
            author,
            created_at,
            updated_at: commit.map(CommitInfo::iso_date),
            url: revision_url,
            action: input.event,
            target_branch: DEFAULT_BRANCH.to_string(),
            source_branch: DEFAULT_BRANCH.to_string(),
            state: state.to_string(),
            title,
            description,
        },
        changes: input.changes.iter().map(ChangeEntry::from).collect(),
        commits,
        svn_info: SvnInfoBlock {
            repository_uuid: repo.uuid.clone(),
            repository_url: repo.url.clone(),
            repository_root: repo.root_url.clone(),
            revision: commit.map(|c| c.revision.clone()),
            event_type: input.event,
        },
    }
}

/// Build the payload for `input`, fetching repository info if the caller did
/// not supply it.
///
/// `None` means there is nothing that should be sent.
pub async fn build_payload(
    runner: &dyn CommandRunner,
    ctx: &RepositoryContext,
    input: PayloadInput<'_>,
) -> Option<WebhookPayload> {
    let fetched;
    let repo = match input.repo_info {
        Some(repo) => repo,
        None => match repository_info(runner, ctx).await {
            Ok(repo) => {
                fetched = repo;
                &fetched
            }
            Err(e) => {
                error!("Cannot build {} payload without repository info: {:#}", input.event, e);
                return None;
            }
        },
    };

    let payload = assemble_payload(repo, &input, Utc::now());
    info!(
        "Built {} payload for {} with {} changes",
        input.event,
        payload.repository.name,
        payload.changes.len()
    );
    Some(payload)
}
