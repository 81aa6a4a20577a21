pub mod author;
pub mod command;
pub mod config;
pub mod diff;
pub mod dispatch;
pub mod handler;
pub mod hook;
pub mod model;
pub mod payload;
pub mod sanitizer;
pub mod svn;
pub mod test_utils;
pub mod working_copy;

pub use author::resolve_author;
pub use command::{CommandResult, CommandRunner, Credentials, RepositoryContext, SvnClient};
pub use config::Config;
pub use diff::{count_changes, format_diff, is_binary, normalize_to_standard_diff, DiffStats, DiffStyle};
pub use dispatch::{Dispatcher, WebhookClient};
pub use handler::{filter_changes, is_supported, parse_extensions, slugify_url, CommitEventHandler};
pub use hook::{
    prepare_post_commit, prepare_pre_commit, run_post_commit, run_pre_commit, HookOutcome,
    PreCommitRequest,
};
pub use model::*;
pub use payload::{
    assemble_payload, build_payload, extract_repo_name, EventType, PayloadInput, WebhookPayload,
};
pub use sanitizer::Sanitizer;
pub use svn::{commit_info, file_diff, repository_info, FileDiff};
pub use working_copy::working_copy_changes;
