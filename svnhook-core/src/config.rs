use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::command::{Credentials, RepositoryContext, DEFAULT_COMMAND_TIMEOUT, DEFAULT_SVN_BINARY};
use crate::dispatch::DEFAULT_WEBHOOK_TIMEOUT;
use crate::handler::parse_extensions;

pub const DEFAULT_WEBHOOK_ENDPOINT: &str = "http://localhost:5001/review/webhook";
pub const DEFAULT_ACCESS_TOKEN: &str = "default-token";
pub const DEFAULT_SUPPORTED_EXTENSIONS: &str = ".java,.py,.php";

#[derive(Clone)]
pub struct Config {
    pub webhook_endpoint: String,
    pub access_token: String,
    pub svn_binary: PathBuf,
    pub svn_username: Option<String>,
    pub svn_password: Option<String>,
    pub command_timeout: Duration,
    pub webhook_timeout: Duration,
    /// Per-file diff lookups allowed in flight at once, at least 1.
    pub diff_concurrency: usize,
    pub supported_extensions: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build from any variable source; `from_env` reads the process environment.
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let webhook_endpoint =
            var("WEBHOOK_ENDPOINT").unwrap_or_else(|| DEFAULT_WEBHOOK_ENDPOINT.to_string());

        let access_token =
            var("SUBVERSION_ACCESS_TOKEN").unwrap_or_else(|| DEFAULT_ACCESS_TOKEN.to_string());

        let svn_binary = var("SVN_BINARY")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SVN_BINARY));

        let svn_username = non_blank(var("SVN_USERNAME"));
        let svn_password = non_blank(var("SVN_PASSWORD"));

        let command_timeout = match var("SVN_COMMAND_TIMEOUT_SECS") {
            Some(secs) => Duration::from_secs(
                secs.trim()
                    .parse::<u64>()
                    .context("SVN_COMMAND_TIMEOUT_SECS must be a valid number")?,
            ),
            None => DEFAULT_COMMAND_TIMEOUT,
        };

        let webhook_timeout = match var("WEBHOOK_TIMEOUT_SECS") {
            Some(secs) => Duration::from_secs(
                secs.trim()
                    .parse::<u64>()
                    .context("WEBHOOK_TIMEOUT_SECS must be a valid number")?,
            ),
            None => DEFAULT_WEBHOOK_TIMEOUT,
        };

        let diff_concurrency = var("DIFF_CONCURRENCY")
            .unwrap_or_else(|| "1".to_string())
            .trim()
            .parse::<usize>()
            .context("DIFF_CONCURRENCY must be a valid number")?
            .max(1);

        let supported_extensions = parse_extensions(
            &var("SUPPORTED_EXTENSIONS")
                .unwrap_or_else(|| DEFAULT_SUPPORTED_EXTENSIONS.to_string()),
        );

        Ok(Config {
            webhook_endpoint,
            access_token,
            svn_binary,
            svn_username,
            svn_password,
            command_timeout,
            webhook_timeout,
            diff_concurrency,
            supported_extensions,
        })
    }

    /// svn credentials, present only when a username is configured.
    pub fn credentials(&self) -> Option<Credentials> {
        self.svn_username.as_ref().map(|username| Credentials {
            username: username.clone(),
            password: self.svn_password.clone(),
        })
    }

    pub fn repository_context(&self, root: impl Into<PathBuf>) -> RepositoryContext {
        RepositoryContext::new(root)
            .with_client_path(self.svn_binary.clone())
            .with_credentials(self.credentials())
            .with_timeout(self.command_timeout)
            .with_concurrency(self.diff_concurrency)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("webhook_endpoint", &self.webhook_endpoint)
            .field("access_token", &"[REDACTED]")
            .field("svn_binary", &self.svn_binary)
            .field("svn_username", &self.svn_username)
            .field("svn_password", &self.svn_password.as_ref().map(|_| "[REDACTED]"))
            .field("command_timeout", &self.command_timeout)
            .field("webhook_timeout", &self.webhook_timeout)
            .field("diff_concurrency", &self.diff_concurrency)
            .field("supported_extensions", &self.supported_extensions)
            .finish()
    }
}

/// Treat missing, empty and whitespace-only values alike.
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
