use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error};

use crate::sanitizer::Sanitizer;

pub const DEFAULT_SVN_BINARY: &str = "svn";
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Outcome of a single svn invocation.
///
/// A non-zero exit code is ordinary data here; only failures to run the
/// client at all (missing binary, timeout) surface as errors from
/// [`CommandRunner::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Everything an svn invocation needs to know about where and how to run.
///
/// Operations never mutate a context; [`RepositoryContext::rooted_at`] hands
/// back a new one once the working-copy root has been discovered.
#[derive(Debug, Clone)]
pub struct RepositoryContext {
    pub root: PathBuf,
    pub client_path: PathBuf,
    pub credentials: Option<Credentials>,
    pub timeout: Duration,
    /// Upper bound on per-file diff lookups in flight at once.
    pub concurrency: usize,
}

impl RepositoryContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            client_path: PathBuf::from(DEFAULT_SVN_BINARY),
            credentials: None,
            timeout: DEFAULT_COMMAND_TIMEOUT,
            concurrency: 1,
        }
    }

    pub fn with_client_path(mut self, client_path: impl Into<PathBuf>) -> Self {
        self.client_path = client_path.into();
        self
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn rooted_at(&self, root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            ..self.clone()
        }
    }
}

/// Full argument list for an svn invocation, excluding the binary itself.
pub fn build_args(ctx: &RepositoryContext, args: &[String], auth_required: bool) -> Vec<String> {
    let mut full_args = args.to_vec();

    if auth_required {
        if let Some(credentials) = &ctx.credentials {
            full_args.push("--username".to_string());
            full_args.push(credentials.username.clone());
            if let Some(password) = &credentials.password {
                full_args.push("--password".to_string());
                full_args.push(password.clone());
            }
            full_args.push("--no-auth-cache".to_string());
            full_args.push("--non-interactive".to_string());
        }
    }

    full_args
}

/// Convenience for building owned argument vectors from literals.
pub fn svn_args<S: AsRef<str>>(parts: &[S]) -> Vec<String> {
    parts.iter().map(|p| p.as_ref().to_string()).collect()
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the svn client with `args` in `ctx.root`.
    async fn run(
        &self,
        ctx: &RepositoryContext,
        args: &[String],
        auth_required: bool,
    ) -> Result<CommandResult>;
}

/// Runs the real svn executable as a subprocess.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvnClient;

#[async_trait]
impl CommandRunner for SvnClient {
    async fn run(
        &self,
        ctx: &RepositoryContext,
        args: &[String],
        auth_required: bool,
    ) -> Result<CommandResult> {
        let full_args = build_args(ctx, args, auth_required);
        debug!(
            "Running {} {} in {}",
            ctx.client_path.display(),
            Sanitizer::sanitize_args(&full_args).join(" "),
            ctx.root.display()
        );

        let output = Command::new(&ctx.client_path)
            .args(&full_args)
            .current_dir(&ctx.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(ctx.timeout, output).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                error!(
                    "Failed to execute {}: {}",
                    ctx.client_path.display(),
                    e
                );
                return Err(e).with_context(|| {
                    format!("Failed to execute {}", ctx.client_path.display())
                });
            }
            Err(_) => {
                error!(
                    "svn {} timed out after {:?}",
                    args.join(" "),
                    ctx.timeout
                );
                return Err(anyhow!(
                    "svn {} timed out after {:?}",
                    args.join(" "),
                    ctx.timeout
                ));
            }
        };

        Ok(CommandResult {
            // Killed by a signal: no exit code, treat as failure
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
