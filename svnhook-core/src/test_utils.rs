//! Scripted collaborators for exercising the pipeline without an svn client
//! or a network.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::command::{CommandResult, CommandRunner, RepositoryContext};
use crate::dispatch::Dispatcher;
use crate::payload::{EventType, WebhookPayload};

enum Scripted {
    Result(CommandResult),
    Error(String),
}

/// A [`CommandRunner`] that answers from a fixed script, keyed on the exact
/// argument list, and records every call it receives.
///
/// Unscripted commands exit 1 with "unexpected command" on stderr.
pub struct ScriptedRunner {
    script: Vec<(Vec<String>, Scripted)>,
    calls: Mutex<Vec<(PathBuf, Vec<String>)>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            script: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer `args` with a successful run printing `stdout`.
    pub fn on(self, args: &[&str], stdout: &str) -> Self {
        self.on_result(args, CommandResult::new(0, stdout, ""))
    }

    pub fn on_result(mut self, args: &[&str], result: CommandResult) -> Self {
        self.script.push((to_owned(args), Scripted::Result(result)));
        self
    }

    /// Make `args` fail to run at all, like a timeout or a missing binary.
    pub fn on_error(mut self, args: &[&str], message: &str) -> Self {
        self.script
            .push((to_owned(args), Scripted::Error(message.to_string())));
        self
    }

    /// Argument lists received so far, in order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.recorded().into_iter().map(|(_, args)| args).collect()
    }

    /// Calls whose first argument is `subcommand`.
    pub fn calls_for(&self, subcommand: &str) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|args| args.first().map(String::as_str) == Some(subcommand))
            .collect()
    }

    /// Directory each call ran in.
    pub fn roots(&self) -> Vec<PathBuf> {
        self.recorded().into_iter().map(|(root, _)| root).collect()
    }

    fn recorded(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for ScriptedRunner {
    fn default() -> Self {
        Self::new()
    }
}

fn to_owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        ctx: &RepositoryContext,
        args: &[String],
        _auth_required: bool,
    ) -> Result<CommandResult> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((ctx.root.clone(), args.to_vec()));

        match self.script.iter().find(|(expected, _)| expected == args) {
            Some((_, Scripted::Result(result))) => Ok(result.clone()),
            Some((_, Scripted::Error(message))) => Err(anyhow!("{}", message)),
            None => Ok(CommandResult::new(1, "", "unexpected command")),
        }
    }
}

/// A [`Dispatcher`] that keeps every payload and answers with a fixed verdict.
pub struct RecordingDispatcher {
    accept: bool,
    sent: Mutex<Vec<(EventType, WebhookPayload)>>,
}

impl RecordingDispatcher {
    pub fn accepting() -> Self {
        Self {
            accept: true,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            accept: false,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<(EventType, WebhookPayload)> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn send(&self, payload: &WebhookPayload, event: EventType) -> bool {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((event, payload.clone()));
        self.accept
    }
}

/// `svn info --xml` output for a working copy checked out from `url`.
///
/// Leaving out `wcroot` produces the shape svn prints for a URL target.
pub fn info_xml(url: &str, root: &str, uuid: &str, revision: &str, wcroot: Option<&str>) -> String {
    let relative = url
        .strip_prefix(root)
        .unwrap_or("")
        .trim_start_matches('/');
    let wc_info = wcroot
        .map(|path| {
            format!(
                "<wc-info>\n<wcroot-abspath>{}</wcroot-abspath>\n<schedule>normal</schedule>\n<depth>infinity</depth>\n</wc-info>\n",
                path
            )
        })
        .unwrap_or_default();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<info>
<entry kind="dir" path="." revision="{rev}">
<url>{url}</url>
<relative-url>^/{relative}</relative-url>
<repository>
<root>{root}</root>
<uuid>{uuid}</uuid>
</repository>
{wc_info}<commit revision="{rev}">
<author>alice</author>
<date>2025-08-18T03:23:30.945026Z</date>
</commit>
</entry>
</info>
"#,
        rev = revision,
        url = url,
        relative = relative,
        root = root,
        uuid = uuid,
        wc_info = wc_info,
    )
}

/// `svn log -v --xml` output for a single revision touching `paths`, given as
/// `(action, path)` pairs.
pub fn log_xml(
    revision: &str,
    author: Option<&str>,
    date: Option<&str>,
    message: Option<&str>,
    paths: &[(&str, &str)],
) -> String {
    let mut entry = String::new();
    if let Some(author) = author {
        entry.push_str(&format!("<author>{}</author>\n", author));
    }
    if let Some(date) = date {
        entry.push_str(&format!("<date>{}</date>\n", date));
    }
    if !paths.is_empty() {
        entry.push_str("<paths>\n");
        for (action, path) in paths {
            entry.push_str(&format!(
                "<path action=\"{}\" prop-mods=\"false\" text-mods=\"true\" kind=\"file\">{}</path>\n",
                action, path
            ));
        }
        entry.push_str("</paths>\n");
    }
    if let Some(message) = message {
        entry.push_str(&format!("<msg>{}</msg>\n", message));
    }

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<log>\n<logentry revision=\"{}\">\n{}</logentry>\n</log>\n",
        revision, entry
    )
}
