use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use svnhook_core::{
    is_supported, prepare_post_commit, prepare_pre_commit, resolve_author, run_post_commit,
    run_pre_commit, working_copy_changes, Config, DiffStyle, HookOutcome, PreCommitRequest,
    RepositoryContext, SvnClient, WebhookClient, WebhookPayload,
};
use tracing::{info, Level};

/// svnhook: send Subversion commit events to a code-review webhook
#[derive(Parser, Debug)]
#[command(name = "svnhook")]
#[command(about = "Send Subversion commit events to a code-review webhook", long_about = None)]
struct Cli {
    /// Working copy to read from
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// How diffs are shaped in the payload (unified or raw)
    #[arg(long, global = true, default_value = "unified")]
    diff_style: DiffStyle,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Describe uncommitted working-copy changes to the review service
    PreCommit(PreCommitArgs),
    /// Describe a committed revision to the review service
    PostCommit(PostCommitArgs),
    /// Show what a pre-commit run would pick up
    Status,
}

#[derive(Parser, Debug)]
struct PreCommitArgs {
    /// Commit message to include in the payload
    #[arg(long)]
    message: Option<String>,

    /// Print the payload instead of sending it
    #[arg(long)]
    dry_run: bool,

    /// Files to check, relative to the working-copy root (default: every change)
    files: Vec<String>,
}

#[derive(Parser, Debug)]
struct PostCommitArgs {
    /// Revision to describe (default: the working copy's revision)
    #[arg(long)]
    revision: Option<String>,

    /// Print the payload instead of sending it
    #[arg(long)]
    dry_run: bool,
}

fn print_payload(payload: Option<WebhookPayload>) -> Result<()> {
    match payload {
        Some(payload) => {
            let json =
                serde_json::to_string_pretty(&payload).context("Failed to serialize payload")?;
            println!("{}", json);
        }
        None => info!("No changes, nothing would be sent"),
    }
    Ok(())
}

fn report(outcome: HookOutcome) {
    match outcome {
        HookOutcome::Delivered { files } => info!("Webhook delivered ({} files)", files),
        HookOutcome::NoChanges => info!("No changes, nothing sent"),
    }
}

fn webhook_client(config: &Config) -> Result<WebhookClient> {
    WebhookClient::new(
        config.webhook_endpoint.clone(),
        config.access_token.clone(),
        config.webhook_timeout,
    )
}

async fn run_pre_commit_command(
    config: &Config,
    ctx: &RepositoryContext,
    style: DiffStyle,
    args: PreCommitArgs,
) -> Result<()> {
    let author = resolve_author(config.svn_username.as_deref());
    let request = PreCommitRequest {
        files: if args.files.is_empty() {
            None
        } else {
            Some(args.files.as_slice())
        },
        message: args.message.as_deref(),
        author: Some(author.as_str()),
        style,
    };

    if args.dry_run {
        let payload = prepare_pre_commit(&SvnClient, ctx, request).await?;
        return print_payload(payload);
    }

    let client = webhook_client(config)?;
    let outcome = run_pre_commit(&SvnClient, ctx, &client, request)
        .await
        .context("Pre-commit hook failed")?;
    report(outcome);
    Ok(())
}

async fn run_post_commit_command(
    config: &Config,
    ctx: &RepositoryContext,
    style: DiffStyle,
    args: PostCommitArgs,
) -> Result<()> {
    let revision = args.revision.as_deref();

    if args.dry_run {
        let payload = prepare_post_commit(&SvnClient, ctx, revision, style).await?;
        return print_payload(payload);
    }

    let client = webhook_client(config)?;
    let outcome = run_post_commit(&SvnClient, ctx, &client, revision, style)
        .await
        .context("Post-commit hook failed")?;
    report(outcome);
    Ok(())
}

async fn run_status(config: &Config, ctx: &RepositoryContext, style: DiffStyle) -> Result<()> {
    let changes = working_copy_changes(&SvnClient, ctx, None, style).await?;

    println!("Base revision: r{}", changes.base_revision);
    println!("{}", changes.summary());
    for change in &changes.changed_files {
        let marker = if is_supported(&change.path, &config.supported_extensions) {
            "*"
        } else {
            " "
        };
        println!("{} {}", marker, change);
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    let ctx = config.repository_context(cli.repo.clone());

    match cli.command {
        Commands::PreCommit(args) => run_pre_commit_command(&config, &ctx, cli.diff_style, args).await,
        Commands::PostCommit(args) => {
            run_post_commit_command(&config, &ctx, cli.diff_style, args).await
        }
        Commands::Status => run_status(&config, &ctx, cli.diff_style).await,
    }
}
