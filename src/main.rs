//! repo-bot - run one of the repository bots
//!
//! Every option can be given as a flag or, when running inside GitHub
//! Actions, through the environment the runner provides.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use repo_bots::action::{ActionRunner, run_url_from_env};
use repo_bots::backport::{Backport, BackportOptions, BackportOutcome, CliGit, CommitIdentity};
use repo_bots::checks::{CheckConfig, build_dispatcher};
use repo_bots::commands::{Command, Commands, Trigger};
use repo_bots::config::{EventContext, RepoContext, required_input};
use repo_bots::event::WebhookEvent;
use repo_bots::github::{GitHubApi, GitHubService};
use repo_bots::Error;
use repo_bots::release::docs_target::DEFAULT_PREFIXES;
use repo_bots::release::{
    FileUpdater, has_matching_release_tag_with_ref_names, local_tag_names, map_ref,
};
use repo_bots::telemetry::{TelemetrySink, TracingTelemetry};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "repo-bot")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "GitHub Actions bots: PR checks, command rules, backports and release helpers")]
#[command(long_about = None)]
struct Cli {
    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(flatten)]
    github: GitHubArgs,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Args)]
struct GitHubArgs {
    /// Repository as owner/repo
    #[arg(long, global = true, env = "GITHUB_REPOSITORY")]
    repository: Option<String>,

    /// API token
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// REST API base URL
    #[arg(long, global = true, env = "GITHUB_API_URL")]
    api_url: Option<String>,

    /// Name of the triggering event
    #[arg(long, global = true, env = "GITHUB_EVENT_NAME")]
    event_name: Option<String>,

    /// Path of the event payload JSON
    #[arg(long, global = true, env = "GITHUB_EVENT_PATH")]
    event_path: Option<PathBuf>,

    /// Issue that receives failure reports
    #[arg(long, global = true, env = "INPUT_ERROR_ISSUE")]
    error_issue: Option<u64>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Publish PR status checks for the triggering event
    PrChecks {
        /// Repository path of the checks config
        #[arg(long, env = "INPUT_CONFIG_PATH", default_value = ".github/pr-checks.json")]
        config: String,
    },

    /// Apply command rules to the triggering issue or pull request
    Commands {
        /// Repository path of the commands config
        #[arg(long, env = "INPUT_CONFIG_PATH", default_value = ".github/commands.json")]
        config: String,
    },

    /// Backport the triggering merged pull request
    Backport {
        /// Labels added to every backport PR (default: the `labels_to_add` input)
        #[arg(long, value_delimiter = ',')]
        labels_to_add: Vec<String>,

        /// Git working tree
        #[arg(long, default_value = ".")]
        workdir: PathBuf,

        /// Clone this URL into the working tree first (default: the `clone_url` input)
        #[arg(long)]
        clone_url: Option<String>,
    },

    /// Print the docs version a ref publishes
    DocsTarget {
        /// Branch or tag
        #[arg(env = "GITHUB_REF")]
        git_ref: String,

        /// Release prefixes stripped before parsing the version
        #[arg(long, value_delimiter = ',')]
        prefixes: Vec<String>,
    },

    /// Print whether a ref has a matching release tag
    ReleaseTagCheck {
        /// Branch or tag
        #[arg(env = "GITHUB_REF")]
        git_ref: String,

        /// Repository checkout to read tags from
        #[arg(long, default_value = ".")]
        repo_dir: PathBuf,
    },

    /// Insert or replace a version block in a changelog file
    UpdateChangelog {
        /// Changelog file
        #[arg(long, default_value = "CHANGELOG.md")]
        path: PathBuf,

        /// Version of the block (default: the `version` input)
        #[arg(long)]
        version: Option<String>,

        /// Block content
        #[arg(long, conflicts_with = "body_file")]
        body: Option<String>,

        /// File holding the block content
        #[arg(long)]
        body_file: Option<PathBuf>,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Print a value and, inside Actions, record it as a step output
fn set_output(name: &str, value: &str) -> Result<()> {
    println!("{value}");
    if let Some(path) = std::env::var_os("GITHUB_OUTPUT") {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .context("Failed to open GITHUB_OUTPUT")?;
        writeln!(file, "{name}={value}")?;
    }
    Ok(())
}

/// Everything a GitHub-facing bot needs
struct Bot {
    api: Arc<dyn GitHubApi>,
    event: Arc<WebhookEvent>,
    runner: ActionRunner,
}

impl Bot {
    fn connect(args: &GitHubArgs) -> Result<Self> {
        let repo = RepoContext::resolve(
            args.repository.as_deref(),
            args.token.as_deref(),
            args.api_url.as_deref(),
        )?;
        let event = Arc::new(
            EventContext::resolve(args.event_name.as_deref(), args.event_path.as_deref())?.event,
        );
        let api: Arc<dyn GitHubApi> = Arc::new(
            GitHubService::new(&repo.token, repo.repo.clone(), repo.api_url.as_deref())
                .context("Failed to create GitHub client")?,
        );

        let mut runner = ActionRunner::new().with_event(event.clone());
        if let Some(issue) = args.error_issue {
            runner = runner.with_error_issue(api.clone(), issue);
        }
        if let Some(url) = run_url_from_env() {
            runner = runner.with_run_url(url);
        }
        Ok(Self { api, event, runner })
    }

    fn telemetry(name: &str) -> TelemetrySink {
        Some(Arc::new(TracingTelemetry::new(name)))
    }
}

async fn pr_checks(bot: &Bot, config: &str) -> repo_bots::Result<()> {
    let configs = CheckConfig::parse_list(&bot.api.read_config(config).await?)?;
    let dispatcher = build_dispatcher(&configs, bot.api.clone(), Bot::telemetry("pr-checks"))?;
    let report = dispatcher.dispatch(bot.event.clone()).await;
    info!(
        invoked = report.invoked,
        statuses = report.statuses,
        failures = report.failures,
        "checks dispatched"
    );
    Ok(())
}

async fn commands(bot: &Bot, config: &str) -> repo_bots::Result<()> {
    let Some(trigger) = Trigger::from_event(&bot.event) else {
        info!(event = %bot.event.name, "event does not trigger commands");
        return Ok(());
    };
    let number = bot
        .event
        .issue_number()
        .ok_or_else(|| Error::InvalidEvent("event has no issue or pull request".to_string()))?;
    let commands = Command::parse_list(&bot.api.read_config(config).await?)?;
    Commands::new(bot.api.clone(), commands, trigger, number)
        .with_telemetry(Bot::telemetry("commands"))
        .run()
        .await?;
    Ok(())
}

async fn backport(bot: &Bot, workdir: &Path, options: BackportOptions) -> repo_bots::Result<()> {
    let git = CliGit::new(workdir).with_identity(CommitIdentity::from_inputs());
    let runner = Backport::new(bot.api.clone(), Box::new(git), options)
        .with_telemetry(Bot::telemetry("backport"));
    for outcome in runner.run(&bot.event).await? {
        match outcome {
            BackportOutcome::Created { base, number } => info!(%base, number, "backport created"),
            BackportOutcome::Failed { base, error } => warn!(%base, %error, "backport failed"),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Cmd::PrChecks { config } => {
            let bot = Bot::connect(&cli.github)?;
            bot.runner.run("pr-checks", pr_checks(&bot, &config)).await?;
        }
        Cmd::Commands { config } => {
            let bot = Bot::connect(&cli.github)?;
            bot.runner.run("commands", commands(&bot, &config)).await?;
        }
        Cmd::Backport {
            labels_to_add,
            workdir,
            clone_url,
        } => {
            let bot = Bot::connect(&cli.github)?;
            let mut options = BackportOptions::from_inputs();
            if !labels_to_add.is_empty() {
                options.labels_to_add = labels_to_add;
            }
            if clone_url.is_some() {
                options.clone_url = clone_url;
            }
            bot.runner
                .run("backport", backport(&bot, &workdir, options))
                .await?;
        }
        Cmd::DocsTarget { git_ref, prefixes } => {
            let target = if prefixes.is_empty() {
                map_ref(&git_ref, DEFAULT_PREFIXES)?
            } else {
                map_ref(&git_ref, prefixes.as_slice())?
            };
            set_output("target", &target)?;
        }
        Cmd::ReleaseTagCheck { git_ref, repo_dir } => {
            let tags = local_tag_names(&repo_dir)
                .await
                .context("Failed to list tags")?;
            let found = has_matching_release_tag_with_ref_names(&git_ref, tags.as_slice());
            set_output("has_release_tag", if found { "true" } else { "false" })?;
        }
        Cmd::UpdateChangelog {
            path,
            version,
            body,
            body_file,
        } => {
            let version = match version {
                Some(version) => version,
                None => required_input("version")?,
            };
            let body = match (body, body_file) {
                (Some(body), _) => body,
                (None, Some(file)) => std::fs::read_to_string(&file)
                    .with_context(|| format!("Failed to read {}", file.display()))?,
                (None, None) => anyhow::bail!("pass --body or --body-file"),
            };
            let mut updater = FileUpdater::load(&path)?;
            updater.update(&version, &body);
            updater.save()?;
            info!(path = %path.display(), %version, "changelog updated");
        }
    }
    Ok(())
}
