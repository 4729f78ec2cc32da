//! Config-driven issue and PR commands
//!
//! A repository lists [`Command`] rules in a JSON file. Each run fetches the
//! issue once, evaluates every rule against the [`Trigger`] concurrently and
//! fires the side effects of the rules that match.
//!
//! # Example config
//!
//! ```json
//! [
//!   { "type": "label", "name": "needs-more-info", "comment": "Please add details", "action": "close" },
//!   { "type": "comment", "name": "label", "allowUsers": ["@author"] },
//!   { "type": "changedfiles", "matches": { "any": ["docs/**"] }, "addLabel": "type/docs" },
//!   { "type": "author", "notMemberOf": { "org": "acme" }, "addLabel": "community" }
//! ]
//! ```

mod args;
mod glob;
mod types;

pub use args::{CommandArg, command_arguments, command_regex, parse_args};
pub use glob::glob_match;
pub use types::{
    Command, CommandAction, CommandType, FilePattern, OrgCondition, ProjectTarget, Trigger,
};

use crate::error::{Error, Result};
use crate::github::{GitHubApi, ProjectRef};
use crate::telemetry::{TelemetrySink, track};
use crate::types::Issue;
use futures::future::{BoxFuture, join_all};
use std::sync::Arc;
use tracing::{debug, error, info};

/// A pending side effect and its description
type Effect<'a> = (String, BoxFuture<'a, Result<()>>);

/// Outcome of a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandsReport {
    /// Names of the commands that matched, in config order
    pub matched: Vec<String>,
}

/// Evaluates command rules against one issue
pub struct Commands {
    api: Arc<dyn GitHubApi>,
    commands: Vec<Command>,
    trigger: Trigger,
    issue_number: u64,
    telemetry: TelemetrySink,
}

impl Commands {
    /// Create a run for `issue_number`; unnamed commands get their default name
    pub fn new(
        api: Arc<dyn GitHubApi>,
        commands: Vec<Command>,
        trigger: Trigger,
        issue_number: u64,
    ) -> Self {
        Self {
            api,
            commands: commands.into_iter().map(Command::with_default_name).collect(),
            trigger,
            issue_number,
            telemetry: None,
        }
    }

    /// Attach a telemetry sink
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: TelemetrySink) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// The commands with names filled in
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Evaluate every command and run the effects of those that match
    ///
    /// Commands and their effects run concurrently. A failing effect does not
    /// cancel the others; all failures are reported together once everything
    /// has settled.
    pub async fn run(&self) -> Result<CommandsReport> {
        debug!(issue = self.issue_number, "fetching issue");
        let issue = self.api.get_issue(self.issue_number).await?;

        let changed_files = if self
            .commands
            .iter()
            .any(|c| c.kind == CommandType::ChangedFiles)
            && matches!(self.trigger, Trigger::Changes)
            && issue.is_pull_request
        {
            debug!(pr = issue.number, "listing changed files");
            self.api.list_pull_request_filenames(issue.number).await?
        } else {
            Vec::new()
        };

        let outcomes = join_all(
            self.commands
                .iter()
                .map(|command| self.perform(command, &issue, &changed_files)),
        )
        .await;

        let mut report = CommandsReport::default();
        let mut failures = Vec::new();
        for (command, outcome) in self.commands.iter().zip(outcomes) {
            match outcome {
                Ok(true) => report.matched.push(command.name().to_string()),
                Ok(false) => {}
                Err(Error::CommandsFailed { failures: f }) => {
                    report.matched.push(command.name().to_string());
                    failures.extend(f);
                }
                Err(e) => {
                    error!(command = command.name(), error = %e, "command evaluation failed");
                    failures.push(format!("{}: {e}", command.name()));
                }
            }
        }

        info!(issue = issue.number, matched = ?report.matched, "commands evaluated");
        if failures.is_empty() {
            Ok(report)
        } else {
            Err(Error::CommandsFailed { failures })
        }
    }

    /// Whether `command` applies to the issue under the current trigger
    pub async fn matches(
        &self,
        command: &Command,
        issue: &Issue,
        changed_files: &[String],
    ) -> Result<bool> {
        if let Some(label) = &command.require_label
            && !issue.has_label(label)
        {
            return Ok(false);
        }
        if let Some(label) = &command.disallow_label
            && issue.has_label(label)
        {
            return Ok(false);
        }

        match (&self.trigger, command.kind) {
            (Trigger::Label(label), CommandType::Label) => Ok(label == command.name()),
            (Trigger::Comment { body, user }, CommandType::Comment) => {
                if !command_regex(command.name())?.is_match(body) {
                    return Ok(false);
                }
                self.may_run(command, issue, user).await
            }
            (Trigger::Changes, CommandType::ChangedFiles) => Ok(command
                .matches
                .as_ref()
                .is_some_and(|pattern| pattern.matches(changed_files))),
            (Trigger::Changes, CommandType::Author) => self.author_matches(command, issue).await,
            _ => Ok(false),
        }
    }

    async fn may_run(&self, command: &Command, issue: &Issue, user: &str) -> Result<bool> {
        let allowed = command.allow_users.iter().any(|u| {
            u == "*" || u == user || (u == "@author" && user == issue.author)
        });
        if allowed {
            return Ok(true);
        }
        debug!(user, "checking write access");
        let write = self.api.has_write_access(user).await?;
        if !write {
            info!(user, command = command.name(), "user may not run command");
        }
        Ok(write)
    }

    async fn author_matches(&self, command: &Command, issue: &Issue) -> Result<bool> {
        if command.no_labels && !issue.labels.is_empty() {
            return Ok(false);
        }
        if command.ignore_list.iter().any(|u| *u == issue.author) {
            debug!(author = %issue.author, "author ignored");
            return Ok(false);
        }
        if let Some(cond) = &command.member_of {
            return self
                .api
                .is_user_member_of_organization(&cond.org, &issue.author)
                .await;
        }
        if let Some(cond) = &command.not_member_of {
            let member = self
                .api
                .is_user_member_of_organization(&cond.org, &issue.author)
                .await?;
            return Ok(!member);
        }
        Ok(false)
    }

    async fn perform(&self, command: &Command, issue: &Issue, changed_files: &[String]) -> Result<bool> {
        if !self.matches(command, issue, changed_files).await? {
            return Ok(false);
        }
        info!(command = command.name(), issue = issue.number, "running command");
        track(&self.telemetry, "command", &[("name", command.name())]);

        let effects = self.effects(command, issue)?;
        let results = join_all(
            effects
                .into_iter()
                .map(|(what, fut)| async move { (what, fut.await) }),
        )
        .await;

        let failures: Vec<String> = results
            .into_iter()
            .filter_map(|(what, result)| {
                result.err().map(|e| {
                    error!(command = command.name(), effect = %what, error = %e, "command effect failed");
                    format!("{}: {what}: {e}", command.name())
                })
            })
            .collect();

        if failures.is_empty() {
            Ok(true)
        } else {
            Err(Error::CommandsFailed { failures })
        }
    }

    fn effects<'a>(&'a self, command: &'a Command, issue: &Issue) -> Result<Vec<Effect<'a>>> {
        let api = self.api.as_ref();
        let number = issue.number;
        let mut effects: Vec<Effect<'a>> = Vec::new();

        if let Trigger::Comment { body, .. } = &self.trigger
            && matches!(command.name(), "label" | "assign")
        {
            let re = command_regex(command.name())?;
            let args = command_arguments(&re, body).map(parse_args).unwrap_or_default();
            for arg in args {
                effects.push(arg_effect(api, number, command.name(), arg));
            }
        }

        if command.action == Some(CommandAction::Close) && issue.open {
            let reason = command.reason.unwrap_or_default();
            effects.push(("close".to_string(), api.close_issue(number, reason)));
        }
        if let Some(comment) = &command.comment
            && (command.action != Some(CommandAction::Close) || issue.open)
        {
            effects.push(("comment".to_string(), api.post_comment(number, comment)));
        }
        if let Some(label) = &command.add_label {
            effects.push((format!("add label {label}"), api.add_label(number, label)));
        }
        if let Some(label) = &command.remove_label {
            effects.push((
                format!("remove label {label}"),
                api.remove_label(number, label),
            ));
        }

        match (command.action, &command.add_to_project, &command.remove_from_project) {
            (Some(CommandAction::AddToProject), Some(target), _) => {
                let project = ProjectRef::from_url(&target.url, target.column.clone())?;
                effects.push((
                    format!("add to project {project}"),
                    Box::pin(async move { api.add_issue_to_project(number, &project).await }),
                ));
            }
            (Some(CommandAction::RemoveFromProject), _, Some(target)) => {
                let project = ProjectRef::from_url(&target.url, target.column.clone())?;
                effects.push((
                    format!("remove from project {project}"),
                    Box::pin(async move { api.remove_issue_from_project(number, &project).await }),
                ));
            }
            (Some(CommandAction::AddToProject | CommandAction::RemoveFromProject), _, _) => {
                return Err(Error::Config(format!(
                    "command {} has a project action but no project",
                    command.name()
                )));
            }
            _ => {}
        }

        Ok(effects)
    }
}

fn arg_effect<'a>(api: &'a dyn GitHubApi, number: u64, command: &str, arg: CommandArg) -> Effect<'a> {
    let CommandArg { name, remove } = arg;
    match (command, remove) {
        ("assign", false) => {
            let login = name.trim_start_matches('@').to_string();
            (
                format!("assign {login}"),
                Box::pin(async move { api.add_assignee(number, &login).await }),
            )
        }
        ("assign", true) => {
            let login = name.trim_start_matches('@').to_string();
            (
                format!("unassign {login}"),
                Box::pin(async move { api.remove_assignee(number, &login).await }),
            )
        }
        (_, false) => (
            format!("add label {name}"),
            Box::pin(async move { api.add_label(number, &name).await }),
        ),
        (_, true) => (
            format!("remove label {name}"),
            Box::pin(async move { api.remove_label(number, &name).await }),
        ),
    }
}
