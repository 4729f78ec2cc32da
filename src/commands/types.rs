//! Declarative command rules

use crate::commands::glob::glob_match;
use crate::error::{Error, Result};
use crate::event::{EventAction, EventName, WebhookEvent};
use crate::types::CloseReason;
use serde::{Deserialize, Serialize};

/// What kind of trigger a command reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    /// `/name` in a comment
    Comment,
    /// A label named like the command was added
    Label,
    /// Files changed by a pull request
    #[serde(rename = "changedfiles")]
    ChangedFiles,
    /// Who authored the issue
    Author,
}

impl CommandType {
    /// Config name of the type
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::Label => "label",
            Self::ChangedFiles => "changedfiles",
            Self::Author => "author",
        }
    }
}

/// Non-label action performed by a matching command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommandAction {
    /// Close the issue
    Close,
    /// Add the issue to `addToProject`
    AddToProject,
    /// Remove the issue from `removeFromProject`
    RemoveFromProject,
}

/// An organization condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgCondition {
    /// Organization login
    pub org: String,
}

/// A project target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectTarget {
    /// Project URL
    pub url: String,
    /// Column, for classic projects
    #[serde(default)]
    pub column: Option<String>,
}

/// Globs a changed-files command matches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilePattern {
    /// One glob; any file may match
    Glob(String),
    /// Several globs; any file may match any of them
    List(Vec<String>),
    /// Some file must match one of the globs
    Any {
        /// Globs
        any: Vec<String>,
    },
    /// Every file must match one of the globs
    All {
        /// Globs
        all: Vec<String>,
    },
}

impl FilePattern {
    /// Evaluate against the changed files of a pull request
    pub fn matches<S: AsRef<str>>(&self, files: &[S]) -> bool {
        let any_glob =
            |globs: &[String], file: &str| globs.iter().any(|g| glob_match(g, file));
        match self {
            Self::Glob(glob) => files.iter().any(|f| glob_match(glob, f.as_ref())),
            Self::List(globs) | Self::Any { any: globs } => {
                files.iter().any(|f| any_glob(globs, f.as_ref()))
            }
            Self::All { all } => {
                !files.is_empty() && files.iter().all(|f| any_glob(all, f.as_ref()))
            }
        }
    }
}

/// A configured command rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    /// Trigger kind
    #[serde(rename = "type")]
    pub kind: CommandType,
    /// Command name; defaults to `addLabel`, then to the type name
    #[serde(default)]
    pub name: Option<String>,
    /// Users allowed to run a comment command without write access
    ///
    /// `*` allows everyone and `@author` allows the issue's author.
    #[serde(default)]
    pub allow_users: Vec<String>,
    /// Extra action
    #[serde(default)]
    pub action: Option<CommandAction>,
    /// Close reason used by the `close` action
    #[serde(default)]
    pub reason: Option<CloseReason>,
    /// Author must be a member of this organization
    #[serde(default)]
    pub member_of: Option<OrgCondition>,
    /// Author must not be a member of this organization
    #[serde(default)]
    pub not_member_of: Option<OrgCondition>,
    /// Authors an author command never matches
    #[serde(default)]
    pub ignore_list: Vec<String>,
    /// Author command only matches issues without labels
    #[serde(default)]
    pub no_labels: bool,
    /// Issue must carry this label
    #[serde(default)]
    pub require_label: Option<String>,
    /// Issue must not carry this label
    #[serde(default)]
    pub disallow_label: Option<String>,
    /// Label to add
    #[serde(default)]
    pub add_label: Option<String>,
    /// Label to remove
    #[serde(default)]
    pub remove_label: Option<String>,
    /// Comment to post
    #[serde(default)]
    pub comment: Option<String>,
    /// Changed-file globs
    #[serde(default)]
    pub matches: Option<FilePattern>,
    /// Target of `addToProject`
    #[serde(default)]
    pub add_to_project: Option<ProjectTarget>,
    /// Target of `removeFromProject`
    #[serde(default)]
    pub remove_from_project: Option<ProjectTarget>,
}

impl Command {
    /// Create a command of the given type with nothing else set
    pub const fn new(kind: CommandType) -> Self {
        Self {
            kind,
            name: None,
            allow_users: Vec::new(),
            action: None,
            reason: None,
            member_of: None,
            not_member_of: None,
            ignore_list: Vec::new(),
            no_labels: false,
            require_label: None,
            disallow_label: None,
            add_label: None,
            remove_label: None,
            comment: None,
            matches: None,
            add_to_project: None,
            remove_from_project: None,
        }
    }

    /// Fill in a missing name
    pub fn with_default_name(mut self) -> Self {
        if self.name.is_none() {
            self.name = Some(
                self.add_label
                    .clone()
                    .unwrap_or_else(|| self.kind.as_str().to_string()),
            );
        }
        self
    }

    /// The command name
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.kind.as_str())
    }

    /// Parse a JSON array of commands
    pub fn parse_list(json: &str) -> Result<Vec<Self>> {
        serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("invalid commands config: {e}")))
    }
}

/// What caused a commands run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// A comment was posted
    Comment {
        /// Comment text
        body: String,
        /// Comment author
        user: String,
    },
    /// A label was added
    Label(String),
    /// An issue or PR was opened or updated
    Changes,
}

impl Trigger {
    /// Derive the trigger from a webhook event, if it is one commands react to
    pub fn from_event(event: &WebhookEvent) -> Option<Self> {
        let payload = &event.payload;
        match (&event.name, event.action()) {
            (EventName::IssueComment, Some(EventAction::Created)) => {
                let comment = payload.comment.as_ref()?;
                Some(Self::Comment {
                    body: comment.body.clone(),
                    user: comment.user.login.clone(),
                })
            }
            (_, Some(EventAction::Labeled)) => {
                payload.label.as_ref().map(|l| Self::Label(l.name.clone()))
            }
            (
                EventName::Issues | EventName::PullRequest | EventName::PullRequestTarget,
                Some(EventAction::Opened | EventAction::Reopened | EventAction::Synchronize),
            ) => Some(Self::Changes),
            _ => None,
        }
    }
}
