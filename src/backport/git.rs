//! Git subprocess operations used by backports

use crate::config::input;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::debug;

/// Result of a cherry-pick attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CherryPick {
    /// The commit applied cleanly
    Applied,
    /// The cherry-pick stopped with these unmerged paths
    Conflict(Vec<String>),
}

/// The git operations a backport needs
///
/// All operations act on one working tree, so callers must not run them
/// concurrently.
#[async_trait]
pub trait GitRepo: Send + Sync {
    /// Working tree the operations act on
    fn workdir(&self) -> &Path;

    /// Clone `url` into the working tree
    async fn clone_from(&self, url: &str) -> Result<()>;

    /// Fetch a branch from `origin`
    async fn fetch(&self, branch: &str) -> Result<()>;

    /// Create and switch to `branch` starting at `origin/<base>`
    async fn switch_create(&self, branch: &str, base: &str) -> Result<()>;

    /// Cherry-pick `sha` with `-x`
    async fn cherry_pick(&self, sha: &str) -> Result<CherryPick>;

    /// Paths with unresolved conflicts
    async fn unmerged_paths(&self) -> Result<Vec<String>>;

    /// Stage paths
    async fn add(&self, paths: &[String]) -> Result<()>;

    /// Conclude a cherry-pick after conflicts were resolved
    async fn cherry_pick_continue(&self) -> Result<()>;

    /// Abandon an in-progress cherry-pick
    async fn cherry_pick_abort(&self) -> Result<()>;

    /// Push `branch` to `origin` and set it as upstream
    async fn push(&self, branch: &str) -> Result<()>;
}

/// Identity used for the commits git creates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    /// `user.name`
    pub name: String,
    /// `user.email`
    pub email: String,
}

impl Default for CommitIdentity {
    fn default() -> Self {
        Self {
            name: "github-actions[bot]".to_string(),
            email: "41898282+github-actions[bot]@users.noreply.github.com".to_string(),
        }
    }
}

impl CommitIdentity {
    /// Identity from the `git_user_name` and `git_user_email` inputs
    ///
    /// Each field falls back to the Actions bot on its own.
    pub fn from_inputs() -> Self {
        let fallback = Self::default();
        Self {
            name: input("git_user_name").unwrap_or(fallback.name),
            email: input("git_user_email").unwrap_or(fallback.email),
        }
    }
}

/// [`GitRepo`] backed by the `git` binary
#[derive(Debug, Clone)]
pub struct CliGit {
    workdir: PathBuf,
    identity: CommitIdentity,
}

impl CliGit {
    /// Operate on the working tree at `workdir`
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            identity: CommitIdentity::default(),
        }
    }

    /// Commit with a different identity
    #[must_use]
    pub fn with_identity(mut self, identity: CommitIdentity) -> Self {
        self.identity = identity;
        self
    }

    fn command(&self, dir: &Path) -> Command {
        let mut cmd = Command::new("git");
        cmd.current_dir(dir);
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd.arg("-c")
            .arg(format!("user.name={}", self.identity.name))
            .arg("-c")
            .arg(format!("user.email={}", self.identity.email));
        cmd
    }

    async fn output(&self, dir: &Path, args: &[&str]) -> Result<Output> {
        debug!(args = ?args, "running git");
        Ok(self.command(dir).args(args).output().await?)
    }

    async fn run(&self, args: &[&str]) -> Result<Output> {
        let output = self.output(&self.workdir, args).await?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(git_error(args, &output))
        }
    }
}

fn git_error(args: &[&str], output: &Output) -> Error {
    Error::Git {
        command: format!("git {}", args.join(" ")),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

#[async_trait]
impl GitRepo for CliGit {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    async fn clone_from(&self, url: &str) -> Result<()> {
        let parent = self.workdir.parent().unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(parent).await?;
        let target = self.workdir.to_string_lossy();
        let args = ["clone", url, target.as_ref()];
        let output = self.output(parent, &args).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(git_error(&["clone", "<url>", target.as_ref()], &output))
        }
    }

    async fn fetch(&self, branch: &str) -> Result<()> {
        self.run(&["fetch", "origin", branch]).await.map(drop)
    }

    async fn switch_create(&self, branch: &str, base: &str) -> Result<()> {
        let start = format!("origin/{base}");
        self.run(&["switch", "--create", branch, &start]).await.map(drop)
    }

    async fn cherry_pick(&self, sha: &str) -> Result<CherryPick> {
        let args = ["cherry-pick", "-x", sha];
        let output = self.output(&self.workdir, &args).await?;
        if output.status.success() {
            return Ok(CherryPick::Applied);
        }
        let paths = self.unmerged_paths().await?;
        if paths.is_empty() {
            Err(git_error(&args, &output))
        } else {
            Ok(CherryPick::Conflict(paths))
        }
    }

    async fn unmerged_paths(&self) -> Result<Vec<String>> {
        let output = self.run(&["diff", "--name-only", "--diff-filter=U"]).await?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|l| !l.is_empty())
            .map(ToString::to_string)
            .collect())
    }

    async fn add(&self, paths: &[String]) -> Result<()> {
        let mut args = vec!["add", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.run(&args).await.map(drop)
    }

    async fn cherry_pick_continue(&self) -> Result<()> {
        self.run(&["-c", "core.editor=true", "cherry-pick", "--continue"])
            .await
            .map(drop)
    }

    async fn cherry_pick_abort(&self) -> Result<()> {
        self.run(&["cherry-pick", "--abort"]).await.map(drop)
    }

    async fn push(&self, branch: &str) -> Result<()> {
        self.run(&["push", "--set-upstream", "origin", branch])
            .await
            .map(drop)
    }
}

/// Regenerates a generated file that commonly conflicts during backports
#[async_trait]
pub trait Regenerator: Send + Sync {
    /// Repository-relative path of the generated file
    fn path(&self) -> &str;

    /// Rewrite the file in `workdir` from the checked-out sources
    async fn regenerate(&self, workdir: &Path) -> Result<()>;
}

/// Regenerates a file by running a program in the working tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRegenerator {
    path: String,
    program: String,
    args: Vec<String>,
}

impl CommandRegenerator {
    /// Regenerate `path` by running `program args...`
    pub fn new(path: impl Into<String>, program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            path: path.into(),
            program: program.into(),
            args: args.iter().map(ToString::to_string).collect(),
        }
    }

    /// `.betterer.results`, rebuilt by `npx betterer --update`
    pub fn betterer() -> Self {
        Self::new(".betterer.results", "npx", &["betterer", "--update"])
    }
}

#[async_trait]
impl Regenerator for CommandRegenerator {
    fn path(&self) -> &str {
        &self.path
    }

    async fn regenerate(&self, workdir: &Path) -> Result<()> {
        debug!(program = %self.program, args = ?self.args, "regenerating {}", self.path);
        let output = Command::new(&self.program)
            .args(&self.args)
            .current_dir(workdir)
            .output()
            .await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(Error::Subprocess {
                command: format!("{} {}", self.program, self.args.join(" ")),
                output: format!(
                    "{}{}",
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr)
                ),
            })
        }
    }
}
