//! Run configuration from the GitHub Actions environment
//!
//! Action inputs arrive as `INPUT_<NAME>` variables and the run context as
//! `GITHUB_*` variables. The CLI also accepts every value as a flag, so the
//! functions here take explicit values and only fall back to the environment.

use crate::error::{Error, Result};
use crate::event::WebhookEvent;
use crate::types::RepoConfig;
use std::path::Path;
use tracing::debug;

/// Where the API token came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// Passed explicitly (flag or `INPUT_TOKEN`)
    Input,
    /// `GITHUB_TOKEN`
    Environment,
}

/// Read an action input (`INPUT_<NAME>`), treating empty values as unset
pub fn input(name: &str) -> Option<String> {
    let key = format!("INPUT_{}", name.replace(' ', "_").to_uppercase());
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Read a required action input
pub fn required_input(name: &str) -> Result<String> {
    input(name).ok_or_else(|| Error::Config(format!("input required and not supplied: {name}")))
}

/// Split a comma- or newline-separated input into values
pub fn input_list(name: &str) -> Vec<String> {
    input(name)
        .map(|v| {
            v.split([',', '\n'])
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Parse `owner/repo`
pub fn parse_repository(full_name: &str) -> Result<RepoConfig> {
    match full_name.trim().split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            Ok(RepoConfig {
                owner: owner.to_string(),
                repo: repo.to_string(),
            })
        }
        _ => Err(Error::Config(format!(
            "repository must be owner/repo, got {full_name:?}"
        ))),
    }
}

/// Repository, credentials and API endpoint of a run
#[derive(Debug, Clone)]
pub struct RepoContext {
    /// Target repository
    pub repo: RepoConfig,
    /// API token
    pub token: String,
    /// Where the token came from
    pub token_source: TokenSource,
    /// REST API base URL (GitHub Enterprise), `None` for github.com
    pub api_url: Option<String>,
}

impl RepoContext {
    /// Resolve the context from explicit values, falling back to
    /// `GITHUB_REPOSITORY`, `INPUT_TOKEN`/`GITHUB_TOKEN` and `GITHUB_API_URL`
    pub fn resolve(
        repository: Option<&str>,
        token: Option<&str>,
        api_url: Option<&str>,
    ) -> Result<Self> {
        let repository = repository
            .map(ToString::to_string)
            .or_else(|| std::env::var("GITHUB_REPOSITORY").ok())
            .ok_or_else(|| Error::Config("GITHUB_REPOSITORY is not set".to_string()))?;
        let repo = parse_repository(&repository)?;

        let explicit = token.map(ToString::to_string).or_else(|| input("token"));
        let (token, token_source) = if let Some(token) = explicit {
            (token, TokenSource::Input)
        } else if let Some(token) = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty())
        {
            (token, TokenSource::Environment)
        } else {
            return Err(Error::Config(
                "no token: pass --token or set INPUT_TOKEN or GITHUB_TOKEN".to_string(),
            ));
        };

        let api_url = api_url
            .map(ToString::to_string)
            .or_else(|| std::env::var("GITHUB_API_URL").ok())
            .filter(|u| !u.is_empty() && u.trim_end_matches('/') != "https://api.github.com");

        debug!(%repo, source = ?token_source, api_url = ?api_url, "resolved repository context");
        Ok(Self {
            repo,
            token,
            token_source,
            api_url,
        })
    }
}

/// The event that triggered the run
#[derive(Debug, Clone)]
pub struct EventContext {
    /// Parsed event
    pub event: WebhookEvent,
}

impl EventContext {
    /// Load the event from explicit values, falling back to
    /// `GITHUB_EVENT_NAME` and `GITHUB_EVENT_PATH`
    pub fn resolve(name: Option<&str>, path: Option<&Path>) -> Result<Self> {
        let name = name
            .map(ToString::to_string)
            .or_else(|| std::env::var("GITHUB_EVENT_NAME").ok())
            .ok_or_else(|| Error::Config("GITHUB_EVENT_NAME is not set".to_string()))?;
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("GITHUB_EVENT_PATH").map(Into::into))
            .ok_or_else(|| Error::Config("GITHUB_EVENT_PATH is not set".to_string()))?;

        debug!(event = %name, path = %path.display(), "loading event payload");
        Ok(Self {
            event: WebhookEvent::from_file(&name, &path)?,
        })
    }
}
