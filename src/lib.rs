//! repo-bots - GitHub Actions automation for a large repository
//!
//! The bots react to webhook events:
//!
//! - [`checks`]: PR status checks (milestone, backport decision, enterprise,
//!   labels, changelog) dispatched by event and action
//! - [`commands`]: declarative rules that label, comment, close and file
//!   issues from comments, labels, changed files or authorship
//! - [`backport`]: cherry-picks merged PRs onto release branches
//! - [`release`]: docs version, release tag and changelog file helpers
//!
//! Every bot talks to GitHub through [`github::GitHubApi`].

pub mod action;
pub mod backport;
pub mod checks;
pub mod commands;
pub mod config;
pub mod error;
pub mod event;
pub mod github;
pub mod release;
pub mod telemetry;
pub mod types;

pub use error::{Error, Result};
