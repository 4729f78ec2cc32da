//! Release tag lookups

use crate::error::{Error, Result};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tokio::process::Command;

fn short_name(git_ref: &str) -> &str {
    git_ref
        .strip_prefix("refs/tags/")
        .or_else(|| git_ref.strip_prefix("refs/heads/"))
        .unwrap_or(git_ref)
}

/// Whether `git_ref` has a release tag among `ref_names`
///
/// A tag `vX.Y.Z` matches itself. A branch `release-X.Y` needs the tag
/// `vX.Y.0` and a branch `release-X.Y.Z` needs `vX.Y.Z`.
pub fn has_matching_release_tag_with_ref_names<S: AsRef<str>>(git_ref: &str, ref_names: &[S]) -> bool {
    static TAG: OnceLock<Regex> = OnceLock::new();
    static BRANCH: OnceLock<Regex> = OnceLock::new();

    let tag = TAG.get_or_init(|| Regex::new(r"^v(\d+)\.(\d+)\.(\d+)$").unwrap());
    let branch = BRANCH.get_or_init(|| {
        Regex::new(r"^release-(\d+)\.(\d+)(?:\.(0|[1-9]\d*))?$").unwrap()
    });

    let name = short_name(git_ref);
    if tag.is_match(name) {
        return true;
    }
    let Some(caps) = branch.captures(name) else {
        return false;
    };
    let patch = caps.get(3).map_or("0", |m| m.as_str());
    let wanted = format!("v{}.{}.{patch}", &caps[1], &caps[2]);
    ref_names.iter().any(|r| short_name(r.as_ref()) == wanted)
}

/// Tag names of the repository at `dir`
pub async fn local_tag_names(dir: &Path) -> Result<Vec<String>> {
    let output = Command::new("git")
        .current_dir(dir)
        .args(["tag", "--list"])
        .output()
        .await?;
    if !output.status.success() {
        return Err(Error::Git {
            command: "git tag --list".to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|l| !l.is_empty())
        .map(ToString::to_string)
        .collect())
}
