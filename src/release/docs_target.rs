//! Documentation target version for a branch or tag

use crate::error::{Error, Result};
use regex::Regex;
use std::sync::OnceLock;

/// Prefixes stripped from release refs when none are configured
pub const DEFAULT_PREFIXES: &[&str] = &["release-", "v"];

/// Map a ref to the docs version it publishes
///
/// `main` publishes `next`; a release branch or tag such as `release-1.3` or
/// `v1.2.3` publishes `v<major>.<minor>`. A leading `refs/heads/` or
/// `refs/tags/` is ignored.
pub fn map_ref<S: AsRef<str>>(git_ref: &str, prefixes: &[S]) -> Result<String> {
    static VERSION: OnceLock<Regex> = OnceLock::new();

    let name = git_ref
        .strip_prefix("refs/heads/")
        .or_else(|| git_ref.strip_prefix("refs/tags/"))
        .unwrap_or(git_ref);
    if name == "main" {
        return Ok("next".to_string());
    }

    let version = prefixes
        .iter()
        .find_map(|p| name.strip_prefix(p.as_ref()))
        .ok_or_else(|| Error::InvalidRef(format!("{git_ref} has no release prefix")))?;

    let re = VERSION.get_or_init(|| {
        Regex::new(r"^(\d+)\.(\d+)(?:\.\d+)?(?:-[0-9A-Za-z.-]+)?$").unwrap()
    });
    let caps = re
        .captures(version)
        .ok_or_else(|| Error::InvalidRef(format!("{git_ref} is not a version")))?;
    Ok(format!("v{}.{}", &caps[1], &caps[2]))
}
