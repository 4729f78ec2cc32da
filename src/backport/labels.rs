//! Backport label parsing and label carry-over

use regex::Regex;
use std::sync::OnceLock;

/// Label applied when a backport could not be created automatically
pub const BACKPORT_FAILED_LABEL: &str = "backport-failed";

const ADD_TO_CHANGELOG: &str = "add to changelog";
const NO_CHANGELOG: &str = "no-changelog";

/// One backport to perform: cherry-pick onto `base` via branch `head`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackportTarget {
    /// Release branch receiving the backport
    pub base: String,
    /// Branch holding the cherry-pick
    pub head: String,
}

/// Parse a `backport <base>[ <head>]` label into its base and optional head
pub fn parse_backport_label(label: &str) -> Option<(String, Option<String>)> {
    static BACKPORT_LABEL: OnceLock<Regex> = OnceLock::new();

    let re = BACKPORT_LABEL.get_or_init(|| Regex::new(r"^backport ([^ ]+)(?: ([^ ]+))?$").unwrap());
    let caps = re.captures(label)?;
    let base = caps.get(1)?.as_str().to_string();
    let head = caps.get(2).map(|m| m.as_str().to_string());
    Some((base, head))
}

/// Default branch name for a backport of `pr_number` onto `base`
pub fn default_head(pr_number: u64, base: &str) -> String {
    format!("backport-{pr_number}-to-{base}")
}

/// Targets for every backport label, in label order, without duplicate bases
pub fn backport_targets<S: AsRef<str>>(labels: &[S], pr_number: u64) -> Vec<BackportTarget> {
    let mut targets: Vec<BackportTarget> = Vec::new();
    for (base, head) in labels.iter().filter_map(|l| parse_backport_label(l.as_ref())) {
        if targets.iter().any(|t| t.base == base) {
            continue;
        }
        let head = head.unwrap_or_else(|| default_head(pr_number, &base));
        targets.push(BackportTarget { base, head });
    }
    targets
}

/// Labels for a backport PR: the original labels plus `to_add`
///
/// Backport labels and the failure label are never carried over, and
/// `add to changelog` / `no-changelog` exclude each other, with `to_add`
/// deciding which one stays.
pub fn get_final_labels<S: AsRef<str>>(original: &[S], to_add: &[S]) -> Vec<String> {
    let wanted = |label: &str| !label.starts_with("backport ") && label != BACKPORT_FAILED_LABEL;
    let adds = |label: &str| to_add.iter().any(|l| l.as_ref() == label);

    let mut labels: Vec<String> = Vec::new();
    for label in original.iter().chain(to_add) {
        let label: &str = label.as_ref();
        if wanted(label) && !labels.iter().any(|l| l == label) {
            labels.push(label.to_string());
        }
    }

    if adds(ADD_TO_CHANGELOG) {
        labels.retain(|l| l != NO_CHANGELOG);
    } else if adds(NO_CHANGELOG) {
        labels.retain(|l| l != ADD_TO_CHANGELOG);
    }
    labels
}

/// Milestone title derived from a release branch: `v10.2.x` becomes `10.2.x`
pub fn milestone_for_base(base: &str) -> Option<String> {
    let version = base.strip_prefix('v').unwrap_or(base);
    let mut parts = version.split('.');
    let major = parts.next()?;
    let minor = parts.next()?;
    if major.is_empty()
        || minor.is_empty()
        || !major.chars().all(|c| c.is_ascii_digit())
        || !minor.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    Some(version.to_string())
}
