//! Integration tests for the repo-bot binary

#![allow(deprecated)] // cargo_bin is the standard way to test CLI binaries

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn repo_bot() -> Command {
    let mut cmd = Command::cargo_bin("repo-bot").unwrap();
    for var in [
        "GITHUB_OUTPUT",
        "GITHUB_REF",
        "GITHUB_REPOSITORY",
        "GITHUB_TOKEN",
        "GITHUB_EVENT_NAME",
        "GITHUB_EVENT_PATH",
        "INPUT_TOKEN",
        "INPUT_VERSION",
        "INPUT_LABELS_TO_ADD",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

// =============================================================================
// CLI Tests
// =============================================================================

#[test]
fn test_cli_help() {
    repo_bot()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("pr-checks"))
        .stdout(predicate::str::contains("backport"))
        .stdout(predicate::str::contains("update-changelog"));
}

#[test]
fn test_cli_version() {
    repo_bot()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_pr_checks_without_repository_fails() {
    repo_bot()
        .arg("pr-checks")
        .assert()
        .failure()
        .stderr(predicate::str::contains("GITHUB_REPOSITORY"));
}

// =============================================================================
// Release helpers
// =============================================================================

#[test]
fn test_docs_target_for_release_branch() {
    repo_bot()
        .args(["docs-target", "refs/heads/release-10.3.2"])
        .assert()
        .success()
        .stdout("v10.3\n");
}

#[test]
fn test_docs_target_for_main() {
    repo_bot()
        .args(["docs-target", "main"])
        .assert()
        .success()
        .stdout("next\n");
}

#[test]
fn test_docs_target_custom_prefixes() {
    repo_bot()
        .args(["docs-target", "stable-2.1", "--prefixes", "stable-"])
        .assert()
        .success()
        .stdout("v2.1\n");
}

#[test]
fn test_docs_target_rejects_feature_branch() {
    repo_bot()
        .args(["docs-target", "my-feature"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid ref"));
}

#[test]
fn test_docs_target_writes_step_output() {
    let tmp = TempDir::new().unwrap();
    let output = tmp.path().join("output");

    repo_bot()
        .env("GITHUB_OUTPUT", &output)
        .args(["docs-target", "v9.5.1"])
        .assert()
        .success();

    assert_eq!(std::fs::read_to_string(output).unwrap(), "target=v9.5\n");
}

#[test]
fn test_update_changelog_inserts_block() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("CHANGELOG.md");
    std::fs::write(
        &path,
        "# Changelog\n\n<!-- 1.0.0 START -->\n\n# 1.0.0\n\n<!-- 1.0.0 END -->\n",
    )
    .unwrap();

    repo_bot()
        .arg("update-changelog")
        .arg("--path")
        .arg(&path)
        .args(["--version", "1.1.0", "--body", "# 1.1.0\n\n- Feature"])
        .assert()
        .success();

    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "# Changelog\n\n<!-- 1.1.0 START -->\n\n# 1.1.0\n\n- Feature\n\n<!-- 1.1.0 END -->\n\n<!-- 1.0.0 START -->\n\n# 1.0.0\n\n<!-- 1.0.0 END -->\n"
    );
}

#[test]
fn test_update_changelog_needs_a_body() {
    let tmp = TempDir::new().unwrap();
    repo_bot()
        .arg("update-changelog")
        .arg("--path")
        .arg(tmp.path().join("CHANGELOG.md"))
        .args(["--version", "1.1.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--body"));
}

#[test]
fn test_update_changelog_version_from_input() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("CHANGELOG.md");

    repo_bot()
        .env("INPUT_VERSION", "2.0.0")
        .arg("update-changelog")
        .arg("--path")
        .arg(&path)
        .args(["--body", "# 2.0.0"])
        .assert()
        .success();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("<!-- 2.0.0 START -->"));
}

#[test]
fn test_update_changelog_needs_a_version() {
    let tmp = TempDir::new().unwrap();
    repo_bot()
        .arg("update-changelog")
        .arg("--path")
        .arg(tmp.path().join("CHANGELOG.md"))
        .args(["--body", "# 2.0.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("input required and not supplied: version"));
}

#[test]
fn test_release_tag_check_reads_local_tags() {
    let tmp = TempDir::new().unwrap();
    let git = |args: &[&str]| {
        let status = std::process::Command::new("git")
            .current_dir(tmp.path())
            .args(args)
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?}");
    };
    git(&["init", "-q"]);
    git(&[
        "-c",
        "user.name=t",
        "-c",
        "user.email=t@example.com",
        "commit",
        "-q",
        "--allow-empty",
        "-m",
        "init",
    ]);
    git(&["tag", "v10.2.0"]);

    repo_bot()
        .arg("release-tag-check")
        .arg("release-10.2")
        .arg("--repo-dir")
        .arg(tmp.path())
        .assert()
        .success()
        .stdout("true\n");

    repo_bot()
        .arg("release-tag-check")
        .arg("release-10.3")
        .arg("--repo-dir")
        .arg(tmp.path())
        .assert()
        .success()
        .stdout("false\n");
}
