//! Versioned blocks in a changelog file
//!
//! Each release owns a block delimited by `<!-- <version> START -->` and
//! `<!-- <version> END -->`. Updating a version rewrites only its block.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

fn start_marker(version: &str) -> String {
    format!("<!-- {version} START -->")
}

fn end_marker(version: &str) -> String {
    format!("<!-- {version} END -->")
}

/// Reads, edits and writes a changelog file
#[derive(Debug, Clone)]
pub struct FileUpdater {
    path: PathBuf,
    content: String,
}

impl FileUpdater {
    /// Load `path`; a missing file starts empty
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.is_dir() {
            return Err(Error::Config(format!("{} is a directory", path.display())));
        }
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, content })
    }

    /// Current file content
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Insert or replace the block for `version`
    ///
    /// An existing block is replaced in place. A new block goes above the
    /// newest (first) existing block, or at the end of the file if there is
    /// none.
    pub fn update(&mut self, version: &str, body: &str) {
        let start = start_marker(version);
        let end = end_marker(version);
        let block = format!("{start}\n\n{}\n\n{end}\n", body.trim());

        if let Some(begin) = self.content.find(&start)
            && let Some(offset) = self.content[begin..].find(&end)
        {
            let mut finish = begin + offset + end.len();
            if self.content[finish..].starts_with('\n') {
                finish += 1;
            }
            debug!(version, "replacing changelog block");
            self.content.replace_range(begin..finish, &block);
            return;
        }

        match first_block_start(&self.content) {
            Some(at) => {
                debug!(version, "inserting changelog block above newest");
                self.content.insert_str(at, &format!("{block}\n"));
            }
            None => {
                debug!(version, "appending changelog block");
                if !self.content.is_empty() && !self.content.ends_with("\n\n") {
                    self.content
                        .push_str(if self.content.ends_with('\n') { "\n" } else { "\n\n" });
                }
                self.content.push_str(&block);
            }
        }
    }

    /// Write the content back to disk
    pub fn save(&self) -> Result<()> {
        std::fs::write(&self.path, &self.content)?;
        Ok(())
    }
}

fn first_block_start(content: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(pos) = content[from..].find("<!-- ") {
        let at = from + pos;
        let line_end = content[at..].find('\n').map_or(content.len(), |n| at + n);
        if content[at..line_end].trim_end().ends_with(" START -->") {
            return Some(at);
        }
        from = at + 5;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const EXISTING: &str = "# Changelog\n\n<!-- 10.1.0 START -->\n\n# 10.1.0\n\n- Fix A\n\n<!-- 10.1.0 END -->\n\n<!-- 10.0.0 START -->\n\n# 10.0.0\n\n- Fix B\n\n<!-- 10.0.0 END -->\n";

    #[test]
    fn test_new_block_goes_above_newest() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("CHANGELOG.md");
        std::fs::write(&path, EXISTING).unwrap();

        let mut updater = FileUpdater::load(&path).unwrap();
        updater.update("10.2.0", "# 10.2.0\n\n- Feature C");
        updater.save().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(
            "# Changelog\n\n<!-- 10.2.0 START -->\n\n# 10.2.0\n\n- Feature C\n\n<!-- 10.2.0 END -->\n\n<!-- 10.1.0 START -->"
        ));
        assert!(content.ends_with(&EXISTING["# Changelog\n\n".len()..]));
    }

    #[test]
    fn test_replace_leaves_other_blocks_untouched() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("CHANGELOG.md");
        std::fs::write(&path, EXISTING).unwrap();

        let mut updater = FileUpdater::load(&path).unwrap();
        updater.update("10.1.0", "# 10.1.0\n\n- Fix A\n- Fix D");
        updater.save().unwrap();

        let reloaded = FileUpdater::load(&path).unwrap();
        let content = reloaded.content();
        assert!(content.contains("- Fix A\n- Fix D\n\n<!-- 10.1.0 END -->\n\n<!-- 10.0.0 START -->"));
        let old_block = &EXISTING[EXISTING.find("<!-- 10.0.0 START -->").unwrap()..];
        assert!(content.ends_with(old_block));
        assert_eq!(content.matches("<!-- 10.1.0 START -->").count(), 1);
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let tmp = TempDir::new().unwrap();
        let mut updater = FileUpdater::load(tmp.path().join("NEW.md")).unwrap();
        assert_eq!(updater.content(), "");
        updater.update("1.0.0", "# 1.0.0");
        assert_eq!(
            updater.content(),
            "<!-- 1.0.0 START -->\n\n# 1.0.0\n\n<!-- 1.0.0 END -->\n"
        );
    }

    #[test]
    fn test_directory_is_config_error() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(FileUpdater::load(tmp.path()), Err(Error::Config(_))));
    }
}
