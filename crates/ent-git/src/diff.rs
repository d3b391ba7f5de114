//! Commit diff enumeration.

use crate::repo::Repo;
use anyhow::Result;

impl Repo {
    /// Repository-relative paths changed by `commit`.
    ///
    /// The initial commit (no parents) lists every file it tracks; merge
    /// commits diff against their first parent only.
    pub fn files_changed_in_commit(&self, commit: &str) -> Result<Vec<String>> {
        let parents = self.parents_of(commit)?;
        let raw = match parents.first() {
            None => self.run_bytes(&["ls-tree", "-r", "--name-only", "-z", commit])?,
            Some(parent) => self.run_bytes(&[
                "diff-tree",
                "-r",
                "--name-only",
                "--no-commit-id",
                "-z",
                parent,
                commit,
            ])?,
        };
        Ok(split_z(&raw))
    }

    /// Paths tracked in the current index.
    pub fn tracked_files(&self) -> Result<Vec<String>> {
        let raw = self.run_bytes(&["ls-files", "-z"])?;
        Ok(split_z(&raw))
    }

    /// Whether `path` is tracked.
    pub fn is_tracked(&self, path: &str) -> Result<bool> {
        let output = self
            .command(&["ls-files", "--error-unmatch", "--", path])
            .output()?;
        Ok(output.status.success())
    }
}

fn split_z(raw: &[u8]) -> Vec<String> {
    raw.split(|&b| b == 0)
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| String::from_utf8_lossy(chunk).to_string())
        .collect()
}
