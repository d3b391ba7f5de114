//! Blob, tree, and commit plumbing.

use crate::repo::Repo;
use anyhow::{Context, Result, bail};
use std::path::Path;

/// Author/committer identity for engine-created commits.
#[derive(Debug, Clone)]
pub struct Signature {
    pub name: String,
    pub email: String,
}

impl Default for Signature {
    fn default() -> Self {
        Self {
            name: "entire".to_string(),
            email: "entire@localhost".to_string(),
        }
    }
}

/// One recursive tree entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: String,
    pub oid: String,
    pub path: String,
}

impl Repo {
    /// Write a worktree file into the object store, returning its blob OID.
    pub fn write_blob_from_worktree(&self, rel_path: &str) -> Result<String> {
        self.run(&["hash-object", "-w", "--", rel_path])
            .with_context(|| format!("Failed to store blob for '{rel_path}'"))
    }

    /// Write raw bytes into the object store, returning the blob OID.
    pub fn write_blob(&self, bytes: &[u8]) -> Result<String> {
        self.run_with_stdin(&["hash-object", "-w", "--stdin"], &[], bytes)
            .context("Failed to store blob from memory")
    }

    /// Read a blob's content.
    pub fn read_blob(&self, oid: &str) -> Result<Vec<u8>> {
        self.run_bytes(&["cat-file", "blob", oid])
            .with_context(|| format!("Failed to read blob {oid}"))
    }

    /// Read a file out of a commit; `None` when the path is absent there.
    pub fn read_file_at(&self, commitish: &str, path: &str) -> Result<Option<Vec<u8>>> {
        let spec = format!("{commitish}:{path}");
        let output = self.command(&["cat-file", "blob", &spec]).output()?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(output.stdout))
    }

    /// The tree OID a commit-ish points at.
    pub fn tree_of(&self, commitish: &str) -> Result<String> {
        let spec = format!("{commitish}^{{tree}}");
        self.run(&["rev-parse", &spec])
            .with_context(|| format!("Failed to resolve tree of {commitish}"))
    }

    /// Create a commit object; returns its OID. Does not move any reference.
    pub fn commit_tree(
        &self,
        tree: &str,
        parents: &[&str],
        message: &str,
        sig: &Signature,
    ) -> Result<String> {
        let mut args: Vec<&str> = vec!["commit-tree", tree];
        for parent in parents {
            args.push("-p");
            args.push(*parent);
        }
        let envs = [
            ("GIT_AUTHOR_NAME", sig.name.as_str()),
            ("GIT_AUTHOR_EMAIL", sig.email.as_str()),
            ("GIT_COMMITTER_NAME", sig.name.as_str()),
            ("GIT_COMMITTER_EMAIL", sig.email.as_str()),
        ];
        self.run_with_stdin(&args, &envs, message.as_bytes())
            .context("Failed to create commit object")
    }

    /// Full commit message (subject + body + trailers).
    pub fn commit_message(&self, oid: &str) -> Result<String> {
        self.run_bytes(&["show", "-s", "--format=%B", oid])
            .map(|bytes| String::from_utf8_lossy(&bytes).to_string())
            .with_context(|| format!("Failed to read message of {oid}"))
    }

    /// Committer timestamp, seconds since the epoch.
    pub fn commit_time(&self, oid: &str) -> Result<i64> {
        let raw = self.run(&["show", "-s", "--format=%ct", oid])?;
        raw.parse::<i64>()
            .with_context(|| format!("Unparseable commit time '{raw}' for {oid}"))
    }

    /// Commits reachable from `tip` but not from `stop`, newest first.
    pub fn rev_list(&self, tip: &str, stop: Option<&str>) -> Result<Vec<String>> {
        let exclusion;
        let mut args = vec!["rev-list", tip];
        if let Some(stop) = stop {
            exclusion = format!("^{stop}");
            args.push(&exclusion);
        }
        let stdout = self.run(&args)?;
        Ok(stdout.lines().map(|l| l.trim().to_string()).collect())
    }

    /// Parent commit OIDs of `oid`, first parent first.
    pub fn parents_of(&self, oid: &str) -> Result<Vec<String>> {
        let line = self.run(&["rev-list", "--parents", "-n", "1", oid])?;
        Ok(line.split_whitespace().skip(1).map(String::from).collect())
    }

    /// All blob entries of a tree-ish, recursively.
    pub fn ls_tree(&self, treeish: &str) -> Result<Vec<TreeEntry>> {
        let stdout = self.run_bytes(&["ls-tree", "-r", "-z", treeish])?;
        parse_ls_tree(&stdout)
    }
}

fn parse_ls_tree(raw: &[u8]) -> Result<Vec<TreeEntry>> {
    let mut entries = Vec::new();
    for record in raw.split(|&b| b == 0) {
        if record.is_empty() {
            continue;
        }
        let text = String::from_utf8_lossy(record);
        // "<mode> <type> <oid>\t<path>"
        let Some((meta, path)) = text.split_once('\t') else {
            bail!("Malformed ls-tree record: {text}");
        };
        let mut fields = meta.split_whitespace();
        let (Some(mode), Some(kind), Some(oid)) = (fields.next(), fields.next(), fields.next())
        else {
            bail!("Malformed ls-tree record: {text}");
        };
        if kind != "blob" {
            continue;
        }
        entries.push(TreeEntry {
            mode: mode.to_string(),
            oid: oid.to_string(),
            path: path.to_string(),
        });
    }
    Ok(entries)
}

/// Incremental tree construction over a private index file.
///
/// Starts from an existing tree (or empty), applies adds and removals, and
/// writes the result as a new tree object. The temporary index keeps the
/// user's real index untouched.
pub struct TreeBuilder<'r> {
    repo: &'r Repo,
    // Holds the private index file; dropped (and cleaned up) with the builder.
    index_dir: tempfile::TempDir,
}

impl<'r> TreeBuilder<'r> {
    /// Start from `treeish`, or from an empty tree when `None`.
    pub fn from_tree(repo: &'r Repo, treeish: Option<&str>) -> Result<Self> {
        let index_dir = tempfile::tempdir().context("Failed to create temp index dir")?;
        let builder = Self { repo, index_dir };
        match treeish {
            Some(treeish) => builder.run_indexed(&["read-tree", treeish])?,
            None => builder.run_indexed(&["read-tree", "--empty"])?,
        };
        Ok(builder)
    }

    /// Stage a blob at `path`.
    pub fn add(&self, path: &str, oid: &str, mode: &str) -> Result<()> {
        let cacheinfo = format!("{mode},{oid},{path}");
        self.run_indexed(&["update-index", "--add", "--cacheinfo", &cacheinfo])?;
        Ok(())
    }

    /// Stage a worktree file, preserving its executable bit.
    pub fn add_worktree_file(&self, rel_path: &str) -> Result<()> {
        let oid = self.repo.write_blob_from_worktree(rel_path)?;
        let mode = if is_executable(&self.repo.workdir().join(rel_path)) {
            "100755"
        } else {
            "100644"
        };
        self.add(rel_path, &oid, mode)
    }

    /// Remove `path` from the staged tree; absent paths are a no-op.
    pub fn remove(&self, path: &str) -> Result<()> {
        self.run_indexed(&["update-index", "--force-remove", "--", path])?;
        Ok(())
    }

    /// Remove every staged path under `prefix` (a directory path without a
    /// trailing slash).
    pub fn remove_prefix(&self, prefix: &str) -> Result<()> {
        let pathspec = format!("{prefix}/");
        let listed = self.run_indexed(&["ls-files", "-z", "--", &pathspec])?;
        for path in listed.split('\0').filter(|p| !p.is_empty()) {
            self.run_indexed(&["update-index", "--force-remove", "--", path])?;
        }
        Ok(())
    }

    /// Paths currently staged under `prefix`.
    pub fn list_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let pathspec = format!("{prefix}/");
        let listed = self.run_indexed(&["ls-files", "-z", "--", &pathspec])?;
        Ok(listed
            .split('\0')
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect())
    }

    /// Write the staged state as a tree object and return its OID.
    pub fn write(&self) -> Result<String> {
        self.run_indexed(&["write-tree"])
    }

    fn run_indexed(&self, args: &[&str]) -> Result<String> {
        let index_path = self.index_dir.path().join("index");
        let index_path = index_path.to_string_lossy().to_string();
        self.repo.run_env(args, &[("GIT_INDEX_FILE", &index_path)])
    }
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        path.metadata()
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::testutil::init_repo;

    #[test]
    fn test_blob_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        let oid = repo.write_blob(b"checkpoint payload").unwrap();
        assert_eq!(repo.read_blob(&oid).unwrap(), b"checkpoint payload");
    }

    #[test]
    fn test_tree_builder_adds_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        let head = repo.head_commit().unwrap().unwrap();
        let base_tree = repo.tree_of(&head).unwrap();

        let builder = TreeBuilder::from_tree(&repo, Some(&base_tree)).unwrap();
        let oid = repo.write_blob(b"new content").unwrap();
        builder.add("dir/new.txt", &oid, "100644").unwrap();
        builder.remove("README.md").unwrap();
        let tree = builder.write().unwrap();

        let entries = repo.ls_tree(&tree).unwrap();
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["dir/new.txt"]);
    }

    #[test]
    fn test_tree_builder_remove_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());

        let builder = TreeBuilder::from_tree(&repo, None).unwrap();
        let oid = repo.write_blob(b"x").unwrap();
        builder.add("meta/a1/one.json", &oid, "100644").unwrap();
        builder.add("meta/a1/two.json", &oid, "100644").unwrap();
        builder.add("meta/b2/one.json", &oid, "100644").unwrap();
        builder.remove_prefix("meta/a1").unwrap();
        let tree = builder.write().unwrap();

        let entries = repo.ls_tree(&tree).unwrap();
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["meta/b2/one.json"]);
    }

    #[test]
    fn test_commit_tree_links_parent() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        let head = repo.head_commit().unwrap().unwrap();
        let tree = repo.tree_of(&head).unwrap();

        let commit = repo
            .commit_tree(&tree, &[&head], "snapshot\n", &Signature::default())
            .unwrap();
        assert_eq!(repo.parents_of(&commit).unwrap(), vec![head]);
        assert_eq!(repo.commit_message(&commit).unwrap().trim(), "snapshot");
    }

    #[test]
    fn test_read_file_at_missing_path_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        let head = repo.head_commit().unwrap().unwrap();
        assert!(repo.read_file_at(&head, "absent.txt").unwrap().is_none());
        assert!(repo.read_file_at(&head, "README.md").unwrap().is_some());
    }
}
